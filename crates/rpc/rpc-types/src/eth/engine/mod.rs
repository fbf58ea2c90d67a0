//! Engine API types: <https://github.com/ethereum/execution-apis/blob/main/src/engine/authentication.md> and <https://eips.ethereum.org/EIPS/eip-3675> following the execution specs <https://github.com/ethereum/execution-apis/tree/main/src/engine>

mod forkchoice;
mod payload;

pub use forkchoice::*;
pub use payload::*;

/// The list of supported Engine capabilities
pub const CAPABILITIES: [&str; 6] = [
    "engine_forkchoiceUpdatedV1",
    "engine_forkchoiceUpdatedV2",
    "engine_getPayloadV1",
    "engine_getPayloadV2",
    "engine_newPayloadV1",
    "engine_newPayloadV2",
];
