use fathom_beacon_consensus::{BeaconForkChoiceUpdateError, BeaconOnNewPayloadError};
use jsonrpsee_types::error::{ErrorObject, INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};
use thiserror::Error;

/// The Engine API result type
pub type EngineApiResult<Ok> = Result<Ok, EngineApiError>;

/// Payload unknown error code.
pub const UNKNOWN_PAYLOAD_CODE: i32 = -38001;

/// Error returned by [`EngineApi`][crate::EngineApi]
#[derive(Error, Debug)]
pub enum EngineApiError {
    /// Unknown payload requested.
    #[error("Unknown payload")]
    UnknownPayload,
    /// A V1 method received withdrawals.
    #[error("withdrawals not supported in V1")]
    WithdrawalsNotSupportedInV1,
    /// Payload admission hit an infrastructure fault.
    #[error(transparent)]
    NewPayload(#[from] BeaconOnNewPayloadError),
    /// Forkchoice handling hit an infrastructure fault.
    #[error(transparent)]
    ForkChoiceUpdate(#[from] BeaconForkChoiceUpdateError),
}

impl EngineApiError {
    /// The JSON-RPC error code the error is reported with.
    pub const fn code(&self) -> i32 {
        match self {
            Self::UnknownPayload => UNKNOWN_PAYLOAD_CODE,
            Self::WithdrawalsNotSupportedInV1 => INVALID_PARAMS_CODE,
            // Any other server error
            Self::NewPayload(_) | Self::ForkChoiceUpdate(_) => INTERNAL_ERROR_CODE,
        }
    }
}

impl From<EngineApiError> for ErrorObject<'static> {
    fn from(error: EngineApiError) -> Self {
        ErrorObject::owned(error.code(), error.to_string(), None::<()>)
    }
}
