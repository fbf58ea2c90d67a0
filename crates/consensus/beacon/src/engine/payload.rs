use fathom_primitives::{keccak256, SealedBlock, Withdrawal, B256, U256};
use fathom_rpc_types::engine::{ExecutionPayload, PayloadAttributes, PayloadId};

/// A payload built for the consensus layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPayload {
    block: SealedBlock,
    fees: U256,
}

impl BuiltPayload {
    /// Wraps a built block together with the fees its proposer collects.
    pub const fn new(block: SealedBlock, fees: U256) -> Self {
        Self { block, fees }
    }

    /// The built block.
    pub const fn block(&self) -> &SealedBlock {
        &self.block
    }

    /// Fees collected by the fee recipient, reported as `blockValue`.
    pub const fn fees(&self) -> U256 {
        self.fees
    }

    /// The block as an engine API payload.
    pub fn to_execution_payload(&self) -> ExecutionPayload {
        self.block.clone().into()
    }
}

/// Errors when starting a payload build.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PayloadBuilderError {
    /// The attributes ask for a block that is not younger than its parent.
    #[error(
        "payload attributes timestamp {attributes} is not greater than parent timestamp {parent}"
    )]
    InvalidTimestamp {
        /// Timestamp of the parent block.
        parent: u64,
        /// Requested timestamp.
        attributes: u64,
    },
    /// The builder refused the job.
    #[error("payload builder failed: {0}")]
    Failed(String),
}

/// Builds payloads on request of the consensus layer and keeps them until they are fetched.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait PayloadStore: Send + Sync {
    /// Starts building a block on top of `parent`.
    fn start_payload(
        &self,
        parent: B256,
        attributes: PayloadAttributes,
    ) -> Result<PayloadId, PayloadBuilderError>;

    /// Returns the best payload built so far for the id.
    fn get_payload(&self, id: PayloadId) -> Option<BuiltPayload>;
}

/// Derives the id of a payload build from its parent and attributes.
///
/// The same request always yields the same id.
pub fn payload_id(parent: &B256, attributes: &PayloadAttributes) -> PayloadId {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(parent.as_slice());
    buf.extend_from_slice(&attributes.timestamp.to_be_bytes());
    buf.extend_from_slice(attributes.prev_randao.as_slice());
    buf.extend_from_slice(attributes.suggested_fee_recipient.as_slice());
    if let Some(withdrawals) = &attributes.withdrawals {
        alloy_rlp::encode_list::<_, Withdrawal>(withdrawals, &mut buf);
    }
    let hash = keccak256(&buf);
    let mut id = [0u8; 8];
    id.copy_from_slice(&hash[..8]);
    PayloadId::new(id)
}
