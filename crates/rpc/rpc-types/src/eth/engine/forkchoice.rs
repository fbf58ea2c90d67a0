use super::{PayloadId, PayloadStatus, PayloadStatusEnum};
use fathom_primitives::B256;
use serde::{Deserialize, Serialize};

/// This structure encapsulates the fork choice state
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceState {
    /// Hash of the head block.
    pub head_block_hash: B256,
    /// Hash of the safe block.
    pub safe_block_hash: B256,
    /// Hash of finalized block.
    pub finalized_block_hash: B256,
}

/// The result of an `engine_forkchoiceUpdated` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceUpdated {
    /// Status of the head block.
    pub payload_status: PayloadStatus,
    /// Id of the payload build process started for the supplied payload attributes, if any.
    pub payload_id: Option<PayloadId>,
}

impl ForkchoiceUpdated {
    /// Creates the result for the given status.
    pub const fn new(payload_status: PayloadStatus) -> Self {
        Self { payload_status, payload_id: None }
    }

    /// Creates the result from a bare status.
    pub const fn from_status(status: PayloadStatusEnum) -> Self {
        Self { payload_status: PayloadStatus::from_status(status), payload_id: None }
    }

    /// Sets the latest valid hash.
    pub fn with_latest_valid_hash(mut self, hash: B256) -> Self {
        self.payload_status.latest_valid_hash = Some(hash);
        self
    }

    /// Sets the payload id.
    pub fn with_payload_id(mut self, id: PayloadId) -> Self {
        self.payload_id = Some(id);
        self
    }

    /// Returns true if the payload status is syncing.
    pub const fn is_syncing(&self) -> bool {
        self.payload_status.is_syncing()
    }

    /// Returns true if the payload status is valid.
    pub const fn is_valid(&self) -> bool {
        self.payload_status.is_valid()
    }

    /// Returns true if the payload status is invalid.
    pub const fn is_invalid(&self) -> bool {
        self.payload_status.is_invalid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_forkchoice_updated() {
        let updated = ForkchoiceUpdated::from_status(PayloadStatusEnum::Valid)
            .with_latest_valid_hash(B256::with_last_byte(1))
            .with_payload_id(PayloadId::new([0, 0, 0, 0, 0, 0, 0, 1]));
        let json = serde_json::to_value(&updated).unwrap();
        assert_eq!(json["payloadStatus"]["status"], "VALID");
        assert_eq!(json["payloadId"], "0x0000000000000001");
        assert_eq!(serde_json::from_value::<ForkchoiceUpdated>(json).unwrap(), updated);
    }

    #[test]
    fn serde_forkchoice_state() {
        let state = r#"{"headBlockHash":"0x0000000000000000000000000000000000000000000000000000000000000001","safeBlockHash":"0x0000000000000000000000000000000000000000000000000000000000000000","finalizedBlockHash":"0x0000000000000000000000000000000000000000000000000000000000000000"}"#;
        let state: ForkchoiceState = serde_json::from_str(state).unwrap();
        assert_eq!(state.head_block_hash, B256::with_last_byte(1));
        assert!(state.safe_block_hash.is_zero());
    }
}
