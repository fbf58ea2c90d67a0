#![allow(missing_docs)]

use bytes::BufMut;
use fathom_primitives::{
    proofs::{self, ordered_trie_root_with_encoder},
    serde_helper::{u64_hex, u64_hex_or_decimal},
    Address, BlockHash, Bloom, Bytes, Header, SealedBlock, SealedHeader, TransactionDecodeError,
    TransactionEnvelope, Withdrawal, B256, B64, EMPTY_OMMER_ROOT_HASH, U256,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An 8-byte identifier for an execution payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PayloadId(B64);

impl PayloadId {
    /// Creates a new payload id from the given identifier.
    pub fn new(id: [u8; 8]) -> Self {
        Self(B64::from(id))
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// This structure maps on the ExecutionPayload structure of the beacon chain spec.
///
/// Numeric fields are accepted as JSON numbers, hex quantities or decimal strings. A missing
/// `baseFeePerGas` or `prevRandao` defaults to zero, a missing `extraData` is kept as `None` so
/// the caller can reject it after the block hash was checked.
///
/// See also: <https://github.com/ethereum/execution-apis/blob/main/src/engine/paris.md#executionpayloadv1>
/// and <https://github.com/ethereum/execution-apis/blob/main/src/engine/shanghai.md#executionpayloadv2>
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    #[serde(default)]
    pub prev_randao: B256,
    #[serde(with = "u64_hex_or_decimal")]
    pub block_number: u64,
    #[serde(with = "u64_hex_or_decimal")]
    pub gas_limit: u64,
    #[serde(with = "u64_hex_or_decimal")]
    pub gas_used: u64,
    #[serde(with = "u64_hex_or_decimal")]
    pub timestamp: u64,
    #[serde(default)]
    pub extra_data: Option<Bytes>,
    #[serde(default)]
    pub base_fee_per_gas: U256,
    pub block_hash: B256,
    #[serde(default)]
    pub transactions: Vec<Bytes>,
    /// Array of [`Withdrawal`] enabled with V2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl ExecutionPayload {
    /// Builds the header this payload commits to.
    ///
    /// A missing `extraData` is hashed as empty bytes. A base fee above `u64::MAX` is clamped,
    /// [`ExecutionPayload::try_into_sealed_block`] rejects such payloads.
    pub fn header(&self) -> Header {
        let transactions_root =
            ordered_trie_root_with_encoder(&self.transactions, |tx, buf| buf.put_slice(tx));
        Header {
            parent_hash: self.parent_hash,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: self.fee_recipient,
            state_root: self.state_root,
            transactions_root,
            receipts_root: self.receipts_root,
            withdrawals_root: self
                .withdrawals
                .as_deref()
                .map(proofs::calculate_withdrawals_root),
            logs_bloom: self.logs_bloom,
            difficulty: U256::ZERO,
            number: self.block_number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            mix_hash: self.prev_randao,
            nonce: 0,
            base_fee_per_gas: Some(self.base_fee_per_gas.saturating_to::<u64>()),
            extra_data: self.extra_data.clone().unwrap_or_default(),
        }
    }

    /// Checks the payload in the order the engine reports problems and forms the sealed block.
    ///
    /// 1. the base fee must fit the header field
    /// 2. the declared block hash must match the hash computed from the fields
    /// 3. every transaction must decode
    /// 4. `extraData` must be present and not longer than `max_extra_data_size`
    pub fn try_into_sealed_block(
        self,
        max_extra_data_size: usize,
    ) -> Result<SealedBlock, PayloadError> {
        if u64::try_from(self.base_fee_per_gas).is_err() {
            return Err(PayloadError::BaseFee(self.base_fee_per_gas))
        }

        let header = self.header();
        let computed = header.hash_slow();
        if computed != self.block_hash {
            return Err(PayloadError::BlockHash { execution: computed, consensus: self.block_hash })
        }

        let body = self
            .transactions
            .into_iter()
            .map(TransactionEnvelope::decode_enveloped)
            .collect::<Result<Vec<_>, _>>()?;

        match &self.extra_data {
            None => return Err(PayloadError::MissingField("extraData")),
            Some(extra) if extra.len() > max_extra_data_size => {
                return Err(PayloadError::ExtraDataTooLarge { max: max_extra_data_size })
            }
            Some(_) => {}
        }

        Ok(SealedBlock::new(SealedHeader::new(header, self.block_hash), body, self.withdrawals))
    }
}

impl From<SealedBlock> for ExecutionPayload {
    fn from(value: SealedBlock) -> Self {
        let transactions = value.body.iter().map(|tx| tx.raw().clone()).collect();
        Self {
            parent_hash: value.parent_hash,
            fee_recipient: value.beneficiary,
            state_root: value.state_root,
            receipts_root: value.receipts_root,
            logs_bloom: value.logs_bloom,
            prev_randao: value.mix_hash,
            block_number: value.number,
            gas_limit: value.gas_limit,
            gas_used: value.gas_used,
            timestamp: value.timestamp,
            extra_data: Some(value.extra_data.clone()),
            base_fee_per_gas: U256::from(value.base_fee_per_gas.unwrap_or_default()),
            block_hash: value.hash(),
            transactions,
            withdrawals: value.withdrawals,
        }
    }
}

/// Error that can occur when handling payloads.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Invalid payload block hash.
    #[error("block hash mismatch: want {consensus}, got {execution}")]
    BlockHash {
        /// The block hash computed from the payload.
        execution: BlockHash,
        /// The block hash provided with the payload.
        consensus: BlockHash,
    },
    /// The base fee does not fit into 64 bits.
    #[error("invalid base fee per gas: {0}")]
    BaseFee(U256),
    /// A transaction of the payload could not be decoded.
    #[error("Failed to decode transactions from block parameter")]
    Transaction(#[from] TransactionDecodeError),
    /// A field required by the active fork is missing.
    #[error("Field {0} must not be null")]
    MissingField(&'static str),
    /// Invalid payload extra data.
    #[error("Field extraData exceeds maximum size of {max} bytes")]
    ExtraDataTooLarge {
        /// Maximum accepted length.
        max: usize,
    },
}

impl PayloadError {
    /// Returns `true` if the error is caused by a block hash mismatch.
    #[inline]
    pub const fn is_block_hash_mismatch(&self) -> bool {
        matches!(self, Self::BlockHash { .. })
    }
}

/// The execution payload returned by `engine_getPayloadV2`, with the value paid to the fee
/// recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayloadEnvelopeV2 {
    /// Execution payload
    pub execution_payload: ExecutionPayload,
    /// The expected value to be received by the fee recipient in wei
    pub block_value: U256,
}

/// This structure contains the attributes required to initiate a payload build process in the
/// context of an `engine_forkchoiceUpdated` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadAttributes {
    /// Value for the `timestamp` field of the new payload
    #[serde(with = "u64_hex")]
    pub timestamp: u64,
    /// Value for the `prevRandao` field of the new payload
    pub prev_randao: B256,
    /// Suggested value for the `feeRecipient` field of the new payload
    pub suggested_fee_recipient: Address,
    /// Array of [`Withdrawal`] enabled with V2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
}

/// This structure contains the result of processing a payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStatus {
    #[serde(flatten)]
    pub status: PayloadStatusEnum,
    /// Hash of the most recent valid block in the branch defined by payload and its ancestors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_valid_hash: Option<B256>,
}

impl PayloadStatus {
    pub const fn new(status: PayloadStatusEnum, latest_valid_hash: Option<B256>) -> Self {
        Self { status, latest_valid_hash }
    }

    pub const fn from_status(status: PayloadStatusEnum) -> Self {
        Self { status, latest_valid_hash: None }
    }

    /// `VALID` with the given block as latest valid hash.
    pub const fn valid(hash: B256) -> Self {
        Self::new(PayloadStatusEnum::Valid, Some(hash))
    }

    /// `INVALID` with an optional latest valid hash and validation error.
    pub const fn invalid(latest_valid_hash: Option<B256>, validation_error: Option<String>) -> Self {
        Self::new(PayloadStatusEnum::Invalid { validation_error }, latest_valid_hash)
    }

    /// `SYNCING` without latest valid hash.
    pub const fn syncing() -> Self {
        Self::from_status(PayloadStatusEnum::Syncing)
    }

    /// `ACCEPTED` without latest valid hash.
    pub const fn accepted() -> Self {
        Self::from_status(PayloadStatusEnum::Accepted)
    }

    /// `INVALID_BLOCK_HASH` without latest valid hash.
    pub const fn invalid_block_hash() -> Self {
        Self::from_status(PayloadStatusEnum::InvalidBlockHash)
    }

    pub fn with_latest_valid_hash(mut self, latest_valid_hash: B256) -> Self {
        self.latest_valid_hash = Some(latest_valid_hash);
        self
    }

    /// Returns the validation error, only ever set for `INVALID`.
    pub fn validation_error(&self) -> Option<&str> {
        self.status.validation_error()
    }

    pub const fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    pub const fn is_invalid(&self) -> bool {
        self.status.is_invalid()
    }

    pub const fn is_syncing(&self) -> bool {
        self.status.is_syncing()
    }
}

impl fmt::Display for PayloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PayloadStatus {{ status: {}, latestValidHash: {:?}",
            self.status, self.latest_valid_hash
        )?;
        if let Some(err) = self.validation_error() {
            write!(f, ", validationError: {err}")?;
        }
        f.write_str(" }")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadStatusEnum {
    /// VALID is returned by the engine API in the following calls:
    ///   - newPayload:       if the payload was already known or was just validated and executed
    ///   - forkchoiceUpdate: if the chain accepted the reorg (might ignore if it's stale)
    Valid,
    /// INVALID is returned by the engine API in the following calls:
    ///   - newPayload:       if the payload failed to execute on top of the local chain
    ///   - forkchoiceUpdate: if the new head is unknown, pre-merge, or reorg to it fails
    Invalid {
        #[serde(
            rename = "validationError",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        validation_error: Option<String>,
    },
    /// SYNCING is returned by the engine API in the following calls:
    ///   - newPayload:       if the payload was accepted on top of an active sync
    ///   - forkchoiceUpdate: if the new head was seen before, but not part of the chain
    Syncing,
    /// ACCEPTED is returned by the engine API in the following calls:
    ///   - newPayload: if the payload was accepted, but not processed (side chain)
    Accepted,
    /// INVALID_BLOCK_HASH is returned when the declared block hash does not match the payload.
    InvalidBlockHash,
}

impl PayloadStatusEnum {
    /// Returns the string representation of the payload status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid { .. } => "INVALID",
            Self::Syncing => "SYNCING",
            Self::Accepted => "ACCEPTED",
            Self::InvalidBlockHash => "INVALID_BLOCK_HASH",
        }
    }

    /// Returns the validation error if the payload status is invalid.
    pub fn validation_error(&self) -> Option<&str> {
        match self {
            Self::Invalid { validation_error } => validation_error.as_deref(),
            _ => None,
        }
    }

    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    pub const fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing)
    }
}

impl fmt::Display for PayloadStatusEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
