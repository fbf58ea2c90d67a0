//! Raw transaction envelopes as they arrive in an execution payload.
//!
//! Every entry is decoded as a signed EIP-2718 transaction before a block is formed from it.
//! Signature recovery and execution are the block processor's concern.

use alloy_consensus::TxEnvelope;
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{keccak256, Bytes, B256};
use std::fmt;

/// Transaction types this node accepts in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxType {
    /// Pre EIP-2718 transaction, a bare RLP list.
    Legacy,
    /// Access list transaction.
    Eip2930,
    /// Dynamic fee transaction.
    Eip1559,
    /// Blob transaction.
    Eip4844,
}

impl TryFrom<u8> for TxType {
    type Error = TransactionDecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::Eip2930),
            2 => Ok(Self::Eip1559),
            3 => Ok(Self::Eip4844),
            ty => Err(TransactionDecodeError::UnsupportedType(ty)),
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Eip2930 => f.write_str("eip2930"),
            Self::Eip1559 => f.write_str("eip1559"),
            Self::Eip4844 => f.write_str("eip4844"),
        }
    }
}

/// Reasons a raw transaction could not be decoded.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransactionDecodeError {
    /// The transaction bytes were empty.
    #[error("empty transaction bytes")]
    Empty,
    /// Transaction type not accepted in a payload.
    #[error("unsupported transaction type {0}")]
    UnsupportedType(u8),
    /// Bytes left after the envelope.
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
    /// The envelope or one of its fields is malformed.
    #[error("malformed transaction: {0}")]
    Malformed(String),
}

/// A signed transaction in its EIP-2718 encoding, together with its hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionEnvelope {
    tx_type: TxType,
    hash: B256,
    raw: Bytes,
}

impl TransactionEnvelope {
    /// Decodes an enveloped transaction as it appears in the `transactions` list of a payload.
    ///
    /// A legacy transaction is a bare RLP list, a typed transaction is a type byte followed by
    /// the RLP list of its fields. All fields and the signature values are decoded, and the
    /// bytes must hold exactly one transaction.
    pub fn decode_enveloped(raw: Bytes) -> Result<Self, TransactionDecodeError> {
        if raw.is_empty() {
            return Err(TransactionDecodeError::Empty)
        }

        let mut buf = raw.as_ref();
        let tx = TxEnvelope::decode_2718(&mut buf)
            .map_err(|err| TransactionDecodeError::Malformed(err.to_string()))?;
        if !buf.is_empty() {
            return Err(TransactionDecodeError::TrailingBytes(buf.len()))
        }
        let tx_type = TxType::try_from(u8::from(tx.tx_type()))?;

        let hash = keccak256(&raw);
        Ok(Self { tx_type, hash, raw })
    }

    /// Transaction hash, the keccak of the enveloped encoding.
    #[inline]
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    /// The transaction type.
    #[inline]
    pub const fn tx_type(&self) -> TxType {
        self.tx_type
    }

    /// The enveloped encoding, which is also the transactions trie value.
    #[inline]
    pub const fn raw(&self) -> &Bytes {
        &self.raw
    }
}
