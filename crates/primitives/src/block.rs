use crate::{SealedHeader, TransactionEnvelope, Withdrawal};
use alloy_primitives::{BlockHash, BlockNumber, B256};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Deref};

/// A block number and hash pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockNumHash {
    /// Block number
    pub number: BlockNumber,
    /// Block hash
    pub hash: BlockHash,
}

impl BlockNumHash {
    /// Creates a new `BlockNumHash` from a block number and hash.
    pub const fn new(number: BlockNumber, hash: BlockHash) -> Self {
        Self { number, hash }
    }
}

impl fmt::Display for BlockNumHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.number, self.hash)
    }
}

impl From<(BlockNumber, BlockHash)> for BlockNumHash {
    fn from((number, hash): (BlockNumber, BlockHash)) -> Self {
        Self { number, hash }
    }
}

/// Sealed Ethereum full block.
///
/// Withdrawals are only present for blocks received through a V2 (Shanghai) payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SealedBlock {
    /// Locked block header.
    pub header: SealedHeader,
    /// Transactions with their raw encoding.
    pub body: Vec<TransactionEnvelope>,
    /// Block withdrawals.
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl SealedBlock {
    /// Create a new sealed block instance using the sealed header and the body parts.
    #[inline]
    pub const fn new(
        header: SealedHeader,
        body: Vec<TransactionEnvelope>,
        withdrawals: Option<Vec<Withdrawal>>,
    ) -> Self {
        Self { header, body, withdrawals }
    }

    /// Header hash.
    #[inline]
    pub const fn hash(&self) -> B256 {
        self.header.hash()
    }

    /// Returns the block number and hash.
    #[inline]
    pub const fn num_hash(&self) -> BlockNumHash {
        self.header.num_hash()
    }

    /// Returns the sealed header of the block.
    #[inline]
    pub const fn sealed_header(&self) -> &SealedHeader {
        &self.header
    }

    /// Returns an iterator over the hashes of all transactions in the block.
    pub fn transaction_hashes(&self) -> impl Iterator<Item = B256> + '_ {
        self.body.iter().map(|tx| tx.hash())
    }
}

impl Deref for SealedBlock {
    type Target = SealedHeader;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}
