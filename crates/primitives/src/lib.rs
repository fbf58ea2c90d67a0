//! Commonly used types in fathom.
//!
//! This crate contains the block and header types the engine API hands to the execution layer,
//! the raw transaction envelope check, and the trie root helpers needed to recompute a block hash.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod block;
pub mod constants;
mod header;
pub mod proofs;
pub mod serde_helper;
mod transaction;
mod withdrawal;

pub use block::{BlockNumHash, SealedBlock};
pub use constants::{EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH, MAXIMUM_EXTRA_DATA_SIZE};
pub use header::{Header, SealedHeader};
pub use transaction::{TransactionDecodeError, TransactionEnvelope, TxType};
pub use withdrawal::Withdrawal;

pub use alloy_primitives::{
    self, address, b256, hex, keccak256, Address, BlockHash, BlockNumber, Bloom, Bytes,
    B256, B64, U256, U64,
};
