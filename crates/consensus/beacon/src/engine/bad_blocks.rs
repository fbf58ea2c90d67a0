use fathom_primitives::{BlockHash, BlockNumHash, SealedBlock};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

/// Append-only record of blocks that failed validation.
///
/// Each entry keeps the latest valid ancestor that was known when the block was rejected, so
/// that repeated submissions of the same block can be answered without processing it again.
#[derive(Debug, Default)]
pub struct BadBlockRegistry {
    entries: RwLock<HashMap<BlockHash, BadBlockEntry>>,
}

#[derive(Debug, Clone, Copy)]
struct BadBlockEntry {
    block: BlockNumHash,
    latest_valid_hash: Option<BlockHash>,
}

impl BadBlockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the block was recorded as bad.
    pub fn is_bad_block(&self, hash: &BlockHash) -> bool {
        self.entries.read().contains_key(hash)
    }

    /// Returns the latest valid ancestor recorded for a bad block.
    ///
    /// `None` both for unknown blocks and for bad blocks recorded without an ancestor, use
    /// [`BadBlockRegistry::is_bad_block`] to tell them apart.
    pub fn latest_valid_hash_of_bad_block(&self, hash: &BlockHash) -> Option<BlockHash> {
        self.entries.read().get(hash).and_then(|entry| entry.latest_valid_hash)
    }

    /// Records the block as bad. The first record of a hash wins.
    pub fn record_bad_block(&self, block: &SealedBlock, latest_valid_hash: Option<BlockHash>) {
        let mut entries = self.entries.write();
        if entries.contains_key(&block.hash()) {
            return
        }
        warn!(
            target: "engine::admission",
            number = block.number,
            hash = %block.hash(),
            latest_valid_hash = ?latest_valid_hash,
            "Recording bad block"
        );
        entries.insert(block.hash(), BadBlockEntry { block: block.num_hash(), latest_valid_hash });
    }

    /// All recorded bad blocks, unordered.
    pub fn bad_blocks(&self) -> Vec<BlockNumHash> {
        self.entries.read().values().map(|entry| entry.block).collect()
    }

    /// Number of recorded bad blocks.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no block was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
