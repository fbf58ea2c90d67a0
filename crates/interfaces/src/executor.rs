use crate::InfrastructureFault;
use async_trait::async_trait;
use fathom_primitives::{SealedBlock, B256};

/// What block processing produced for a block that was successfully imported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockProcessingOutputs {
    /// Gas used by all transactions.
    pub gas_used: u64,
    /// State root after the block.
    pub state_root: B256,
}

/// The outcome of executing and importing a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockProcessingResult {
    /// The block was executed and imported.
    Success(BlockProcessingOutputs),
    /// The block's content is invalid.
    Failure(String),
    /// Processing was aborted by a fault of the node's own infrastructure.
    Fault(InfrastructureFault),
}

impl BlockProcessingResult {
    /// Returns `true` if the block was imported.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Executes a block on top of its parent state and imports it.
///
/// Infrastructure faults can surface either as [`BlockProcessingResult::Fault`] or as an `Err`,
/// callers must treat both the same way.
#[async_trait]
pub trait BlockProcessor: Send + Sync {
    /// Validate, execute and import the block.
    async fn process_block(
        &self,
        block: &SealedBlock,
    ) -> Result<BlockProcessingResult, InfrastructureFault>;
}
