use crate::provider::ProviderResult;
use async_trait::async_trait;
use fathom_primitives::{BlockHash, SealedHeader, B256};

/// Resolves how much of a block's ancestry is known to be valid.
#[async_trait]
pub trait AncestorResolver: Send + Sync {
    /// Returns the hash of the most recent ancestor of `header` that is known to be valid, or
    /// `None` if it cannot be determined yet.
    async fn latest_valid_ancestor(&self, header: &SealedHeader)
        -> ProviderResult<Option<BlockHash>>;

    /// Same as [`AncestorResolver::latest_valid_ancestor`] but starting from a block hash,
    /// which is all that is left when the block itself could not be formed.
    async fn latest_valid_ancestor_by_hash(
        &self,
        hash: BlockHash,
    ) -> ProviderResult<Option<BlockHash>>;

    /// Returns `true` if the latest valid ancestor of `header` descends from the terminal
    /// proof-of-work block.
    async fn descends_from_terminal(&self, header: &SealedHeader) -> ProviderResult<bool>;
}

/// A forkchoice update as announced by the consensus layer, before the execution layer has
/// looked at any of the referenced blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ForkchoiceEvent {
    /// Hash of the announced head block.
    pub head_block_hash: B256,
    /// Hash of the announced safe block.
    pub safe_block_hash: B256,
    /// Hash of the announced finalized block.
    pub finalized_block_hash: B256,
}

impl ForkchoiceEvent {
    /// Returns `true` if a safe block was announced.
    pub fn has_valid_safe_block_hash(&self) -> bool {
        !self.safe_block_hash.is_zero()
    }

    /// Returns `true` if a finalized block was announced.
    pub fn has_valid_finalized_block_hash(&self) -> bool {
        !self.finalized_block_hash.is_zero()
    }
}

/// Receives forkchoice updates that have not been verified yet.
///
/// Implementations must not block the caller.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait ForkchoiceListener: Send + Sync {
    /// Called for every forkchoice update received from the consensus layer.
    fn on_new_unverified_forkchoice(&self, event: &ForkchoiceEvent);
}

/// Observes that the consensus layer is driving the execution engine.
///
/// Called once per engine API call, whatever the outcome of the call.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait EngineCallListener: Send + Sync {
    /// An engine API call was received.
    fn execution_engine_called(&self);
}
