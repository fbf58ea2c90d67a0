//! Traits used when interacting with the sync status of the node.

use crate::InfrastructureFault;
use fathom_primitives::{BlockHash, SealedBlock};
use futures::future::BoxFuture;

/// A type that provides information about whether the node is currently syncing.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait SyncStateProvider: Send + Sync {
    /// Returns `true` while the initial catch-up sync has not completed.
    fn is_syncing(&self) -> bool;
}

/// Errors of a backward sync run.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BackwardSyncError {
    /// No peer could serve the requested ancestors.
    #[error("no peer could serve ancestors of {0}")]
    NoPeers(BlockHash),
    /// The downloaded chain does not connect to the local chain.
    #[error("downloaded chain does not connect to the local chain")]
    Disconnected,
    /// Backward sync was stopped before completing.
    #[error("backward sync aborted")]
    Aborted,
    /// Storage failure while importing ancestors.
    #[error(transparent)]
    Fault(#[from] InfrastructureFault),
}

/// Fetches the missing ancestors of blocks whose parent is not known locally.
pub trait BackwardSync: Send + Sync {
    /// Hands a block with an unknown parent to backward sync. The future completes once the
    /// block's ancestry is imported or sync gave up.
    fn append_payload_to_sync(
        &self,
        block: SealedBlock,
    ) -> BoxFuture<'static, Result<(), BackwardSyncError>>;

    /// Starts fetching the chain ending at `head`, known only by its hash.
    fn sync_to_head(&self, head: BlockHash) -> BoxFuture<'static, Result<(), BackwardSyncError>>;
}
