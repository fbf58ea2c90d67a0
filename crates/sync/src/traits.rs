//! Components the synchronizer drives but does not own.

use crate::SyncError;
use async_trait::async_trait;
use fathom_interfaces::{consensus::ForkchoiceEvent, InfrastructureFault};
use fathom_primitives::{BlockHash, BlockNumHash, BlockNumber, SealedHeader};
use futures::future::BoxFuture;

/// The world state storage of the node.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait WorldStateArchive: Send + Sync {
    /// Makes the state at `pivot` the current state without verifying it against earlier blocks.
    fn set_archive_state_unsafe(&self, pivot: &SealedHeader) -> Result<(), InfrastructureFault>;

    /// Returns `true` if missing trie nodes can be fetched from peers on demand.
    fn supports_fallback_lookup(&self) -> bool;

    /// Starts fetching missing trie nodes from peers.
    fn use_fallback_node_finder(&self);
}

/// Background pruning of old state.
pub trait Pruner: Send + Sync {
    /// Starts pruning.
    fn start(&self);

    /// Requests the pruner to stop.
    fn stop(&self);

    /// Resolves once the pruner stopped.
    fn await_stop(&self) -> BoxFuture<'static, ()>;
}

/// Imports new blocks announced by peers or the consensus layer once the node is caught up.
pub trait BlockPropagation: Send + Sync {
    /// Starts listening for new blocks.
    fn start(&self);

    /// Stops listening for new blocks.
    fn stop(&self);

    /// Returns `true` while started.
    fn is_running(&self) -> bool;

    /// Receives forkchoice updates from the consensus layer. Must not block.
    fn on_new_unverified_forkchoice(&self, event: &ForkchoiceEvent);
}

/// Decides when the node stops downloading blocks.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait SyncTerminationCondition: Send + Sync {
    /// Returns `true` once no more blocks should be downloaded.
    fn should_stop_download(&self) -> bool;

    /// Returns `true` while blocks should still be downloaded.
    fn should_continue_download(&self) -> bool {
        !self.should_stop_download()
    }
}

/// Termination condition of a node that follows the chain forever.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct NeverTerminate;

impl SyncTerminationCondition for NeverTerminate {
    fn should_stop_download(&self) -> bool {
        false
    }
}

/// How the world state at the pivot is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateSyncMethod {
    /// Trie node by trie node, starting at the state root.
    TrieNodes,
    /// Flat account and storage ranges, healed into a trie afterwards.
    Snap,
}

/// Downloads and imports blocks from peers.
#[async_trait]
pub trait ChainDownloader: Send + Sync {
    /// Imports headers, bodies and receipts from `start` up to `pivot` without executing them.
    ///
    /// `start` is the trusted checkpoint to begin from, genesis when `None`.
    async fn import_to_pivot(
        &self,
        start: Option<BlockNumHash>,
        pivot: &SealedHeader,
    ) -> Result<(), SyncError>;

    /// Downloads and executes the next batch of blocks on top of the local head.
    ///
    /// Returns the new local head, `None` if peers had nothing new.
    async fn import_next_batch(&self) -> Result<Option<BlockNumber>, SyncError>;
}

/// Downloads the world state at a pivot block.
#[async_trait]
pub trait WorldStateDownloader: Send + Sync {
    /// Fetches the complete state committed to by `pivot`.
    async fn download_state(
        &self,
        pivot: &SealedHeader,
        method: StateSyncMethod,
    ) -> Result<(), SyncError>;
}

/// Persists the pivot of a catch-up run so an interrupted run can resume.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait CatchUpStateStore: Send + Sync {
    /// The pivot of an unfinished run.
    fn load_pivot(&self) -> Result<Option<SealedHeader>, InfrastructureFault>;

    /// Persists the pivot of the current run.
    fn store_pivot(&self, pivot: &SealedHeader) -> Result<(), InfrastructureFault>;

    /// Discards the persisted pivot.
    fn delete(&self) -> Result<(), InfrastructureFault>;
}

/// Chain heads announced by connected peers.
#[async_trait]
pub trait PeerChainHeads: Send + Sync {
    /// Head block numbers of all peers that reported one.
    fn peer_heads(&self) -> Vec<BlockNumber>;

    /// Fetches a header by number from peers.
    async fn header_by_number(
        &self,
        number: BlockNumber,
    ) -> Result<Option<SealedHeader>, InfrastructureFault>;

    /// Fetches a header by hash from peers.
    async fn header_by_hash(
        &self,
        hash: BlockHash,
    ) -> Result<Option<SealedHeader>, InfrastructureFault>;
}
