use super::{stopped, CatchUpDownloader, CatchUpOutcome, StopSignal};
use crate::{
    pivot::PivotBlockSelector,
    traits::{CatchUpStateStore, ChainDownloader, StateSyncMethod, WorldStateDownloader},
    SyncError, SyncState, TrailingPeerRequirements,
};
use fathom_config::{CheckpointConfig, SyncMode};
use fathom_primitives::{BlockNumHash, SealedHeader};
use futures::{future::BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Catch-up for fast, snap and checkpoint sync.
///
/// Picks a pivot block (or resumes the persisted one), then imports the chain up to the pivot
/// while downloading the world state at the pivot.
#[derive(Debug)]
pub struct PivotedSyncDownloader {
    inner: Arc<PivotedInner>,
    stop: StopSignal,
}

struct PivotedInner {
    mode: SyncMode,
    resync: bool,
    checkpoint: Option<CheckpointConfig>,
    pivot_selector: Arc<dyn PivotBlockSelector>,
    chain: Arc<dyn ChainDownloader>,
    world_state: Arc<dyn WorldStateDownloader>,
    store: Arc<dyn CatchUpStateStore>,
    sync_state: Arc<SyncState>,
    pivot: RwLock<Option<SealedHeader>>,
}

impl PivotedSyncDownloader {
    /// Creates the downloader for one catch-up attempt.
    ///
    /// A `resync` instance ignores the persisted pivot.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: SyncMode,
        resync: bool,
        checkpoint: Option<CheckpointConfig>,
        pivot_selector: Arc<dyn PivotBlockSelector>,
        chain: Arc<dyn ChainDownloader>,
        world_state: Arc<dyn WorldStateDownloader>,
        store: Arc<dyn CatchUpStateStore>,
        sync_state: Arc<SyncState>,
    ) -> Self {
        Self {
            inner: Arc::new(PivotedInner {
                mode,
                resync,
                checkpoint,
                pivot_selector,
                chain,
                world_state,
                store,
                sync_state,
                pivot: RwLock::new(None),
            }),
            stop: StopSignal::default(),
        }
    }

    /// The sync mode this instance runs.
    pub fn mode(&self) -> SyncMode {
        self.inner.mode
    }

    /// The pivot of the current run, once chosen.
    pub fn pivot(&self) -> Option<SealedHeader> {
        self.inner.pivot.read().clone()
    }
}

impl PivotedInner {
    const fn state_sync_method(&self) -> StateSyncMethod {
        match self.mode {
            SyncMode::Fast => StateSyncMethod::TrieNodes,
            _ => StateSyncMethod::Snap,
        }
    }

    async fn resolve_pivot(&self) -> Result<SealedHeader, SyncError> {
        if !self.resync {
            if let Some(pivot) = self.store.load_pivot()? {
                info!(
                    target: "sync::catch_up",
                    number = pivot.number,
                    hash = %pivot.hash(),
                    "Resuming with persisted pivot"
                );
                return Ok(pivot)
            }
        }
        let pivot = self.pivot_selector.select_pivot().await?;
        self.store.store_pivot(&pivot)?;
        Ok(pivot)
    }

    async fn run(&self) -> Result<CatchUpOutcome, SyncError> {
        info!(
            target: "sync::catch_up",
            mode = %self.mode,
            resync = self.resync,
            "Starting catch-up"
        );
        let pivot = self.resolve_pivot().await?;

        if let Some(checkpoint) = self.checkpoint {
            if pivot.number < checkpoint.number {
                return Err(SyncError::PivotBelowCheckpoint {
                    pivot: pivot.number,
                    checkpoint: checkpoint.number,
                })
            }
        }

        *self.pivot.write() = Some(pivot.clone());
        if self.sync_state.best_chain_height() < pivot.number {
            self.sync_state.set_best_chain_height(pivot.number);
        }

        let start = self
            .checkpoint
            .map(|checkpoint| BlockNumHash::new(checkpoint.number, checkpoint.hash));
        debug!(
            target: "sync::catch_up",
            ?start,
            pivot = pivot.number,
            "Downloading chain and state"
        );
        futures::try_join!(
            self.chain.import_to_pivot(start, &pivot),
            self.world_state.download_state(&pivot, self.state_sync_method()),
        )?;

        self.sync_state.set_local_head(pivot.number);
        Ok(CatchUpOutcome { pivot })
    }
}

impl CatchUpDownloader for PivotedSyncDownloader {
    fn start(&self) -> BoxFuture<'static, Result<CatchUpOutcome, SyncError>> {
        let stop = self.stop.arm();
        let inner = self.inner.clone();
        async move {
            tokio::select! {
                res = inner.run() => res,
                _ = stopped(stop) => {
                    debug!(target: "sync::catch_up", "Catch-up stopped");
                    Err(SyncError::Stopped)
                }
            }
        }
        .boxed()
    }

    fn stop(&self) {
        self.stop.trigger();
    }

    fn delete_state(&self) -> Result<(), SyncError> {
        self.inner.store.delete()?;
        Ok(())
    }

    fn trailing_peer_requirements(&self) -> Option<TrailingPeerRequirements> {
        if !self.stop.is_armed() || self.inner.sync_state.is_initial_sync_phase_done() {
            return None
        }
        self.pivot().map(|pivot| TrailingPeerRequirements::new(pivot.number, 0))
    }

    fn is_resync(&self) -> bool {
        self.inner.resync
    }
}

impl std::fmt::Debug for PivotedInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PivotedInner")
            .field("mode", &self.mode)
            .field("resync", &self.resync)
            .field("checkpoint", &self.checkpoint)
            .field("pivot", &self.pivot.read().as_ref().map(|pivot| pivot.num_hash()))
            .finish_non_exhaustive()
    }
}
