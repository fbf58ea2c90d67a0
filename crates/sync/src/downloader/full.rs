use super::{stopped, StopSignal};
use crate::{
    traits::{ChainDownloader, SyncTerminationCondition},
    SyncError, SyncState, TrailingPeerRequirements,
};
use futures::{future::BoxFuture, FutureExt};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, trace};

/// How long full sync waits before asking peers again when they had no new blocks.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(1);

/// Imports and executes blocks one batch at a time until stopped or the termination condition
/// says to stop.
pub struct FullSyncDownloader {
    chain: Arc<dyn ChainDownloader>,
    termination: Arc<dyn SyncTerminationCondition>,
    sync_state: Arc<SyncState>,
    max_trailing_peers: Option<usize>,
    idle_interval: Duration,
    stop: StopSignal,
}

impl FullSyncDownloader {
    /// Creates the downloader. `max_trailing_peers` is unrestricted when `None`.
    pub fn new(
        chain: Arc<dyn ChainDownloader>,
        termination: Arc<dyn SyncTerminationCondition>,
        sync_state: Arc<SyncState>,
        max_trailing_peers: Option<usize>,
    ) -> Self {
        Self {
            chain,
            termination,
            sync_state,
            max_trailing_peers,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            stop: StopSignal::default(),
        }
    }

    /// Sets the pause between attempts when peers had nothing new.
    pub const fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    /// Starts importing. Resolves once stopped or terminated.
    pub fn start(&self) -> BoxFuture<'static, Result<(), SyncError>> {
        let stop = self.stop.arm();
        let chain = self.chain.clone();
        let termination = self.termination.clone();
        let sync_state = self.sync_state.clone();
        let idle_interval = self.idle_interval;
        let import = async move {
            info!(target: "sync::full", head = sync_state.local_head(), "Starting full sync");
            loop {
                if termination.should_stop_download() {
                    let head = sync_state.local_head();
                    info!(target: "sync::full", head, "Full sync terminated");
                    return Ok(())
                }
                match chain.import_next_batch().await? {
                    Some(head) => {
                        trace!(target: "sync::full", head, "Imported batch");
                        sync_state.set_local_head(head);
                    }
                    None => tokio::time::sleep(idle_interval).await,
                }
            }
        };
        async move {
            tokio::select! {
                res = import => res,
                _ = stopped(stop) => {
                    debug!(target: "sync::full", "Full sync stopped");
                    Ok(())
                }
            }
        }
        .boxed()
    }

    /// Stops importing.
    pub fn stop(&self) {
        self.stop.trigger();
    }

    /// Peers that trail the local head may be evicted while importing.
    ///
    /// `None` when no import is running, unrestricted once the node is in sync.
    pub fn trailing_peer_requirements(&self) -> Option<TrailingPeerRequirements> {
        if !self.stop.is_armed() {
            return None
        }
        if self.sync_state.is_in_sync() {
            return Some(TrailingPeerRequirements::UNRESTRICTED)
        }
        Some(TrailingPeerRequirements::new(
            self.sync_state.local_head(),
            self.max_trailing_peers.unwrap_or(usize::MAX),
        ))
    }
}

impl std::fmt::Debug for FullSyncDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullSyncDownloader")
            .field("max_trailing_peers", &self.max_trailing_peers)
            .field("idle_interval", &self.idle_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{wait_until, TestChainDownloader, TestTermination};
    use assert_matches::assert_matches;

    fn downloader(
        chain: Arc<TestChainDownloader>,
        termination: Arc<TestTermination>,
        sync_state: Arc<SyncState>,
    ) -> FullSyncDownloader {
        FullSyncDownloader::new(chain, termination, sync_state, Some(4))
            .with_idle_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn imports_until_stopped() {
        let chain = Arc::new(TestChainDownloader::default());
        chain.push_batches([10, 20, 30]);
        let sync_state = Arc::new(SyncState::new());
        let full = downloader(chain.clone(), Arc::default(), sync_state.clone());

        assert_eq!(full.trailing_peer_requirements(), None);

        let run = tokio::spawn(full.start());
        wait_until(|| sync_state.local_head() == 30).await;
        assert_eq!(full.trailing_peer_requirements(), Some(TrailingPeerRequirements::new(30, 4)));

        full.stop();
        assert_matches!(run.await.unwrap(), Ok(()));
        assert_eq!(full.trailing_peer_requirements(), None);
    }

    #[tokio::test]
    async fn in_sync_keeps_trailing_peers() {
        let chain = Arc::new(TestChainDownloader::default());
        chain.push_batches([10]);
        let sync_state = Arc::new(SyncState::new());
        sync_state.mark_initial_sync_phase_done();
        sync_state.set_best_chain_height(10);
        let full = downloader(chain, Arc::default(), sync_state.clone());

        let run = tokio::spawn(full.start());
        wait_until(|| sync_state.local_head() == 10).await;
        assert_eq!(full.trailing_peer_requirements(), Some(TrailingPeerRequirements::UNRESTRICTED));

        full.stop();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn terminated_run_releases_trailing_peers() {
        let chain = Arc::new(TestChainDownloader::default());
        let termination = Arc::new(TestTermination::default());
        termination.set_stop(true);
        let full = downloader(chain, termination, Arc::new(SyncState::new()));

        full.start().await.unwrap();
        assert_eq!(full.trailing_peer_requirements(), None);
    }

    #[tokio::test]
    async fn terminates_on_condition() {
        let chain = Arc::new(TestChainDownloader::default());
        let termination = Arc::new(TestTermination::default());
        let full = downloader(chain.clone(), termination.clone(), Arc::new(SyncState::new()));

        let run = tokio::spawn(full.start());
        wait_until(|| chain.batch_calls() > 0).await;
        termination.set_stop(true);
        assert_matches!(run.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn import_errors_end_the_run() {
        let chain = Arc::new(TestChainDownloader::default());
        chain.fail_batches(SyncError::ChainDownload("no peers".into()));
        let full = downloader(chain, Arc::default(), Arc::new(SyncState::new()));
        assert_matches!(full.start().await, Err(SyncError::ChainDownload(_)));
    }
}
