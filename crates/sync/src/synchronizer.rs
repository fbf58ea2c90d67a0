use crate::{
    downloader::{CatchUpDownloader, CatchUpOutcome, FullSyncDownloader},
    pivot::PivotBlockSelector,
    state::{SubscriptionId, SyncStatus},
    traits::{BlockPropagation, Pruner, SyncTerminationCondition, WorldStateArchive},
    SyncError, SyncState, SynchronizerError, TrailingPeerRequirements,
};
use fathom_interfaces::consensus::{ForkchoiceEvent, ForkchoiceListener};
use futures::{future::BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use tracing::{debug, info, warn};

/// Creates the catch-up downloader of an attempt, the flag marks resync attempts.
pub(crate) type CatchUpFactory = Box<dyn Fn(bool) -> Arc<dyn CatchUpDownloader> + Send + Sync>;

/// Everything the [`Synchronizer`] drives, assembled by the
/// [`SynchronizerBuilder`](crate::SynchronizerBuilder).
pub(crate) struct SynchronizerParts {
    pub(crate) sync_state: Arc<SyncState>,
    pub(crate) world_state: Arc<dyn WorldStateArchive>,
    pub(crate) termination: Arc<dyn SyncTerminationCondition>,
    pub(crate) pivot_selector: Option<Arc<dyn PivotBlockSelector>>,
    pub(crate) catch_up_factory: Option<CatchUpFactory>,
    pub(crate) full_sync: Option<Arc<FullSyncDownloader>>,
    pub(crate) block_propagation: Option<Arc<dyn BlockPropagation>>,
    pub(crate) pruner: Option<Arc<dyn Pruner>>,
}

/// Orchestrates the sync of the node.
///
/// On [`Synchronizer::start`] the configured catch-up strategy runs first. Once it completes,
/// the downloaded state becomes the node's state, the initial sync phase is marked as done and
/// full sync takes over until the termination condition says to stop. Without a catch-up
/// strategy full sync starts right away.
///
/// The handle is cheap to clone, all clones drive the same synchronizer.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<SynchronizerInner>,
}

struct SynchronizerInner {
    sync_state: Arc<SyncState>,
    world_state: Arc<dyn WorldStateArchive>,
    termination: Arc<dyn SyncTerminationCondition>,
    pivot_selector: Option<Arc<dyn PivotBlockSelector>>,
    catch_up_factory: Option<CatchUpFactory>,
    /// The catch-up downloader of the current attempt.
    catch_up: RwLock<Option<Arc<dyn CatchUpDownloader>>>,
    full_sync: Option<Arc<FullSyncDownloader>>,
    block_propagation: Option<Arc<dyn BlockPropagation>>,
    pruner: Option<Arc<dyn Pruner>>,
    running: AtomicBool,
    /// Incremented on every start, completions of older runs are ignored.
    run_id: AtomicU64,
    fallback_enabled: AtomicBool,
    /// Serializes start, stop and the completion of a run.
    lifecycle: Mutex<()>,
}

impl Synchronizer {
    pub(crate) fn from_parts(parts: SynchronizerParts) -> Self {
        let SynchronizerParts {
            sync_state,
            world_state,
            termination,
            pivot_selector,
            catch_up_factory,
            full_sync,
            block_propagation,
            pruner,
        } = parts;
        let catch_up = catch_up_factory.as_ref().map(|factory| factory(false));
        Self {
            inner: Arc::new(SynchronizerInner {
                sync_state,
                world_state,
                termination,
                pivot_selector,
                catch_up_factory,
                catch_up: RwLock::new(catch_up),
                full_sync,
                block_propagation,
                pruner,
                running: AtomicBool::new(false),
                run_id: AtomicU64::new(0),
                fallback_enabled: AtomicBool::new(false),
                lifecycle: Mutex::new(()),
            }),
        }
    }

    /// The shared sync state.
    pub fn sync_state(&self) -> &Arc<SyncState> {
        &self.inner.sync_state
    }

    /// Returns `true` while a run is active.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Starts syncing on the current tokio runtime.
    ///
    /// The returned future resolves when the run completed or was stopped. Dropping it does not
    /// stop the run.
    pub fn start(&self) -> Result<BoxFuture<'static, Result<(), SyncError>>, SynchronizerError> {
        let _guard = self.inner.lifecycle.lock();
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SynchronizerError::AlreadyRunning)
        }
        let run_id = self.inner.run_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!(target: "sync::synchronizer", run_id, "Starting synchronizer");

        if let Some(propagation) = &self.inner.block_propagation {
            if !propagation.is_running() {
                propagation.start();
            }
        }

        let catch_up = self.inner.catch_up.read().clone().map(|downloader| {
            let run = downloader.start();
            (downloader, run)
        });
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let res = inner.run(run_id, catch_up).await;
            if let Err(error) = &res {
                warn!(target: "sync::synchronizer", run_id, %error, "Sync failed");
            }
            inner.finalize(run_id);
            res
        });

        Ok(async move {
            match handle.await {
                Ok(res) => res,
                Err(error) => Err(SyncError::Task(error.to_string())),
            }
        }
        .boxed())
    }

    /// Stops the active run. Does nothing when not running.
    pub fn stop(&self) {
        let _guard = self.inner.lifecycle.lock();
        if self
            .inner
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return
        }
        info!(target: "sync::synchronizer", "Stopping synchronizer");
        if let Some(catch_up) = self.inner.catch_up.read().as_ref() {
            catch_up.stop();
        }
        if let Some(full_sync) = &self.inner.full_sync {
            full_sync.stop();
        }
        if let Some(pruner) = &self.inner.pruner {
            pruner.stop();
        }
        if let Some(propagation) = &self.inner.block_propagation {
            if propagation.is_running() {
                propagation.stop();
            }
        }
    }

    /// Waits for the pruner to stop.
    pub async fn await_stop(&self) {
        if let Some(pruner) = &self.inner.pruner {
            pruner.await_stop().await;
        }
    }

    /// Downloads the world state again from scratch.
    ///
    /// Stops an active run, discards persisted catch-up progress and starts over with a fresh
    /// catch-up downloader flagged as resync.
    pub fn resync(&self) -> bool {
        if self.is_running() {
            self.stop();
        }
        let current = self.inner.catch_up.read().clone();
        if let Some(catch_up) = current {
            if let Err(error) = catch_up.delete_state() {
                warn!(target: "sync::synchronizer", %error, "Failed to delete catch-up state");
            }
        }

        self.inner.sync_state.mark_initial_sync_restart();
        if let Some(factory) = &self.inner.catch_up_factory {
            *self.inner.catch_up.write() = Some(factory(true));
        }
        if let Err(error) = self.start() {
            warn!(target: "sync::synchronizer", %error, "Failed to restart synchronizer");
        }
        true
    }

    /// Progress of the sync, `None` when not running or in sync.
    pub fn sync_status(&self) -> Option<SyncStatus> {
        if !self.is_running() {
            return None
        }
        self.inner.sync_state.sync_status()
    }

    /// Peers the active download needs to keep, unrestricted when nothing is downloading.
    pub fn trailing_peer_requirements(&self) -> TrailingPeerRequirements {
        self.inner
            .catch_up
            .read()
            .as_ref()
            .and_then(|catch_up| catch_up.trailing_peer_requirements())
            .or_else(|| self.inner.full_sync.as_ref()?.trailing_peer_requirements())
            .unwrap_or(TrailingPeerRequirements::UNRESTRICTED)
    }

    /// See [`SyncState::subscribe_sync_status`].
    pub fn subscribe_sync_status(
        &self,
        listener: impl Fn(Option<SyncStatus>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.sync_state.subscribe_sync_status(listener)
    }

    /// See [`SyncState::unsubscribe_sync_status`].
    pub fn unsubscribe_sync_status(&self, id: SubscriptionId) -> bool {
        self.inner.sync_state.unsubscribe_sync_status(id)
    }

    /// See [`SyncState::subscribe_in_sync`].
    pub fn subscribe_in_sync(
        &self,
        listener: impl Fn(bool) + Send + Sync + 'static,
        tolerance: Option<u64>,
    ) -> SubscriptionId {
        self.inner.sync_state.subscribe_in_sync(listener, tolerance)
    }

    /// See [`SyncState::unsubscribe_in_sync`].
    pub fn unsubscribe_in_sync(&self, id: SubscriptionId) -> bool {
        self.inner.sync_state.unsubscribe_in_sync(id)
    }
}

impl SynchronizerInner {
    fn is_current(&self, run_id: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.run_id.load(Ordering::SeqCst) == run_id
    }

    async fn run(
        &self,
        run_id: u64,
        catch_up: Option<(
            Arc<dyn CatchUpDownloader>,
            BoxFuture<'static, Result<CatchUpOutcome, SyncError>>,
        )>,
    ) -> Result<(), SyncError> {
        let Some((downloader, catch_up)) = catch_up else {
            self.sync_state.mark_initial_sync_phase_done();
            self.enable_fallback_node_finder();
            return self.start_full_sync(run_id).await
        };

        let outcome = catch_up.await;
        if !self.is_current(run_id) {
            debug!(target: "sync::synchronizer", run_id, "Catch-up ended after stop");
            return Ok(())
        }
        let CatchUpOutcome { pivot } = outcome?;

        downloader.delete_state()?;
        self.world_state.set_archive_state_unsafe(&pivot)?;
        info!(
            target: "sync::synchronizer",
            number = pivot.number,
            hash = %pivot.hash(),
            "Sync completed successfully with pivot block"
        );
        if let Some(selector) = &self.pivot_selector {
            selector.close();
        }
        self.sync_state.mark_initial_sync_phase_done();
        self.enable_fallback_node_finder();

        if self.termination.should_continue_download() {
            self.start_full_sync(run_id).await
        } else {
            self.sync_state.set_reached_terminal_difficulty(true);
            Ok(())
        }
    }

    async fn start_full_sync(&self, run_id: u64) -> Result<(), SyncError> {
        if !self.is_current(run_id) {
            return Ok(())
        }
        if let Some(pruner) = &self.pruner {
            pruner.start();
        }
        if let Some(full_sync) = &self.full_sync {
            let run = full_sync.start();
            if !self.is_current(run_id) {
                full_sync.stop();
            }
            run.await?;
        }
        if self.termination.should_stop_download() {
            self.sync_state.set_reached_terminal_difficulty(true);
        }
        Ok(())
    }

    fn enable_fallback_node_finder(&self) {
        if self.world_state.supports_fallback_lookup() &&
            !self.fallback_enabled.swap(true, Ordering::SeqCst)
        {
            debug!(target: "sync::synchronizer", "Enabling fallback trie node lookup");
            self.world_state.use_fallback_node_finder();
        }
    }

    /// Winds down after a run completed, unless a newer run took over.
    fn finalize(&self, run_id: u64) {
        let _guard = self.lifecycle.lock();
        if self.run_id.load(Ordering::SeqCst) != run_id {
            return
        }
        info!(target: "sync::synchronizer", run_id, "Stopping block propagation and pruner");
        if let Some(propagation) = &self.block_propagation {
            propagation.stop();
        }
        if let Some(pruner) = &self.pruner {
            pruner.stop();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl ForkchoiceListener for Synchronizer {
    fn on_new_unverified_forkchoice(&self, event: &ForkchoiceEvent) {
        if let Some(propagation) = &self.inner.block_propagation {
            propagation.on_new_unverified_forkchoice(event);
        }
        if let Some(selector) = &self.inner.pivot_selector {
            selector.on_new_unverified_forkchoice(event);
        }
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("running", &self.is_running())
            .field("run_id", &self.inner.run_id.load(Ordering::Relaxed))
            .field("sync_state", &self.inner.sync_state)
            .field("full_sync", &self.inner.full_sync)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pivot::SafeBlockPivotSelector,
        test_utils::{
            wait_until, TestBlockPropagation, TestCatchUpStore, TestChainDownloader, TestPeers,
            TestPruner, TestTermination, TestWorldStateArchive, TestWorldStateDownloader,
        },
        PivotSelectionError, SynchronizerBuilder,
    };
    use assert_matches::assert_matches;
    use fathom_config::{SyncMode, SynchronizerConfig};
    use fathom_interfaces::{sync::SyncStateProvider, test_utils::random_header};
    use fathom_primitives::B256;
    use std::time::Duration;

    struct Fixture {
        sync_state: Arc<SyncState>,
        archive: Arc<TestWorldStateArchive>,
        chain: Arc<TestChainDownloader>,
        world_state: Arc<TestWorldStateDownloader>,
        store: Arc<TestCatchUpStore>,
        peers: Arc<TestPeers>,
        termination: Arc<TestTermination>,
        propagation: Arc<TestBlockPropagation>,
        pruner: Arc<TestPruner>,
    }

    impl Fixture {
        fn new() -> Self {
            fathom_tracing::init_test_tracing();
            let peers = Arc::new(TestPeers::default());
            peers.set_heads(vec![1_000; 5]);
            peers.insert_header(random_header(950, None));
            Self {
                sync_state: Arc::new(SyncState::new()),
                archive: Arc::new(TestWorldStateArchive::default()),
                chain: Arc::new(TestChainDownloader::default()),
                world_state: Arc::new(TestWorldStateDownloader::default()),
                store: Arc::new(TestCatchUpStore::default()),
                peers,
                termination: Arc::new(TestTermination::default()),
                propagation: Arc::new(TestBlockPropagation::default()),
                pruner: Arc::new(TestPruner::default()),
            }
        }

        fn builder(&self, sync_mode: SyncMode) -> SynchronizerBuilder {
            self.builder_with(SynchronizerConfig {
                sync_mode,
                pivot_selection_timeout: Duration::from_millis(20),
                ..Default::default()
            })
        }

        fn builder_with(&self, config: SynchronizerConfig) -> SynchronizerBuilder {
            SynchronizerBuilder::new(config)
                .with_sync_state(self.sync_state.clone())
                .with_world_state_archive(self.archive.clone())
                .with_chain_downloader(self.chain.clone())
                .with_world_state_downloader(self.world_state.clone())
                .with_catch_up_store(self.store.clone())
                .with_peers(self.peers.clone())
                .with_termination_condition(self.termination.clone())
                .with_block_propagation(self.propagation.clone())
                .with_pruner(self.pruner.clone())
                .with_idle_interval(Duration::from_millis(5))
        }
    }

    #[tokio::test]
    async fn full_sync_without_catch_up() {
        let fixture = Fixture::new();
        fixture.chain.push_batches([1, 2, 3]);
        let sync = fixture.builder(SyncMode::Full).build().unwrap();
        assert_eq!(sync.trailing_peer_requirements(), TrailingPeerRequirements::UNRESTRICTED);

        let run = sync.start().unwrap();
        wait_until(|| fixture.sync_state.local_head() == 3).await;
        assert!(!fixture.sync_state.is_syncing());
        assert_eq!(fixture.archive.fallback_enabled(), 1);
        assert_eq!(fixture.pruner.starts(), 1);
        assert!(fixture.propagation.is_running());
        // in sync with every known peer
        assert_eq!(sync.trailing_peer_requirements(), TrailingPeerRequirements::UNRESTRICTED);
        assert_eq!(sync.start().err(), Some(SynchronizerError::AlreadyRunning));

        sync.stop();
        sync.stop();
        run.await.unwrap();
        assert!(!sync.is_running());
        assert!(!fixture.pruner.is_running());
        assert!(fixture.pruner.stops() >= 1);
        assert!(!fixture.propagation.is_running());
        assert!(fixture.archive.archive_states().is_empty());
    }

    #[tokio::test]
    async fn stopped_full_sync_keeps_all_peers() {
        let fixture = Fixture::new();
        fixture.chain.push_batches([1, 2, 3]);
        fixture.sync_state.set_best_chain_height(100);
        let config = SynchronizerConfig {
            sync_mode: SyncMode::Full,
            max_trailing_peers: Some(2),
            ..Default::default()
        };
        let sync = fixture.builder_with(config).build().unwrap();

        let run = sync.start().unwrap();
        wait_until(|| fixture.sync_state.local_head() == 3).await;
        assert_eq!(sync.trailing_peer_requirements(), TrailingPeerRequirements::new(3, 2));

        sync.stop();
        run.await.unwrap();
        assert!(!sync.is_running());
        assert_eq!(sync.trailing_peer_requirements(), TrailingPeerRequirements::UNRESTRICTED);
    }

    #[tokio::test]
    async fn snap_catch_up_hands_over_to_full_sync() {
        let fixture = Fixture::new();
        let sync = fixture.builder(SyncMode::Snap).build().unwrap();
        assert_eq!(sync.sync_status(), None);

        let run = sync.start().unwrap();
        wait_until(|| fixture.chain.batch_calls() > 0).await;
        assert!(fixture.sync_state.is_initial_sync_phase_done());
        assert_eq!(fixture.archive.archive_states(), vec![950]);
        assert_eq!(fixture.store.deletes(), 1);
        assert_eq!(fixture.store.pivot(), None);
        assert_eq!(fixture.archive.fallback_enabled(), 1);
        assert_eq!(fixture.sync_state.has_reached_terminal_difficulty(), None);
        assert_eq!(fixture.propagation.starts(), 1);

        sync.stop();
        run.await.unwrap();
        assert!(!sync.is_running());
    }

    #[tokio::test]
    async fn termination_condition_skips_full_sync() {
        let fixture = Fixture::new();
        fixture.termination.set_stop(true);
        let sync = fixture.builder(SyncMode::Fast).build().unwrap();

        sync.start().unwrap().await.unwrap();
        assert!(fixture.sync_state.is_initial_sync_phase_done());
        assert_eq!(fixture.sync_state.has_reached_terminal_difficulty(), Some(true));
        assert_eq!(fixture.archive.archive_states(), vec![950]);
        assert_eq!(fixture.chain.batch_calls(), 0);
        assert_eq!(fixture.pruner.starts(), 0);
        // nothing to propagate once the download is over
        assert_eq!(fixture.propagation.starts(), 0);
        assert!(!sync.is_running());
    }

    #[tokio::test]
    async fn stop_during_catch_up_has_no_side_effects() {
        let fixture = Fixture::new();
        fixture.chain.block();
        let sync = fixture.builder(SyncMode::Snap).build().unwrap();

        let run = sync.start().unwrap();
        fixture.chain.wait_for_pivot_import().await;
        assert_eq!(sync.trailing_peer_requirements(), TrailingPeerRequirements::new(950, 0));
        assert!(sync.sync_status().is_some());

        sync.stop();
        assert_eq!(sync.trailing_peer_requirements(), TrailingPeerRequirements::UNRESTRICTED);
        fixture.chain.release();
        run.await.unwrap();

        assert!(!sync.is_running());
        assert!(fixture.sync_state.is_syncing());
        assert!(fixture.archive.archive_states().is_empty());
        assert_eq!(fixture.store.deletes(), 0);
        assert_eq!(fixture.store.pivot().map(|pivot| pivot.number), Some(950));
        assert_eq!(fixture.archive.fallback_enabled(), 0);
        assert_eq!(sync.sync_status(), None);
    }

    #[tokio::test]
    async fn resync_discards_progress_and_restarts() {
        let fixture = Fixture::new();
        fixture.store.set_pivot(Some(random_header(900, None)));
        fixture.chain.block();
        let sync = fixture.builder(SyncMode::Snap).build().unwrap();

        let first = sync.start().unwrap();
        fixture.chain.wait_for_pivot_import().await;
        assert_eq!(fixture.chain.pivot_imports(), vec![(None, 900)]);

        assert!(sync.resync());
        first.await.unwrap();
        // the stopped run must not wind down the new one
        assert!(sync.is_running());
        assert!(fixture.propagation.is_running());
        assert_eq!(fixture.store.deletes(), 1);

        wait_until(|| fixture.chain.pivot_imports().len() == 2).await;
        assert_eq!(fixture.chain.pivot_imports()[1], (None, 950));
        fixture.chain.release();

        wait_until(|| fixture.sync_state.is_initial_sync_phase_done()).await;
        wait_until(|| fixture.chain.batch_calls() > 0).await;
        assert_eq!(fixture.archive.archive_states(), vec![950]);
        assert_eq!(fixture.archive.fallback_enabled(), 1);
        sync.stop();
    }

    #[tokio::test]
    async fn resync_when_stopped_starts() {
        let fixture = Fixture::new();
        fixture.termination.set_stop(true);
        let sync = fixture.builder(SyncMode::Snap).build().unwrap();
        assert!(!sync.is_running());

        assert!(sync.resync());
        assert!(sync.is_running());
        wait_until(|| !sync.is_running()).await;
        assert!(fixture.sync_state.is_initial_sync_phase_done());
        assert_eq!(fixture.store.deletes(), 2);
    }

    #[tokio::test]
    async fn catch_up_failure_ends_the_run() {
        let fixture = Fixture::new();
        fixture.peers.set_heads(vec![]);
        let sync = fixture.builder(SyncMode::Snap).build().unwrap();

        assert_matches!(
            sync.start().unwrap().await,
            Err(SyncError::PivotSelection(PivotSelectionError::NotEnoughPeers { have: 0, need: 5 }))
        );
        assert!(!sync.is_running());
        assert!(fixture.sync_state.is_syncing());
        assert!(!fixture.propagation.is_running());
    }

    #[tokio::test]
    async fn forkchoice_reaches_propagation_and_pivot_selector() {
        let fixture = Fixture::new();
        let selector = Arc::new(SafeBlockPivotSelector::new(
            fixture.peers.clone(),
            Duration::from_millis(20),
        ));
        let sync =
            fixture.builder(SyncMode::Snap).with_pivot_selector(selector.clone()).build().unwrap();

        let event = ForkchoiceEvent {
            head_block_hash: B256::with_last_byte(3),
            safe_block_hash: B256::with_last_byte(2),
            finalized_block_hash: B256::with_last_byte(1),
        };
        sync.on_new_unverified_forkchoice(&event);
        assert_eq!(fixture.propagation.events(), vec![event]);
        assert_eq!(selector.safe_block(), Some(B256::with_last_byte(2)));
    }

    #[tokio::test]
    async fn subscriptions_forward_to_sync_state() {
        let fixture = Fixture::new();
        let sync = fixture.builder(SyncMode::Full).build().unwrap();
        let calls = Arc::new(AtomicU64::new(0));
        let id = {
            let calls = calls.clone();
            sync.subscribe_in_sync(
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                },
                Some(0),
            )
        };
        fixture.sync_state.mark_initial_sync_phase_done();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sync.unsubscribe_in_sync(id));
        assert!(!sync.unsubscribe_sync_status(id));
    }
}
