use crate::{
    downloader::{
        CatchUpDownloader, FullSyncDownloader, PivotedSyncDownloader, DEFAULT_IDLE_INTERVAL,
    },
    pivot::{PeerPivotSelector, PivotBlockSelector},
    synchronizer::{CatchUpFactory, SynchronizerParts},
    traits::{
        BlockPropagation, CatchUpStateStore, ChainDownloader, NeverTerminate, PeerChainHeads,
        Pruner, SyncTerminationCondition, WorldStateArchive, WorldStateDownloader,
    },
    SyncState, Synchronizer, SynchronizerError,
};
use fathom_config::{SyncMode, SynchronizerConfig};
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Assembles a [`Synchronizer`] from its collaborators.
///
/// The world state archive and the chain downloader are always required. Pivoted sync modes
/// additionally need a world state downloader, a catch-up store and either peers or a custom
/// pivot selector.
#[must_use = "call `build` to create the synchronizer"]
pub struct SynchronizerBuilder {
    config: SynchronizerConfig,
    sync_state: Option<Arc<SyncState>>,
    world_state: Option<Arc<dyn WorldStateArchive>>,
    chain: Option<Arc<dyn ChainDownloader>>,
    world_state_downloader: Option<Arc<dyn WorldStateDownloader>>,
    catch_up_store: Option<Arc<dyn CatchUpStateStore>>,
    peers: Option<Arc<dyn PeerChainHeads>>,
    pivot_selector: Option<Arc<dyn PivotBlockSelector>>,
    termination: Arc<dyn SyncTerminationCondition>,
    block_propagation: Option<Arc<dyn BlockPropagation>>,
    pruner: Option<Arc<dyn Pruner>>,
    idle_interval: Duration,
}

impl SynchronizerBuilder {
    /// Creates a builder for the given configuration.
    pub fn new(config: SynchronizerConfig) -> Self {
        Self {
            config,
            sync_state: None,
            world_state: None,
            chain: None,
            world_state_downloader: None,
            catch_up_store: None,
            peers: None,
            pivot_selector: None,
            termination: Arc::new(NeverTerminate),
            block_propagation: None,
            pruner: None,
            idle_interval: DEFAULT_IDLE_INTERVAL,
        }
    }

    /// Shares an existing sync state. A fresh one is created otherwise.
    pub fn with_sync_state(mut self, sync_state: Arc<SyncState>) -> Self {
        self.sync_state = Some(sync_state);
        self
    }

    /// Sets the world state archive.
    pub fn with_world_state_archive(mut self, world_state: Arc<dyn WorldStateArchive>) -> Self {
        self.world_state = Some(world_state);
        self
    }

    /// Sets the chain downloader.
    pub fn with_chain_downloader(mut self, chain: Arc<dyn ChainDownloader>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Sets the world state downloader used by pivoted sync modes.
    pub fn with_world_state_downloader(
        mut self,
        downloader: Arc<dyn WorldStateDownloader>,
    ) -> Self {
        self.world_state_downloader = Some(downloader);
        self
    }

    /// Sets where catch-up progress is persisted.
    pub fn with_catch_up_store(mut self, store: Arc<dyn CatchUpStateStore>) -> Self {
        self.catch_up_store = Some(store);
        self
    }

    /// Sets the peer view the default pivot selector works on.
    pub fn with_peers(mut self, peers: Arc<dyn PeerChainHeads>) -> Self {
        self.peers = Some(peers);
        self
    }

    /// Replaces the default peer based pivot selector.
    pub fn with_pivot_selector(mut self, selector: Arc<dyn PivotBlockSelector>) -> Self {
        self.pivot_selector = Some(selector);
        self
    }

    /// Sets when downloading should end. Never by default.
    pub fn with_termination_condition(
        mut self,
        termination: Arc<dyn SyncTerminationCondition>,
    ) -> Self {
        self.termination = termination;
        self
    }

    /// Sets the block propagation manager.
    pub fn with_block_propagation(mut self, propagation: Arc<dyn BlockPropagation>) -> Self {
        self.block_propagation = Some(propagation);
        self
    }

    /// Sets the pruner.
    pub fn with_pruner(mut self, pruner: Arc<dyn Pruner>) -> Self {
        self.pruner = Some(pruner);
        self
    }

    /// Sets how long full sync idles when peers had no new blocks.
    pub const fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    /// Builds the synchronizer.
    pub fn build(self) -> Result<Synchronizer, SynchronizerError> {
        let Self {
            config,
            sync_state,
            world_state,
            chain,
            world_state_downloader,
            catch_up_store,
            peers,
            pivot_selector,
            termination,
            block_propagation,
            pruner,
            idle_interval,
        } = self;

        let world_state =
            world_state.ok_or(SynchronizerError::MissingComponent("world state archive"))?;
        let chain = chain.ok_or(SynchronizerError::MissingComponent("chain downloader"))?;
        let sync_state = sync_state.unwrap_or_else(|| {
            Arc::new(SyncState::with_in_sync_tolerance(config.in_sync_tolerance))
        });

        // nothing left to follow once the download is already over
        let download_over = termination.should_stop_download();
        if download_over {
            debug!(target: "sync::synchronizer", "Termination reached, full sync disabled");
        }
        let full_sync = (!download_over).then(|| {
            Arc::new(
                FullSyncDownloader::new(
                    chain.clone(),
                    termination.clone(),
                    sync_state.clone(),
                    config.max_trailing_peers,
                )
                .with_idle_interval(idle_interval),
            )
        });
        let block_propagation = block_propagation.filter(|_| !download_over);

        let (pivot_selector, catch_up_factory) = if config.sync_mode.is_pivoted() {
            let world_state_downloader = world_state_downloader
                .ok_or(SynchronizerError::MissingComponent("world state downloader"))?;
            let store =
                catch_up_store.ok_or(SynchronizerError::MissingComponent("catch-up store"))?;
            let checkpoint = match config.sync_mode {
                SyncMode::Checkpoint => Some(
                    config.checkpoint.ok_or(SynchronizerError::MissingComponent("checkpoint"))?,
                ),
                _ => None,
            };
            let selector = match pivot_selector {
                Some(selector) => selector,
                None => {
                    let peers =
                        peers.ok_or(SynchronizerError::MissingComponent("peer chain heads"))?;
                    Arc::new(PeerPivotSelector::new(
                        peers,
                        config.pivot_distance,
                        config.min_peers_for_pivot,
                        config.pivot_selection_timeout,
                    )) as Arc<dyn PivotBlockSelector>
                }
            };

            let mode = config.sync_mode;
            let factory: CatchUpFactory = {
                let selector = selector.clone();
                let sync_state = sync_state.clone();
                Box::new(move |resync| {
                    Arc::new(PivotedSyncDownloader::new(
                        mode,
                        resync,
                        checkpoint,
                        selector.clone(),
                        chain.clone(),
                        world_state_downloader.clone(),
                        store.clone(),
                        sync_state.clone(),
                    )) as Arc<dyn CatchUpDownloader>
                })
            };
            (Some(selector), Some(factory))
        } else {
            (None, None)
        };

        Ok(Synchronizer::from_parts(SynchronizerParts {
            sync_state,
            world_state,
            termination,
            pivot_selector,
            catch_up_factory,
            full_sync,
            block_propagation,
            pruner,
        }))
    }
}

impl std::fmt::Debug for SynchronizerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizerBuilder")
            .field("config", &self.config)
            .field("idle_interval", &self.idle_interval)
            .finish_non_exhaustive()
    }
}
