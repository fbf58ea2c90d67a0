//! Mock sync collaborators.

use crate::{
    traits::{
        BlockPropagation, CatchUpStateStore, ChainDownloader, PeerChainHeads, Pruner,
        StateSyncMethod, SyncTerminationCondition, WorldStateArchive, WorldStateDownloader,
    },
    SyncError,
};
use async_trait::async_trait;
use fathom_interfaces::{consensus::ForkchoiceEvent, InfrastructureFault};
use fathom_primitives::{BlockHash, BlockNumHash, BlockNumber, SealedHeader};
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Semaphore;

/// Polls `condition` until it holds, panics after five seconds.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Default)]
pub(crate) struct TestPeers {
    heads: Mutex<Vec<BlockNumber>>,
    headers: Mutex<HashMap<BlockHash, SealedHeader>>,
}

impl TestPeers {
    pub(crate) fn set_heads(&self, heads: Vec<BlockNumber>) {
        *self.heads.lock() = heads;
    }

    pub(crate) fn insert_header(&self, header: SealedHeader) {
        self.headers.lock().insert(header.hash(), header);
    }
}

#[async_trait]
impl PeerChainHeads for TestPeers {
    fn peer_heads(&self) -> Vec<BlockNumber> {
        self.heads.lock().clone()
    }

    async fn header_by_number(
        &self,
        number: BlockNumber,
    ) -> Result<Option<SealedHeader>, InfrastructureFault> {
        Ok(self.headers.lock().values().find(|header| header.number == number).cloned())
    }

    async fn header_by_hash(
        &self,
        hash: BlockHash,
    ) -> Result<Option<SealedHeader>, InfrastructureFault> {
        Ok(self.headers.lock().get(&hash).cloned())
    }
}

#[derive(Default)]
pub(crate) struct TestChainDownloader {
    gate: Mutex<Option<Arc<Semaphore>>>,
    pivot_imports: Mutex<Vec<(Option<BlockNumber>, BlockNumber)>>,
    batches: Mutex<VecDeque<BlockNumber>>,
    batch_error: Mutex<Option<SyncError>>,
    batch_calls: AtomicUsize,
}

impl TestChainDownloader {
    /// Makes `import_to_pivot` wait until [`TestChainDownloader::release`].
    pub(crate) fn block(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.close();
        }
    }

    pub(crate) async fn wait_for_pivot_import(&self) {
        wait_until(|| !self.pivot_imports.lock().is_empty()).await
    }

    pub(crate) fn pivot_imports(&self) -> Vec<(Option<BlockNumber>, BlockNumber)> {
        self.pivot_imports.lock().clone()
    }

    pub(crate) fn push_batches(&self, heads: impl IntoIterator<Item = BlockNumber>) {
        self.batches.lock().extend(heads);
    }

    pub(crate) fn fail_batches(&self, error: SyncError) {
        *self.batch_error.lock() = Some(error);
    }

    pub(crate) fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainDownloader for TestChainDownloader {
    async fn import_to_pivot(
        &self,
        start: Option<BlockNumHash>,
        pivot: &SealedHeader,
    ) -> Result<(), SyncError> {
        self.pivot_imports.lock().push((start.map(|start| start.number), pivot.number));
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        Ok(())
    }

    async fn import_next_batch(&self) -> Result<Option<BlockNumber>, SyncError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.batch_error.lock().clone() {
            return Err(error)
        }
        Ok(self.batches.lock().pop_front())
    }
}

#[derive(Default)]
pub(crate) struct TestWorldStateDownloader {
    downloads: Mutex<Vec<(BlockNumber, StateSyncMethod)>>,
}

impl TestWorldStateDownloader {
    pub(crate) fn downloads(&self) -> Vec<(BlockNumber, StateSyncMethod)> {
        self.downloads.lock().clone()
    }
}

#[async_trait]
impl WorldStateDownloader for TestWorldStateDownloader {
    async fn download_state(
        &self,
        pivot: &SealedHeader,
        method: StateSyncMethod,
    ) -> Result<(), SyncError> {
        self.downloads.lock().push((pivot.number, method));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct TestCatchUpStore {
    pivot: Mutex<Option<SealedHeader>>,
    deletes: AtomicUsize,
}

impl TestCatchUpStore {
    pub(crate) fn pivot(&self) -> Option<SealedHeader> {
        self.pivot.lock().clone()
    }

    pub(crate) fn set_pivot(&self, pivot: Option<SealedHeader>) {
        *self.pivot.lock() = pivot;
    }

    pub(crate) fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

impl CatchUpStateStore for TestCatchUpStore {
    fn load_pivot(&self) -> Result<Option<SealedHeader>, InfrastructureFault> {
        Ok(self.pivot())
    }

    fn store_pivot(&self, pivot: &SealedHeader) -> Result<(), InfrastructureFault> {
        self.set_pivot(Some(pivot.clone()));
        Ok(())
    }

    fn delete(&self) -> Result<(), InfrastructureFault> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.set_pivot(None);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct TestTermination(AtomicBool);

impl TestTermination {
    pub(crate) fn set_stop(&self, stop: bool) {
        self.0.store(stop, Ordering::SeqCst);
    }
}

impl SyncTerminationCondition for TestTermination {
    fn should_stop_download(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct TestWorldStateArchive {
    archive_states: Mutex<Vec<BlockNumber>>,
    supports_fallback: bool,
    fallback_enabled: AtomicUsize,
}

impl Default for TestWorldStateArchive {
    fn default() -> Self {
        Self {
            archive_states: Mutex::new(Vec::new()),
            supports_fallback: true,
            fallback_enabled: AtomicUsize::new(0),
        }
    }
}

impl TestWorldStateArchive {
    pub(crate) fn without_fallback() -> Self {
        Self { supports_fallback: false, ..Default::default() }
    }

    pub(crate) fn archive_states(&self) -> Vec<BlockNumber> {
        self.archive_states.lock().clone()
    }

    pub(crate) fn fallback_enabled(&self) -> usize {
        self.fallback_enabled.load(Ordering::SeqCst)
    }
}

impl WorldStateArchive for TestWorldStateArchive {
    fn set_archive_state_unsafe(&self, pivot: &SealedHeader) -> Result<(), InfrastructureFault> {
        self.archive_states.lock().push(pivot.number);
        Ok(())
    }

    fn supports_fallback_lookup(&self) -> bool {
        self.supports_fallback
    }

    fn use_fallback_node_finder(&self) {
        self.fallback_enabled.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct TestPruner {
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl TestPruner {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Pruner for TestPruner {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn await_stop(&self) -> BoxFuture<'static, ()> {
        future::ready(()).boxed()
    }
}

#[derive(Default)]
pub(crate) struct TestBlockPropagation {
    running: AtomicBool,
    starts: AtomicUsize,
    events: Mutex<Vec<ForkchoiceEvent>>,
}

impl TestBlockPropagation {
    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<ForkchoiceEvent> {
        self.events.lock().clone()
    }
}

impl BlockPropagation for TestBlockPropagation {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn on_new_unverified_forkchoice(&self, event: &ForkchoiceEvent) {
        self.events.lock().push(*event);
    }
}
