use crate::{
    consensus::{AncestorResolver, EngineCallListener, ForkchoiceEvent, ForkchoiceListener},
    executor::{BlockProcessingOutputs, BlockProcessingResult, BlockProcessor},
    provider::{BlockReader, ProviderError, ProviderResult},
    sync::{BackwardSync, BackwardSyncError, SyncStateProvider},
    InfrastructureFault,
};
use async_trait::async_trait;
use fathom_primitives::{BlockHash, SealedBlock, SealedHeader};
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// In memory block store.
#[derive(Debug, Default)]
pub struct TestBlockReader {
    blocks: Mutex<HashMap<BlockHash, SealedBlock>>,
    headers: Mutex<HashMap<BlockHash, SealedHeader>>,
    fault: Mutex<Option<InfrastructureFault>>,
}

impl TestBlockReader {
    /// Stores a full block, its header becomes known too.
    pub fn insert_block(&self, block: SealedBlock) {
        self.headers.lock().insert(block.hash(), block.header.clone());
        self.blocks.lock().insert(block.hash(), block);
    }

    /// Stores only a header.
    pub fn insert_header(&self, header: SealedHeader) {
        self.headers.lock().insert(header.hash(), header);
    }

    /// Makes every following read fail with the fault.
    pub fn set_fault(&self, fault: InfrastructureFault) {
        *self.fault.lock() = Some(fault);
    }

    fn check_fault(&self) -> ProviderResult<()> {
        match self.fault.lock().clone() {
            Some(fault) => Err(ProviderError::Fault(fault)),
            None => Ok(()),
        }
    }
}

impl BlockReader for TestBlockReader {
    fn block_by_hash(&self, hash: BlockHash) -> ProviderResult<Option<SealedBlock>> {
        self.check_fault()?;
        Ok(self.blocks.lock().get(&hash).cloned())
    }

    fn header(&self, hash: &BlockHash) -> ProviderResult<Option<SealedHeader>> {
        self.check_fault()?;
        Ok(self.headers.lock().get(hash).cloned())
    }
}

/// Ancestor resolver with canned answers.
#[derive(Debug)]
pub struct TestAncestorResolver {
    latest_valid: Mutex<Option<BlockHash>>,
    latest_valid_by_hash: Mutex<Option<BlockHash>>,
    descends_from_terminal: AtomicBool,
}

impl Default for TestAncestorResolver {
    fn default() -> Self {
        Self {
            latest_valid: Mutex::new(None),
            latest_valid_by_hash: Mutex::new(None),
            descends_from_terminal: AtomicBool::new(true),
        }
    }
}

impl TestAncestorResolver {
    /// Sets the answer for header based lookups.
    pub fn set_latest_valid_ancestor(&self, hash: Option<BlockHash>) {
        *self.latest_valid.lock() = hash;
    }

    /// Sets the answer for hash based lookups.
    pub fn set_latest_valid_ancestor_by_hash(&self, hash: Option<BlockHash>) {
        *self.latest_valid_by_hash.lock() = hash;
    }

    /// Sets whether blocks descend from the terminal block.
    pub fn set_descends_from_terminal(&self, descends: bool) {
        self.descends_from_terminal.store(descends, Ordering::Relaxed);
    }
}

#[async_trait]
impl AncestorResolver for TestAncestorResolver {
    async fn latest_valid_ancestor(
        &self,
        _header: &SealedHeader,
    ) -> ProviderResult<Option<BlockHash>> {
        Ok(*self.latest_valid.lock())
    }

    async fn latest_valid_ancestor_by_hash(
        &self,
        _hash: BlockHash,
    ) -> ProviderResult<Option<BlockHash>> {
        Ok(*self.latest_valid_by_hash.lock())
    }

    async fn descends_from_terminal(&self, _header: &SealedHeader) -> ProviderResult<bool> {
        Ok(self.descends_from_terminal.load(Ordering::Relaxed))
    }
}

/// Block processor returning a configured outcome and counting invocations.
#[derive(Debug)]
pub struct TestBlockProcessor {
    outcome: Mutex<Result<BlockProcessingResult, InfrastructureFault>>,
    calls: AtomicUsize,
}

impl Default for TestBlockProcessor {
    fn default() -> Self {
        Self {
            outcome: Mutex::new(Ok(BlockProcessingResult::Success(
                BlockProcessingOutputs::default(),
            ))),
            calls: AtomicUsize::new(0),
        }
    }
}

impl TestBlockProcessor {
    /// Sets the outcome of the following calls.
    pub fn set_outcome(&self, outcome: Result<BlockProcessingResult, InfrastructureFault>) {
        *self.outcome.lock() = outcome;
    }

    /// Number of processed blocks.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockProcessor for TestBlockProcessor {
    async fn process_block(
        &self,
        _block: &SealedBlock,
    ) -> Result<BlockProcessingResult, InfrastructureFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().clone()
    }
}

/// Backward sync that records requests and completes immediately.
#[derive(Debug, Default)]
pub struct TestBackwardSync {
    appended: Mutex<Vec<BlockHash>>,
    heads: Mutex<Vec<BlockHash>>,
}

impl TestBackwardSync {
    /// Hashes of blocks handed over through `append_payload_to_sync`.
    pub fn appended(&self) -> Vec<BlockHash> {
        self.appended.lock().clone()
    }

    /// Heads requested through `sync_to_head`.
    pub fn heads(&self) -> Vec<BlockHash> {
        self.heads.lock().clone()
    }
}

impl BackwardSync for TestBackwardSync {
    fn append_payload_to_sync(
        &self,
        block: SealedBlock,
    ) -> BoxFuture<'static, Result<(), BackwardSyncError>> {
        self.appended.lock().push(block.hash());
        future::ready(Ok(())).boxed()
    }

    fn sync_to_head(&self, head: BlockHash) -> BoxFuture<'static, Result<(), BackwardSyncError>> {
        self.heads.lock().push(head);
        future::ready(Ok(())).boxed()
    }
}

/// Sync state provider with a switchable answer.
#[derive(Debug, Default)]
pub struct TestSyncStateProvider(AtomicBool);

impl TestSyncStateProvider {
    /// Creates the provider in the given state.
    pub const fn new(syncing: bool) -> Self {
        Self(AtomicBool::new(syncing))
    }

    /// Switches the state.
    pub fn set_syncing(&self, syncing: bool) {
        self.0.store(syncing, Ordering::Relaxed);
    }
}

impl SyncStateProvider for TestSyncStateProvider {
    fn is_syncing(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counts engine API calls.
#[derive(Debug, Default)]
pub struct CountingEngineCallListener(AtomicUsize);

impl CountingEngineCallListener {
    /// Number of observed calls.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl EngineCallListener for CountingEngineCallListener {
    fn execution_engine_called(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records forkchoice events.
#[derive(Debug, Default)]
pub struct TestForkchoiceListener(Mutex<Vec<ForkchoiceEvent>>);

impl TestForkchoiceListener {
    /// All events received so far.
    pub fn events(&self) -> Vec<ForkchoiceEvent> {
        self.0.lock().clone()
    }
}

impl ForkchoiceListener for TestForkchoiceListener {
    fn on_new_unverified_forkchoice(&self, event: &ForkchoiceEvent) {
        self.0.lock().push(*event);
    }
}
