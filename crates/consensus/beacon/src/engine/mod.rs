use fathom_config::EngineConfig;
use fathom_interfaces::{
    consensus::{AncestorResolver, EngineCallListener, ForkchoiceEvent, ForkchoiceListener},
    executor::{BlockProcessingResult, BlockProcessor},
    provider::BlockReader,
    sync::{BackwardSync, SyncStateProvider},
};
use fathom_primitives::{BlockHash, SealedBlock, B256};
use fathom_rpc_types::engine::{
    ExecutionPayload, ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadError,
    PayloadId, PayloadStatus,
};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument, trace, warn};

mod bad_blocks;
pub use bad_blocks::BadBlockRegistry;

mod error;
pub use error::{BeaconForkChoiceUpdateError, BeaconOnNewPayloadError};

mod metrics;
pub use metrics::MeteredEngineCallListener;

mod payload;
pub use payload::{payload_id, BuiltPayload, PayloadBuilderError, PayloadStore};

/// Validation error returned for blocks that are not younger than their parent.
pub const TIMESTAMP_NOT_GREATER_THAN_PARENT: &str = "block timestamp not greater than parent";

/// Validation error returned for known bad blocks whose latest valid ancestor is unknown.
pub const ALREADY_BAD_BLOCK: &str = "Block already present in bad block manager.";

/// Validation error returned for a forkchoice update without a head.
pub const ZERO_HASH_FORKCHOICE_HEAD: &str = "Received zero hash as forkchoice head";

/// The execution layer side of the engine API.
///
/// Decides for every payload the consensus layer sends whether it is valid, invalid, or cannot
/// be judged yet, and answers forkchoice updates for the announced head. Every call signals
/// the [`EngineCallListener`] exactly once.
///
/// Outcomes that are about the payload itself are reported as a [`PayloadStatus`]. Only faults
/// of the node's own infrastructure surface as errors, and those never mark a block as bad.
pub struct BeaconConsensusEngine {
    /// Canonical block store.
    provider: Arc<dyn BlockReader>,
    /// Resolves the latest valid ancestor of new blocks.
    ancestors: Arc<dyn AncestorResolver>,
    /// Executes and imports blocks.
    processor: Arc<dyn BlockProcessor>,
    /// Fetches the ancestry of blocks with an unknown parent.
    backward_sync: Arc<dyn BackwardSync>,
    /// Whether the initial sync is still running.
    sync_state: Arc<dyn SyncStateProvider>,
    /// Blocks that failed validation.
    bad_blocks: Arc<BadBlockRegistry>,
    engine_call_listener: Arc<dyn EngineCallListener>,
    forkchoice_listener: Option<Arc<dyn ForkchoiceListener>>,
    payload_store: Option<Arc<dyn PayloadStore>>,
    config: EngineConfig,
}

impl BeaconConsensusEngine {
    /// Creates the engine with a metered [`EngineCallListener`], no forkchoice listener and no
    /// payload builder.
    pub fn new(
        provider: Arc<dyn BlockReader>,
        ancestors: Arc<dyn AncestorResolver>,
        processor: Arc<dyn BlockProcessor>,
        backward_sync: Arc<dyn BackwardSync>,
        sync_state: Arc<dyn SyncStateProvider>,
        bad_blocks: Arc<BadBlockRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            ancestors,
            processor,
            backward_sync,
            sync_state,
            bad_blocks,
            engine_call_listener: Arc::new(MeteredEngineCallListener::default()),
            forkchoice_listener: None,
            payload_store: None,
            config,
        }
    }

    /// Replaces the listener notified on every engine API call.
    pub fn with_engine_call_listener(mut self, listener: Arc<dyn EngineCallListener>) -> Self {
        self.engine_call_listener = listener;
        self
    }

    /// Sets the receiver of unverified forkchoice updates, usually the synchronizer.
    pub fn with_forkchoice_listener(mut self, listener: Arc<dyn ForkchoiceListener>) -> Self {
        self.forkchoice_listener = Some(listener);
        self
    }

    /// Sets the payload builder used for forkchoice updates with payload attributes.
    pub fn with_payload_store(mut self, store: Arc<dyn PayloadStore>) -> Self {
        self.payload_store = Some(store);
        self
    }

    /// The registry of bad blocks.
    pub const fn bad_blocks(&self) -> &Arc<BadBlockRegistry> {
        &self.bad_blocks
    }

    /// The engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Records an engine API call that was rejected before reaching the engine.
    pub fn on_rejected_call(&self) {
        self.engine_call_listener.execution_engine_called();
    }

    /// Handles an `engine_newPayload` call.
    #[instrument(
        level = "debug",
        target = "engine::admission",
        skip_all,
        fields(number = payload.block_number, hash = %payload.block_hash)
    )]
    pub async fn on_new_payload(
        &self,
        payload: ExecutionPayload,
    ) -> Result<PayloadStatus, BeaconOnNewPayloadError> {
        self.engine_call_listener.execution_engine_called();
        let res = self.admit_payload(payload).await;
        match &res {
            Ok(status) => {
                trace!(target: "engine::admission", %status, "Payload admitted");
                metrics::record_new_payload_status(status);
            }
            Err(error) => {
                warn!(target: "engine::admission", %error, "Failed to admit payload");
                metrics::record_new_payload_error();
            }
        }
        res
    }

    async fn admit_payload(
        &self,
        payload: ExecutionPayload,
    ) -> Result<PayloadStatus, BeaconOnNewPayloadError> {
        let parent_hash = payload.parent_hash;
        let block = match payload.try_into_sealed_block(self.config.max_extra_data_size) {
            Ok(block) => block,
            Err(error) => return self.on_malformed_payload(parent_hash, error).await,
        };
        let hash = block.hash();

        if let Some(status) = self.check_bad_block(&hash) {
            return Ok(status)
        }

        if self.provider.block_by_hash(hash)?.is_some() {
            debug!(target: "engine::admission", "Block already imported");
            return Ok(PayloadStatus::valid(hash))
        }

        if self.sync_state.is_syncing() {
            return Ok(PayloadStatus::syncing())
        }

        let Some(parent) = self.provider.header(&block.parent_hash)? else {
            self.append_to_backward_sync(block);
            return Ok(PayloadStatus::syncing())
        };

        let descends_from_terminal = self.ancestors.descends_from_terminal(&block.header).await?;
        let latest_valid_ancestor = self.ancestors.latest_valid_ancestor(&block.header).await?;

        if block.timestamp <= parent.timestamp {
            let latest_valid_hash =
                if descends_from_terminal { latest_valid_ancestor } else { Some(B256::ZERO) };
            return Ok(PayloadStatus::invalid(
                latest_valid_hash,
                Some(TIMESTAMP_NOT_GREATER_THAN_PARENT.to_string()),
            ))
        }

        if !descends_from_terminal {
            self.bad_blocks.record_bad_block(&block, None);
            return Ok(PayloadStatus::invalid(
                Some(B256::ZERO),
                Some(format!("{hash} did not descend from terminal block")),
            ))
        }

        let Some(latest_valid_ancestor) = latest_valid_ancestor else {
            debug!(target: "engine::admission", "Latest valid ancestor unknown");
            return Ok(PayloadStatus::accepted())
        };

        match self.processor.process_block(&block).await? {
            BlockProcessingResult::Success(outputs) => {
                debug!(
                    target: "engine::admission",
                    gas_used = outputs.gas_used,
                    state_root = %outputs.state_root,
                    "Block imported"
                );
                Ok(PayloadStatus::valid(hash))
            }
            BlockProcessingResult::Failure(reason) => {
                debug!(target: "engine::admission", %reason, "Block processing failed");
                self.bad_blocks.record_bad_block(&block, Some(latest_valid_ancestor));
                Ok(PayloadStatus::invalid(Some(latest_valid_ancestor), Some(reason)))
            }
            BlockProcessingResult::Fault(fault) => Err(fault.into()),
        }
    }

    /// Status for payloads that could not be formed into a block.
    async fn on_malformed_payload(
        &self,
        parent_hash: BlockHash,
        error: PayloadError,
    ) -> Result<PayloadStatus, BeaconOnNewPayloadError> {
        if error.is_block_hash_mismatch() {
            warn!(target: "engine::admission", %error, "Invalid block hash");
            return Ok(PayloadStatus::invalid_block_hash())
        }

        let latest_valid_hash = match error {
            PayloadError::Transaction(_) => {
                self.ancestors.latest_valid_ancestor_by_hash(parent_hash).await?
            }
            _ => None,
        };
        debug!(target: "engine::admission", %error, "Malformed payload");
        Ok(PayloadStatus::invalid(latest_valid_hash, Some(error.to_string())))
    }

    /// Returns the status for a block recorded as bad, `None` for other blocks.
    fn check_bad_block(&self, hash: &BlockHash) -> Option<PayloadStatus> {
        if !self.bad_blocks.is_bad_block(hash) {
            return None
        }
        let status = match self.bad_blocks.latest_valid_hash_of_bad_block(hash) {
            Some(latest_valid_hash) => PayloadStatus::invalid(Some(latest_valid_hash), None),
            None => PayloadStatus::invalid(Some(B256::ZERO), Some(ALREADY_BAD_BLOCK.to_string())),
        };
        Some(status)
    }

    fn append_to_backward_sync(&self, block: SealedBlock) {
        let hash = block.hash();
        debug!(
            target: "engine::admission",
            parent = %block.parent_hash,
            "Parent unknown, handing block to backward sync"
        );
        let fut = self.backward_sync.append_payload_to_sync(block);
        tokio::spawn(async move {
            if let Err(error) = fut.await {
                warn!(target: "engine::admission", %hash, %error, "Backward sync failed");
            }
        });
    }

    /// Handles an `engine_forkchoiceUpdated` call.
    #[instrument(
        level = "debug",
        target = "engine::admission",
        skip_all,
        fields(head = %state.head_block_hash)
    )]
    pub async fn on_forkchoice_updated(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, BeaconForkChoiceUpdateError> {
        self.engine_call_listener.execution_engine_called();
        let res = self.apply_forkchoice(state, attributes);
        if let Ok(updated) = &res {
            metrics::record_forkchoice_status(&updated.payload_status);
        }
        res
    }

    fn apply_forkchoice(
        &self,
        state: ForkchoiceState,
        attributes: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, BeaconForkChoiceUpdateError> {
        let head = state.head_block_hash;
        if head.is_zero() {
            return Ok(ForkchoiceUpdated::new(PayloadStatus::invalid(
                None,
                Some(ZERO_HASH_FORKCHOICE_HEAD.to_string()),
            )))
        }

        if let Some(listener) = &self.forkchoice_listener {
            listener.on_new_unverified_forkchoice(&ForkchoiceEvent {
                head_block_hash: head,
                safe_block_hash: state.safe_block_hash,
                finalized_block_hash: state.finalized_block_hash,
            });
        }

        if let Some(status) = self.check_bad_block(&head) {
            return Ok(ForkchoiceUpdated::new(status))
        }

        if self.sync_state.is_syncing() {
            return Ok(ForkchoiceUpdated::new(PayloadStatus::syncing()))
        }

        let Some(head_header) = self.provider.header(&head)? else {
            debug!(target: "engine::admission", "Forkchoice head unknown, syncing to it");
            let fut = self.backward_sync.sync_to_head(head);
            tokio::spawn(async move {
                if let Err(error) = fut.await {
                    warn!(target: "engine::admission", %head, %error, "Sync to head failed");
                }
            });
            return Ok(ForkchoiceUpdated::new(PayloadStatus::syncing()))
        };

        let mut updated = ForkchoiceUpdated::new(PayloadStatus::valid(head));
        if let (Some(attributes), Some(store)) = (attributes, &self.payload_store) {
            let started = if attributes.timestamp <= head_header.timestamp {
                Err(PayloadBuilderError::InvalidTimestamp {
                    parent: head_header.timestamp,
                    attributes: attributes.timestamp,
                })
            } else {
                store.start_payload(head, attributes)
            };
            match started {
                Ok(id) => updated = updated.with_payload_id(id),
                Err(error) => {
                    warn!(target: "engine::admission", %error, "Payload build not started")
                }
            }
        }
        Ok(updated)
    }

    /// Handles an `engine_getPayload` call.
    pub fn get_payload(&self, id: PayloadId) -> Option<BuiltPayload> {
        self.engine_call_listener.execution_engine_called();
        self.payload_store.as_ref().and_then(|store| store.get_payload(id))
    }
}

impl fmt::Debug for BeaconConsensusEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeaconConsensusEngine")
            .field("bad_blocks", &self.bad_blocks.len())
            .field("config", &self.config)
            .field("has_payload_store", &self.payload_store.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use fathom_interfaces::{
        provider::ProviderError,
        test_utils::{
            random_block, random_block_range, random_hash, CountingEngineCallListener,
            TestAncestorResolver, TestBackwardSync, TestBlockProcessor, TestBlockReader,
            TestForkchoiceListener, TestSyncStateProvider,
        },
        InfrastructureFault,
    };
    use fathom_primitives::{Address, Bytes, U256};
    use fathom_rpc_types::engine::PayloadStatusEnum;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct TestHarness {
        provider: Arc<TestBlockReader>,
        ancestors: Arc<TestAncestorResolver>,
        processor: Arc<TestBlockProcessor>,
        backward_sync: Arc<TestBackwardSync>,
        sync_state: Arc<TestSyncStateProvider>,
        calls: Arc<CountingEngineCallListener>,
        forkchoice: Arc<TestForkchoiceListener>,
        engine: BeaconConsensusEngine,
    }

    impl TestHarness {
        fn new() -> Self {
            fathom_tracing::init_test_tracing();
            let provider = Arc::new(TestBlockReader::default());
            let ancestors = Arc::new(TestAncestorResolver::default());
            let processor = Arc::new(TestBlockProcessor::default());
            let backward_sync = Arc::new(TestBackwardSync::default());
            let sync_state = Arc::new(TestSyncStateProvider::new(false));
            let calls = Arc::new(CountingEngineCallListener::default());
            let forkchoice = Arc::new(TestForkchoiceListener::default());
            let engine = BeaconConsensusEngine::new(
                provider.clone(),
                ancestors.clone(),
                processor.clone(),
                backward_sync.clone(),
                sync_state.clone(),
                Arc::new(BadBlockRegistry::new()),
                EngineConfig::default(),
            )
            .with_engine_call_listener(calls.clone())
            .with_forkchoice_listener(forkchoice.clone());
            Self {
                provider,
                ancestors,
                processor,
                backward_sync,
                sync_state,
                calls,
                forkchoice,
                engine,
            }
        }

        /// Stores a parent and returns a child payload on top of it.
        fn child_payload(&self) -> (SealedBlock, SealedBlock, ExecutionPayload) {
            let blocks = random_block_range(100, 2, random_hash());
            let (parent, child) = (blocks[0].clone(), blocks[1].clone());
            self.provider.insert_block(parent.clone());
            self.ancestors.set_latest_valid_ancestor(Some(parent.hash()));
            self.ancestors.set_latest_valid_ancestor_by_hash(Some(parent.hash()));
            let payload = ExecutionPayload::from(child.clone());
            (parent, child, payload)
        }
    }

    fn rehash(mut payload: ExecutionPayload) -> ExecutionPayload {
        payload.block_hash = payload.header().hash_slow();
        payload
    }

    #[tokio::test]
    async fn valid_payload() {
        let harness = TestHarness::new();
        let (_, child, payload) = harness.child_payload();

        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(status, PayloadStatus::valid(child.hash()));
        assert_eq!(harness.processor.calls(), 1);
        assert_eq!(harness.calls.count(), 1);
        assert!(harness.engine.bad_blocks().is_empty());
    }

    #[tokio::test]
    async fn block_hash_mismatch() {
        let harness = TestHarness::new();
        let (_, _, mut payload) = harness.child_payload();
        payload.block_hash = random_hash();
        // also malformed, the hash is checked first
        payload.transactions = vec![Bytes::from(vec![0xde, 0xad])];
        payload.extra_data = None;

        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(status.status, PayloadStatusEnum::InvalidBlockHash);
        assert_eq!(status.latest_valid_hash, None);
        assert_eq!(harness.calls.count(), 1);
    }

    #[tokio::test]
    async fn undecodable_transactions() {
        let harness = TestHarness::new();
        let (parent, _, mut payload) = harness.child_payload();
        payload.transactions = vec![Bytes::from(vec![0xde, 0xad]), Bytes::from(vec![0xbe, 0xef])];
        let payload = rehash(payload);

        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(
            status,
            PayloadStatus::invalid(
                Some(parent.hash()),
                Some("Failed to decode transactions from block parameter".to_string())
            )
        );
        assert_eq!(harness.processor.calls(), 0);
        assert!(harness.engine.bad_blocks().is_empty());
    }

    #[tokio::test]
    async fn missing_extra_data() {
        let harness = TestHarness::new();
        let (_, _, mut payload) = harness.child_payload();
        payload.extra_data = None;
        let payload = rehash(payload);

        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(
            status,
            PayloadStatus::invalid(None, Some("Field extraData must not be null".to_string()))
        );
    }

    #[tokio::test]
    async fn oversized_extra_data() {
        let harness = TestHarness::new();
        let (_, _, mut payload) = harness.child_payload();
        payload.extra_data = Some(Bytes::from(vec![1u8; 33]));
        let payload = rehash(payload);

        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert!(status.is_invalid());
        assert_eq!(
            status.validation_error(),
            Some("Field extraData exceeds maximum size of 32 bytes")
        );
    }

    #[tokio::test]
    async fn known_block_is_valid_while_syncing() {
        let harness = TestHarness::new();
        harness.sync_state.set_syncing(true);
        let block = random_block(5, None, 1);
        harness.provider.insert_block(block.clone());

        let status = harness.engine.on_new_payload(block.clone().into()).await.unwrap();
        assert_eq!(status, PayloadStatus::valid(block.hash()));
        assert_eq!(harness.processor.calls(), 0);
    }

    #[tokio::test]
    async fn syncing_short_circuits() {
        let harness = TestHarness::new();
        let (_, _, payload) = harness.child_payload();
        harness.sync_state.set_syncing(true);

        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(status, PayloadStatus::syncing());
        assert_eq!(status.validation_error(), None);
        assert_eq!(harness.processor.calls(), 0);
        assert!(harness.backward_sync.appended().is_empty());
    }

    #[tokio::test]
    async fn unknown_parent_goes_to_backward_sync() {
        let harness = TestHarness::new();
        let block = random_block(7, Some(random_hash()), 1);

        let status = harness.engine.on_new_payload(block.clone().into()).await.unwrap();
        assert_eq!(status, PayloadStatus::syncing());
        assert_eq!(harness.backward_sync.appended(), vec![block.hash()]);
        assert_eq!(harness.processor.calls(), 0);
    }

    #[tokio::test]
    async fn timestamp_not_after_parent() {
        let harness = TestHarness::new();
        let (parent, _, mut payload) = harness.child_payload();
        payload.timestamp = parent.timestamp;
        let payload = rehash(payload);

        let status = harness.engine.on_new_payload(payload.clone()).await.unwrap();
        assert_eq!(
            status,
            PayloadStatus::invalid(
                Some(parent.hash()),
                Some(TIMESTAMP_NOT_GREATER_THAN_PARENT.to_string())
            )
        );
        assert!(harness.engine.bad_blocks().is_empty());

        harness.ancestors.set_descends_from_terminal(false);
        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(status.latest_valid_hash, Some(B256::ZERO));
        assert_eq!(harness.processor.calls(), 0);
    }

    #[tokio::test]
    async fn not_descending_from_terminal() {
        let harness = TestHarness::new();
        let (_, child, payload) = harness.child_payload();
        harness.ancestors.set_descends_from_terminal(false);

        let status = harness.engine.on_new_payload(payload.clone()).await.unwrap();
        assert!(status.is_invalid());
        assert_eq!(status.latest_valid_hash, Some(B256::ZERO));
        assert!(harness.engine.bad_blocks().is_bad_block(&child.hash()));
        assert_eq!(harness.processor.calls(), 0);

        // resubmission is answered from the registry
        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(
            status,
            PayloadStatus::invalid(Some(B256::ZERO), Some(ALREADY_BAD_BLOCK.to_string()))
        );
        assert_eq!(harness.calls.count(), 2);
    }

    #[tokio::test]
    async fn unknown_ancestor_is_accepted() {
        let harness = TestHarness::new();
        let (_, _, payload) = harness.child_payload();
        harness.ancestors.set_latest_valid_ancestor(None);

        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(status, PayloadStatus::accepted());
        assert_eq!(harness.processor.calls(), 0);
        assert!(harness.engine.bad_blocks().is_empty());
    }

    #[tokio::test]
    async fn processing_failure_records_bad_block() {
        let harness = TestHarness::new();
        let (parent, child, payload) = harness.child_payload();
        harness.processor.set_outcome(Ok(BlockProcessingResult::Failure("error 42".into())));

        let status = harness.engine.on_new_payload(payload.clone()).await.unwrap();
        assert_eq!(status, PayloadStatus::invalid(Some(parent.hash()), Some("error 42".into())));
        assert_eq!(
            harness.engine.bad_blocks().latest_valid_hash_of_bad_block(&child.hash()),
            Some(parent.hash())
        );

        let status = harness.engine.on_new_payload(payload).await.unwrap();
        assert_eq!(status, PayloadStatus::invalid(Some(parent.hash()), None));
        assert_eq!(harness.processor.calls(), 1);
    }

    #[tokio::test]
    async fn infrastructure_faults_are_errors() {
        let harness = TestHarness::new();
        let (_, _, payload) = harness.child_payload();

        harness.processor.set_outcome(Ok(BlockProcessingResult::Fault(
            InfrastructureFault::trie_consistency("missing node"),
        )));
        let res = harness.engine.on_new_payload(payload.clone()).await;
        assert_matches!(res, Err(BeaconOnNewPayloadError::Internal(_)));

        harness.processor.set_outcome(Err(InfrastructureFault::storage("disk full")));
        let res = harness.engine.on_new_payload(payload.clone()).await;
        assert_matches!(res, Err(BeaconOnNewPayloadError::Internal(_)));

        harness.provider.set_fault(InfrastructureFault::data_unavailable("pruned"));
        let res = harness.engine.on_new_payload(payload).await;
        assert_matches!(res, Err(BeaconOnNewPayloadError::Provider(ProviderError::Fault(_))));

        assert!(harness.engine.bad_blocks().is_empty());
        assert_eq!(harness.calls.count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_identical_submissions() {
        let harness = Arc::new(TestHarness::new());
        let (parent, _, payload) = harness.child_payload();
        harness.processor.set_outcome(Ok(BlockProcessingResult::Failure("bad state".into())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let harness = harness.clone();
                let payload = payload.clone();
                tokio::spawn(async move { harness.engine.on_new_payload(payload).await })
            })
            .collect();
        for handle in handles {
            let status = handle.await.unwrap().unwrap();
            assert!(status.is_invalid());
            assert_eq!(status.latest_valid_hash, Some(parent.hash()));
        }

        assert_eq!(harness.calls.count(), 8);
        assert_eq!(harness.engine.bad_blocks().len(), 1);
    }

    #[derive(Default)]
    struct TestPayloadStore(Mutex<HashMap<PayloadId, BuiltPayload>>);

    impl PayloadStore for TestPayloadStore {
        fn start_payload(
            &self,
            parent: B256,
            attributes: PayloadAttributes,
        ) -> Result<PayloadId, PayloadBuilderError> {
            let id = payload_id(&parent, &attributes);
            let block = random_block(1, Some(parent), 2);
            self.0.lock().insert(id, BuiltPayload::new(block, U256::from(1_000)));
            Ok(id)
        }

        fn get_payload(&self, id: PayloadId) -> Option<BuiltPayload> {
            self.0.lock().get(&id).cloned()
        }
    }

    fn forkchoice(head: B256) -> ForkchoiceState {
        ForkchoiceState { head_block_hash: head, ..Default::default() }
    }

    #[tokio::test]
    async fn forkchoice_zero_head() {
        let harness = TestHarness::new();
        let updated = harness.engine.on_forkchoice_updated(forkchoice(B256::ZERO), None).await;
        let updated = updated.unwrap();
        assert!(updated.is_invalid());
        assert_eq!(updated.payload_status.validation_error(), Some(ZERO_HASH_FORKCHOICE_HEAD));
        assert!(harness.forkchoice.events().is_empty());
        assert_eq!(harness.calls.count(), 1);
    }

    #[tokio::test]
    async fn forkchoice_known_head() {
        let harness = TestHarness::new();
        let head = random_block(10, None, 0);
        harness.provider.insert_block(head.clone());

        let state = ForkchoiceState {
            head_block_hash: head.hash(),
            safe_block_hash: random_hash(),
            finalized_block_hash: B256::ZERO,
        };
        let updated = harness.engine.on_forkchoice_updated(state, None).await.unwrap();
        assert_eq!(updated, ForkchoiceUpdated::new(PayloadStatus::valid(head.hash())));

        let events = harness.forkchoice.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].head_block_hash, head.hash());
        assert!(events[0].has_valid_safe_block_hash());
        assert!(!events[0].has_valid_finalized_block_hash());
    }

    #[tokio::test]
    async fn forkchoice_unknown_head_syncs() {
        let harness = TestHarness::new();
        let head = random_hash();
        let updated = harness.engine.on_forkchoice_updated(forkchoice(head), None).await.unwrap();
        assert!(updated.is_syncing());
        assert_eq!(harness.backward_sync.heads(), vec![head]);
    }

    #[tokio::test]
    async fn forkchoice_while_syncing() {
        let harness = TestHarness::new();
        harness.sync_state.set_syncing(true);
        let head = random_block(10, None, 0);
        harness.provider.insert_block(head.clone());

        let updated =
            harness.engine.on_forkchoice_updated(forkchoice(head.hash()), None).await.unwrap();
        assert!(updated.is_syncing());
        assert_eq!(harness.forkchoice.events().len(), 1);
    }

    #[tokio::test]
    async fn forkchoice_bad_head() {
        let harness = TestHarness::new();
        let head = random_block(10, None, 0);
        let ancestor = random_hash();
        harness.engine.bad_blocks().record_bad_block(&head, Some(ancestor));

        let updated =
            harness.engine.on_forkchoice_updated(forkchoice(head.hash()), None).await.unwrap();
        assert_eq!(updated, ForkchoiceUpdated::new(PayloadStatus::invalid(Some(ancestor), None)));
    }

    #[tokio::test]
    async fn forkchoice_starts_payload_build() {
        let mut harness = TestHarness::new();
        let store = Arc::new(TestPayloadStore::default());
        harness.engine = harness.engine.with_payload_store(store.clone());
        let head = random_block(10, None, 0);
        harness.provider.insert_block(head.clone());

        let attributes = PayloadAttributes {
            timestamp: head.timestamp + 12,
            prev_randao: random_hash(),
            suggested_fee_recipient: Address::random(),
            withdrawals: None,
        };
        let updated = harness
            .engine
            .on_forkchoice_updated(forkchoice(head.hash()), Some(attributes.clone()))
            .await
            .unwrap();
        let id = updated.payload_id.unwrap();
        assert_eq!(id, payload_id(&head.hash(), &attributes));

        let built = harness.engine.get_payload(id).unwrap();
        assert_eq!(built.block().parent_hash, head.hash());
        assert_eq!(built.fees(), U256::from(1_000));
        assert!(harness.engine.get_payload(PayloadId::new([9; 8])).is_none());
        assert_eq!(harness.calls.count(), 3);

        // a stale timestamp does not start a build
        let stale = PayloadAttributes { timestamp: head.timestamp, ..attributes };
        let updated = harness
            .engine
            .on_forkchoice_updated(forkchoice(head.hash()), Some(stale))
            .await
            .unwrap();
        assert!(updated.is_valid());
        assert_eq!(updated.payload_id, None);
    }
}
