use crate::{metrics::EngineApiMetrics, EngineApiError, EngineApiResult};
use async_trait::async_trait;
use fathom_beacon_consensus::BeaconConsensusEngine;
use fathom_rpc_api::EngineApiServer;
use fathom_rpc_types::engine::{
    ExecutionPayload, ExecutionPayloadEnvelopeV2, ForkchoiceState, ForkchoiceUpdated,
    PayloadAttributes, PayloadId, PayloadStatus, CAPABILITIES,
};
use jsonrpsee_core::RpcResult;
use std::{sync::Arc, time::Instant};
use tracing::trace;

/// The Engine API implementation that grants the Consensus layer access to data and
/// functions in the Execution layer that are crucial for the consensus process.
pub struct EngineApi {
    /// Payload admission and forkchoice handling.
    engine: Arc<BeaconConsensusEngine>,
    metrics: EngineApiMetrics,
}

impl EngineApi {
    /// Create new instance of [`EngineApi`].
    pub fn new(engine: Arc<BeaconConsensusEngine>) -> Self {
        Self { engine, metrics: EngineApiMetrics::default() }
    }

    /// See also <https://github.com/ethereum/execution-apis/blob/main/src/engine/paris.md#engine_newpayloadv1>
    /// Caution: This should not accept the `withdrawals` field
    pub async fn new_payload_v1(
        &self,
        payload: ExecutionPayload,
    ) -> EngineApiResult<PayloadStatus> {
        if payload.withdrawals.is_some() {
            self.engine.on_rejected_call();
            return Err(EngineApiError::WithdrawalsNotSupportedInV1)
        }
        Ok(self.engine.on_new_payload(payload).await?)
    }

    /// See also <https://github.com/ethereum/execution-apis/blob/main/src/engine/shanghai.md#engine_newpayloadv2>
    pub async fn new_payload_v2(
        &self,
        payload: ExecutionPayload,
    ) -> EngineApiResult<PayloadStatus> {
        Ok(self.engine.on_new_payload(payload).await?)
    }

    /// Updates the fork choice _without_ withdrawals.
    ///
    /// See also <https://github.com/ethereum/execution-apis/blob/main/src/engine/paris.md#engine_forkchoiceupdatedv1>
    ///
    /// Caution: This should not accept the `withdrawals` field
    pub async fn fork_choice_updated_v1(
        &self,
        state: ForkchoiceState,
        payload_attrs: Option<PayloadAttributes>,
    ) -> EngineApiResult<ForkchoiceUpdated> {
        if payload_attrs.as_ref().is_some_and(|attrs| attrs.withdrawals.is_some()) {
            self.engine.on_rejected_call();
            return Err(EngineApiError::WithdrawalsNotSupportedInV1)
        }
        Ok(self.engine.on_forkchoice_updated(state, payload_attrs).await?)
    }

    /// Updates the fork choice _with_ withdrawals.
    ///
    /// See also <https://github.com/ethereum/execution-apis/blob/main/src/engine/shanghai.md#engine_forkchoiceupdatedv2>
    pub async fn fork_choice_updated_v2(
        &self,
        state: ForkchoiceState,
        payload_attrs: Option<PayloadAttributes>,
    ) -> EngineApiResult<ForkchoiceUpdated> {
        Ok(self.engine.on_forkchoice_updated(state, payload_attrs).await?)
    }

    /// Returns the most recent version of the payload that is available in the corresponding
    /// payload build process at the time of receiving this call.
    ///
    /// Caution: This should not return the `withdrawals` field
    pub fn get_payload_v1(&self, payload_id: PayloadId) -> EngineApiResult<ExecutionPayload> {
        let built = self.engine.get_payload(payload_id).ok_or(EngineApiError::UnknownPayload)?;
        let mut payload = built.to_execution_payload();
        payload.withdrawals = None;
        Ok(payload)
    }

    /// Returns the most recent version of the payload together with the value it pays to the
    /// fee recipient.
    pub fn get_payload_v2(
        &self,
        payload_id: PayloadId,
    ) -> EngineApiResult<ExecutionPayloadEnvelopeV2> {
        let built = self.engine.get_payload(payload_id).ok_or(EngineApiError::UnknownPayload)?;
        Ok(ExecutionPayloadEnvelopeV2 {
            execution_payload: built.to_execution_payload(),
            block_value: built.fees(),
        })
    }
}

#[async_trait]
impl EngineApiServer for EngineApi {
    /// Handler for `engine_newPayloadV1`
    async fn new_payload_v1(&self, payload: ExecutionPayload) -> RpcResult<PayloadStatus> {
        trace!(target: "rpc::engine", "Serving engine_newPayloadV1");
        let start = Instant::now();
        let res = Self::new_payload_v1(self, payload).await;
        self.metrics.latency.new_payload_v1.record(start.elapsed());
        Ok(res?)
    }

    /// Handler for `engine_newPayloadV2`
    async fn new_payload_v2(&self, payload: ExecutionPayload) -> RpcResult<PayloadStatus> {
        trace!(target: "rpc::engine", "Serving engine_newPayloadV2");
        let start = Instant::now();
        let res = Self::new_payload_v2(self, payload).await;
        self.metrics.latency.new_payload_v2.record(start.elapsed());
        Ok(res?)
    }

    /// Handler for `engine_forkchoiceUpdatedV1`
    async fn fork_choice_updated_v1(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated> {
        trace!(target: "rpc::engine", "Serving engine_forkchoiceUpdatedV1");
        let start = Instant::now();
        let res = Self::fork_choice_updated_v1(self, fork_choice_state, payload_attributes).await;
        self.metrics.latency.fork_choice_updated_v1.record(start.elapsed());
        Ok(res?)
    }

    /// Handler for `engine_forkchoiceUpdatedV2`
    async fn fork_choice_updated_v2(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated> {
        trace!(target: "rpc::engine", "Serving engine_forkchoiceUpdatedV2");
        let start = Instant::now();
        let res = Self::fork_choice_updated_v2(self, fork_choice_state, payload_attributes).await;
        self.metrics.latency.fork_choice_updated_v2.record(start.elapsed());
        Ok(res?)
    }

    /// Handler for `engine_getPayloadV1`
    async fn get_payload_v1(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayload> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadV1");
        let start = Instant::now();
        let res = Self::get_payload_v1(self, payload_id);
        self.metrics.latency.get_payload_v1.record(start.elapsed());
        Ok(res?)
    }

    /// Handler for `engine_getPayloadV2`
    async fn get_payload_v2(
        &self,
        payload_id: PayloadId,
    ) -> RpcResult<ExecutionPayloadEnvelopeV2> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadV2");
        let start = Instant::now();
        let res = Self::get_payload_v2(self, payload_id);
        self.metrics.latency.get_payload_v2.record(start.elapsed());
        Ok(res?)
    }

    /// Handler for `engine_exchangeCapabilities`
    async fn exchange_capabilities(&self, _capabilities: Vec<String>) -> RpcResult<Vec<String>> {
        Ok(CAPABILITIES.into_iter().map(str::to_owned).collect())
    }
}

impl std::fmt::Debug for EngineApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineApi").field("engine", &self.engine).finish_non_exhaustive()
    }
}
