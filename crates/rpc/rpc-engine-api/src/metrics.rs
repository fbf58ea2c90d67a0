use metrics::{histogram, Histogram};

/// All Engine API metrics
#[derive(Default)]
pub(crate) struct EngineApiMetrics {
    /// Engine API latency metrics
    pub(crate) latency: EngineApiLatencyMetrics,
}

/// Engine API latency metrics, in seconds.
pub(crate) struct EngineApiLatencyMetrics {
    /// Latency for `engine_newPayloadV1`
    pub(crate) new_payload_v1: Histogram,
    /// Latency for `engine_newPayloadV2`
    pub(crate) new_payload_v2: Histogram,
    /// Latency for `engine_forkchoiceUpdatedV1`
    pub(crate) fork_choice_updated_v1: Histogram,
    /// Latency for `engine_forkchoiceUpdatedV2`
    pub(crate) fork_choice_updated_v2: Histogram,
    /// Latency for `engine_getPayloadV1`
    pub(crate) get_payload_v1: Histogram,
    /// Latency for `engine_getPayloadV2`
    pub(crate) get_payload_v2: Histogram,
}

impl Default for EngineApiLatencyMetrics {
    fn default() -> Self {
        Self {
            new_payload_v1: histogram!("engine.rpc.new_payload_v1"),
            new_payload_v2: histogram!("engine.rpc.new_payload_v2"),
            fork_choice_updated_v1: histogram!("engine.rpc.fork_choice_updated_v1"),
            fork_choice_updated_v2: histogram!("engine.rpc.fork_choice_updated_v2"),
            get_payload_v1: histogram!("engine.rpc.get_payload_v1"),
            get_payload_v2: histogram!("engine.rpc.get_payload_v2"),
        }
    }
}
