use fathom_interfaces::consensus::EngineCallListener;
use fathom_rpc_types::engine::PayloadStatus;
use metrics::counter;

/// Default [`EngineCallListener`]: counts engine API calls.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct MeteredEngineCallListener;

impl EngineCallListener for MeteredEngineCallListener {
    fn execution_engine_called(&self) {
        counter!("engine.calls").increment(1);
    }
}

/// Counts `newPayload` answers by status.
pub(crate) fn record_new_payload_status(status: &PayloadStatus) {
    counter!("engine.new_payload.status", "status" => status.status.as_str()).increment(1);
}

/// Counts `newPayload` calls that failed with an internal error.
pub(crate) fn record_new_payload_error() {
    counter!("engine.new_payload.internal_errors").increment(1);
}

/// Counts `forkchoiceUpdated` answers by status.
pub(crate) fn record_forkchoice_status(status: &PayloadStatus) {
    counter!("engine.forkchoice_updated.status", "status" => status.status.as_str()).increment(1);
}
