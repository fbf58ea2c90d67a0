use fathom_interfaces::{provider::ProviderError, InfrastructureFault};

/// Represents all error cases when handling a new payload.
///
/// Only failures of the node itself end up here, everything that is wrong with the payload is
/// reported through its [`PayloadStatus`](fathom_rpc_types::engine::PayloadStatus).
#[derive(Debug, thiserror::Error)]
pub enum BeaconOnNewPayloadError {
    /// Block processing ran into a fault of the node's infrastructure.
    #[error(transparent)]
    Internal(#[from] InfrastructureFault),
    /// The block store or the ancestor resolver failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Represents error cases for an applied forkchoice update.
#[derive(Debug, thiserror::Error)]
pub enum BeaconForkChoiceUpdateError {
    /// The block store failed while looking up the new head.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
