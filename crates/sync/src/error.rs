use fathom_interfaces::InfrastructureFault;
use fathom_primitives::{BlockNumber, B256};

/// Errors of a catch-up or full sync run.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No pivot block could be chosen.
    #[error(transparent)]
    PivotSelection(#[from] PivotSelectionError),
    /// Storage failure.
    #[error(transparent)]
    Fault(#[from] InfrastructureFault),
    /// The chosen pivot lies before the trusted checkpoint.
    #[error("pivot block {pivot} is below checkpoint block {checkpoint}")]
    PivotBelowCheckpoint {
        /// Number of the pivot block.
        pivot: BlockNumber,
        /// Number of the checkpoint block.
        checkpoint: BlockNumber,
    },
    /// Downloading blocks from peers failed.
    #[error("chain download failed: {0}")]
    ChainDownload(String),
    /// Downloading the world state from peers failed.
    #[error("world state download failed: {0}")]
    WorldStateDownload(String),
    /// The run was stopped before it completed.
    #[error("sync stopped")]
    Stopped,
    /// The task driving the run panicked or was cancelled.
    #[error("sync task failed: {0}")]
    Task(String),
}

/// Errors when choosing the pivot block.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PivotSelectionError {
    /// Not enough peers reported their chain head before the timeout.
    #[error("not enough peers to select a pivot block: have {have}, need {need}")]
    NotEnoughPeers {
        /// Peers with a known head.
        have: usize,
        /// Required number of peers.
        need: usize,
    },
    /// The best chain is shorter than the pivot distance.
    #[error("chain height {height} is too low for pivot distance {distance}")]
    ChainTooShort {
        /// Best height agreed on by enough peers.
        height: BlockNumber,
        /// Configured pivot distance.
        distance: u64,
    },
    /// No peer served the header of the chosen pivot.
    #[error("pivot header {0} unavailable")]
    HeaderUnavailable(BlockNumber),
    /// No safe block was announced by the consensus layer before the timeout.
    #[error("no safe block announced")]
    NoSafeBlock,
    /// No peer served the header of the announced safe block.
    #[error("safe block {0} unknown")]
    UnknownSafeBlock(B256),
    /// Failure while fetching headers.
    #[error(transparent)]
    Fault(#[from] InfrastructureFault),
}

/// Errors of the [`Synchronizer`](crate::Synchronizer) lifecycle.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SynchronizerError {
    /// `start` was called while a run is active.
    #[error("attempt to start an already started synchronizer")]
    AlreadyRunning,
    /// The builder lacks a component the configured sync mode needs.
    #[error("missing synchronizer component: {0}")]
    MissingComponent(&'static str),
}
