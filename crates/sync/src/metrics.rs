use metrics::{gauge, Gauge};

/// Sync progress gauges.
#[derive(Clone)]
pub(crate) struct SyncMetrics {
    /// The estimated highest block available.
    pub(crate) best_known_block_number: Gauge,
    /// Whether the local node has caught up with the best known peer.
    pub(crate) in_sync: Gauge,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self {
            best_known_block_number: gauge!("sync.best_known_block_number"),
            in_sync: gauge!("sync.in_sync"),
        }
    }
}

impl std::fmt::Debug for SyncMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncMetrics").finish_non_exhaustive()
    }
}
