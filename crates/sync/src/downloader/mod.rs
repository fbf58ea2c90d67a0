//! Catch-up and full sync strategies.

use crate::{SyncError, TrailingPeerRequirements};
use fathom_primitives::SealedHeader;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;

mod full;
pub use full::{FullSyncDownloader, DEFAULT_IDLE_INTERVAL};

mod pivoted;
pub use pivoted::PivotedSyncDownloader;

/// Result of a completed catch-up run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUpOutcome {
    /// The block whose world state was downloaded.
    pub pivot: SealedHeader,
}

/// A strategy that brings a fresh node close to the chain head before full sync takes over.
///
/// Instances are created per attempt. At most one is active at a time.
pub trait CatchUpDownloader: Send + Sync {
    /// Starts the run. The returned future resolves once the run completed, failed or was
    /// stopped, in which case it fails with [`SyncError::Stopped`].
    fn start(&self) -> BoxFuture<'static, Result<CatchUpOutcome, SyncError>>;

    /// Stops the active run.
    fn stop(&self);

    /// Discards persisted progress so the next run starts over.
    fn delete_state(&self) -> Result<(), SyncError>;

    /// Peers the active run needs, `None` when no run is active or it places no requirement.
    fn trailing_peer_requirements(&self) -> Option<TrailingPeerRequirements>;

    /// Returns `true` for instances created to sync the world state again.
    fn is_resync(&self) -> bool;
}

/// Stops the active run of a downloader.
///
/// Each start arms a new signal, so stopping one run never leaks into the next.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    current: Mutex<Option<watch::Sender<bool>>>,
}

impl StopSignal {
    /// Arms the signal for a new run, dropping the previous one which stops that run.
    pub(crate) fn arm(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        *self.current.lock() = Some(tx);
        rx
    }

    /// Returns `true` while the latest run is neither stopped nor finished.
    pub(crate) fn is_armed(&self) -> bool {
        self.current.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub(crate) fn trigger(&self) {
        if let Some(tx) = self.current.lock().take() {
            let _ = tx.send(true);
        }
    }
}

/// Resolves once the signal fired or the run was superseded.
pub(crate) async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}
