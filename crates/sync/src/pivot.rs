//! Pivot block selection for catch-up strategies that download the world state.

use crate::{traits::PeerChainHeads, PivotSelectionError};
use async_trait::async_trait;
use fathom_interfaces::consensus::ForkchoiceEvent;
use fathom_primitives::{BlockHash, SealedHeader};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info};

/// Default interval between checks for new peers or forkchoice updates.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Chooses the block whose world state a catch-up run downloads.
#[async_trait]
pub trait PivotBlockSelector: Send + Sync {
    /// Picks the pivot header.
    async fn select_pivot(&self) -> Result<SealedHeader, PivotSelectionError>;

    /// Forkchoice updates from the consensus layer.
    fn on_new_unverified_forkchoice(&self, _event: &ForkchoiceEvent) {}

    /// Releases resources once the catch-up finished.
    fn close(&self) {}
}

/// Picks the pivot a fixed distance behind the head that enough peers agree on.
pub struct PeerPivotSelector {
    peers: Arc<dyn PeerChainHeads>,
    pivot_distance: u64,
    min_peers: usize,
    timeout: Duration,
    poll_interval: Duration,
}

impl PeerPivotSelector {
    /// Creates a selector that waits up to `timeout` for `min_peers` peers.
    pub fn new(
        peers: Arc<dyn PeerChainHeads>,
        pivot_distance: u64,
        min_peers: usize,
        timeout: Duration,
    ) -> Self {
        Self { peers, pivot_distance, min_peers, timeout, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    /// Sets how often the peer set is checked while waiting.
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Waits for enough peers and returns the head at least `min_peers` of them reached.
    async fn agreed_height(&self) -> Result<u64, PivotSelectionError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let mut heads = self.peers.peer_heads();
            if self.min_peers > 0 && heads.len() >= self.min_peers {
                heads.sort_unstable_by(|a, b| b.cmp(a));
                return Ok(heads[self.min_peers - 1])
            }
            if Instant::now() >= deadline {
                return Err(PivotSelectionError::NotEnoughPeers {
                    have: heads.len(),
                    need: self.min_peers,
                })
            }
            debug!(
                target: "sync::pivot",
                peers = heads.len(),
                needed = self.min_peers,
                "Waiting for peers to select pivot"
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl PivotBlockSelector for PeerPivotSelector {
    async fn select_pivot(&self) -> Result<SealedHeader, PivotSelectionError> {
        let height = self.agreed_height().await?;
        let number = height.checked_sub(self.pivot_distance).filter(|number| *number > 0).ok_or(
            PivotSelectionError::ChainTooShort { height, distance: self.pivot_distance },
        )?;
        let pivot = self
            .peers
            .header_by_number(number)
            .await?
            .ok_or(PivotSelectionError::HeaderUnavailable(number))?;
        info!(target: "sync::pivot", number, hash = %pivot.hash(), "Selected pivot block");
        Ok(pivot)
    }
}

impl std::fmt::Debug for PeerPivotSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerPivotSelector")
            .field("pivot_distance", &self.pivot_distance)
            .field("min_peers", &self.min_peers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Uses the safe block announced by the consensus layer as pivot.
pub struct SafeBlockPivotSelector {
    peers: Arc<dyn PeerChainHeads>,
    safe_block: Mutex<Option<BlockHash>>,
    timeout: Duration,
    poll_interval: Duration,
}

impl SafeBlockPivotSelector {
    /// Creates a selector that waits up to `timeout` for a safe block announcement.
    pub fn new(peers: Arc<dyn PeerChainHeads>, timeout: Duration) -> Self {
        Self { peers, safe_block: Mutex::new(None), timeout, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    /// Sets how often announcements are checked while waiting.
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The latest announced safe block.
    pub fn safe_block(&self) -> Option<BlockHash> {
        *self.safe_block.lock()
    }
}

#[async_trait]
impl PivotBlockSelector for SafeBlockPivotSelector {
    async fn select_pivot(&self) -> Result<SealedHeader, PivotSelectionError> {
        let deadline = Instant::now() + self.timeout;
        let hash = loop {
            if let Some(hash) = self.safe_block() {
                break hash
            }
            if Instant::now() >= deadline {
                return Err(PivotSelectionError::NoSafeBlock)
            }
            tokio::time::sleep(self.poll_interval).await;
        };
        let pivot = self
            .peers
            .header_by_hash(hash)
            .await?
            .ok_or(PivotSelectionError::UnknownSafeBlock(hash))?;
        info!(target: "sync::pivot", number = pivot.number, %hash, "Selected safe block as pivot");
        Ok(pivot)
    }

    fn on_new_unverified_forkchoice(&self, event: &ForkchoiceEvent) {
        if event.has_valid_safe_block_hash() {
            *self.safe_block.lock() = Some(event.safe_block_hash);
        }
    }

    fn close(&self) {
        self.safe_block.lock().take();
    }
}

impl std::fmt::Debug for SafeBlockPivotSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeBlockPivotSelector")
            .field("safe_block", &self.safe_block())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
