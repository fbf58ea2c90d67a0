use crate::metrics::SyncMetrics;
use fathom_interfaces::sync::SyncStateProvider;
use fathom_primitives::BlockNumber;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, info};

/// Number of blocks the local head may trail the best known block and still be in sync.
pub const DEFAULT_IN_SYNC_TOLERANCE: u64 = 5;

/// Identifies a listener registered on the [`SyncState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Progress of a sync that is not caught up yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Local head when the current sync started.
    pub starting_block: BlockNumber,
    /// Local head.
    pub current_block: BlockNumber,
    /// Best block known from peers.
    pub highest_block: BlockNumber,
}

type SyncStatusListener = Arc<dyn Fn(Option<SyncStatus>) + Send + Sync>;
type InSyncListener = Arc<dyn Fn(bool) + Send + Sync>;

struct InSyncSubscription {
    listener: InSyncListener,
    tolerance: u64,
    in_sync: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    initial_sync_done: bool,
    reached_terminal_difficulty: Option<bool>,
    best_chain_height: BlockNumber,
    local_head: BlockNumber,
    starting_block: BlockNumber,
}

impl Progress {
    fn in_sync(&self, tolerance: u64) -> bool {
        self.initial_sync_done &&
            self.best_chain_height.saturating_sub(self.local_head) <= tolerance
    }

    fn status(&self, tolerance: u64) -> Option<SyncStatus> {
        if self.in_sync(tolerance) {
            return None
        }
        Some(SyncStatus {
            starting_block: self.starting_block,
            current_block: self.local_head,
            highest_block: self.best_chain_height.max(self.local_head),
        })
    }
}

/// Shared record of how far the node is caught up with the network.
///
/// Written only by the synchronizer, read by everyone else. Listeners are invoked after the
/// state lock was released, in registration order.
pub struct SyncState {
    progress: RwLock<Progress>,
    next_subscription_id: AtomicU64,
    sync_status_listeners: RwLock<BTreeMap<SubscriptionId, SyncStatusListener>>,
    in_sync_listeners: Mutex<BTreeMap<SubscriptionId, InSyncSubscription>>,
    in_sync_tolerance: u64,
    metrics: SyncMetrics,
}

impl SyncState {
    /// Creates the state of a node that has not synced yet.
    pub fn new() -> Self {
        Self::with_in_sync_tolerance(DEFAULT_IN_SYNC_TOLERANCE)
    }

    /// Creates the state with a custom default in-sync tolerance.
    pub fn with_in_sync_tolerance(in_sync_tolerance: u64) -> Self {
        Self {
            progress: RwLock::new(Progress::default()),
            next_subscription_id: AtomicU64::new(0),
            sync_status_listeners: RwLock::new(BTreeMap::new()),
            in_sync_listeners: Mutex::new(BTreeMap::new()),
            in_sync_tolerance,
            metrics: SyncMetrics::default(),
        }
    }

    /// Returns `true` once the catch-up phase completed.
    pub fn is_initial_sync_phase_done(&self) -> bool {
        self.progress.read().initial_sync_done
    }

    /// Marks the catch-up phase as completed.
    pub fn mark_initial_sync_phase_done(&self) {
        info!(target: "sync::state", "Initial sync phase done");
        self.update(|progress| progress.initial_sync_done = true);
    }

    /// Reverts to the catch-up phase, used when the world state is synced again.
    pub fn mark_initial_sync_restart(&self) {
        info!(target: "sync::state", "Restarting initial sync");
        self.update(|progress| {
            progress.initial_sync_done = false;
            progress.reached_terminal_difficulty = None;
            progress.starting_block = progress.local_head;
        });
    }

    /// Whether the sync reached the configured termination point, `None` while undecided.
    pub fn has_reached_terminal_difficulty(&self) -> Option<bool> {
        self.progress.read().reached_terminal_difficulty
    }

    /// Records whether the sync reached the configured termination point.
    pub fn set_reached_terminal_difficulty(&self, reached: bool) {
        debug!(target: "sync::state", reached, "Terminal difficulty");
        self.update(|progress| progress.reached_terminal_difficulty = Some(reached));
    }

    /// The best block known from peers.
    pub fn best_chain_height(&self) -> BlockNumber {
        self.progress.read().best_chain_height
    }

    /// Records the best block known from peers.
    pub fn set_best_chain_height(&self, height: BlockNumber) {
        self.update(|progress| progress.best_chain_height = height);
    }

    /// The local chain head.
    pub fn local_head(&self) -> BlockNumber {
        self.progress.read().local_head
    }

    /// Records a new local chain head.
    pub fn set_local_head(&self, head: BlockNumber) {
        self.update(|progress| progress.local_head = head);
    }

    /// Progress of the sync, `None` when the node is in sync.
    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.progress.read().status(self.in_sync_tolerance)
    }

    /// Returns `true` if the node is in sync within the default tolerance.
    pub fn is_in_sync(&self) -> bool {
        self.is_in_sync_with_tolerance(self.in_sync_tolerance)
    }

    /// Returns `true` if the initial sync is done and the local head trails the best known
    /// block by at most `tolerance` blocks.
    pub fn is_in_sync_with_tolerance(&self, tolerance: u64) -> bool {
        self.progress.read().in_sync(tolerance)
    }

    /// Registers a listener called whenever the sync status changes.
    pub fn subscribe_sync_status(
        &self,
        listener: impl Fn(Option<SyncStatus>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.sync_status_listeners.write().insert(id, Arc::new(listener));
        id
    }

    /// Removes a sync status listener. Returns `false` if the id is unknown.
    pub fn unsubscribe_sync_status(&self, id: SubscriptionId) -> bool {
        self.sync_status_listeners.write().remove(&id).is_some()
    }

    /// Registers a listener called whenever the node enters or leaves the in-sync state.
    ///
    /// `tolerance` defaults to the tolerance the state was created with.
    pub fn subscribe_in_sync(
        &self,
        listener: impl Fn(bool) + Send + Sync + 'static,
        tolerance: Option<u64>,
    ) -> SubscriptionId {
        let tolerance = tolerance.unwrap_or(self.in_sync_tolerance);
        let id = self.next_id();
        let in_sync = self.is_in_sync_with_tolerance(tolerance);
        self.in_sync_listeners
            .lock()
            .insert(id, InSyncSubscription { listener: Arc::new(listener), tolerance, in_sync });
        id
    }

    /// Removes an in-sync listener. Returns `false` if the id is unknown.
    pub fn unsubscribe_in_sync(&self, id: SubscriptionId) -> bool {
        self.in_sync_listeners.lock().remove(&id).is_some()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed))
    }

    fn update(&self, f: impl FnOnce(&mut Progress)) {
        let (before, after) = {
            let mut progress = self.progress.write();
            let before = *progress;
            f(&mut progress);
            (before, *progress)
        };
        let status = after.status(self.in_sync_tolerance);
        self.metrics.best_known_block_number.set(after.best_chain_height as f64);
        self.metrics.in_sync.set(if status.is_none() { 1.0 } else { 0.0 });

        if status != before.status(self.in_sync_tolerance) {
            let listeners: Vec<_> = self.sync_status_listeners.read().values().cloned().collect();
            for listener in listeners {
                listener(status);
            }
        }

        let mut changed = Vec::new();
        for subscription in self.in_sync_listeners.lock().values_mut() {
            let in_sync = after.in_sync(subscription.tolerance);
            if in_sync != subscription.in_sync {
                subscription.in_sync = in_sync;
                changed.push((subscription.listener.clone(), in_sync));
            }
        }
        for (listener, in_sync) in changed {
            listener(in_sync);
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateProvider for SyncState {
    fn is_syncing(&self) -> bool {
        !self.is_initial_sync_phase_done()
    }
}

impl fmt::Debug for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncState")
            .field("progress", &*self.progress.read())
            .field("in_sync_tolerance", &self.in_sync_tolerance)
            .field("sync_status_listeners", &self.sync_status_listeners.read().len())
            .field("in_sync_listeners", &self.in_sync_listeners.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn syncing_until_initial_phase_done() {
        let state = SyncState::new();
        assert!(state.is_syncing());
        state.mark_initial_sync_phase_done();
        assert!(!state.is_syncing());
        state.mark_initial_sync_restart();
        assert!(state.is_syncing());
    }

    #[test]
    fn sync_status_tracks_heads() {
        let state = SyncState::new();
        state.set_local_head(10);
        state.mark_initial_sync_restart();
        state.set_best_chain_height(100);
        state.set_local_head(40);
        assert_eq!(
            state.sync_status(),
            Some(SyncStatus { starting_block: 10, current_block: 40, highest_block: 100 })
        );

        state.mark_initial_sync_phase_done();
        state.set_local_head(96);
        assert_eq!(state.sync_status(), None);
        assert!(state.is_in_sync());
        assert!(!state.is_in_sync_with_tolerance(3));
    }

    #[test]
    fn in_sync_listeners_fire_on_change() {
        let state = SyncState::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let strict = {
            let events = events.clone();
            state.subscribe_in_sync(move |in_sync| events.lock().push(("strict", in_sync)), Some(0))
        };
        {
            let events = events.clone();
            state.subscribe_in_sync(move |in_sync| events.lock().push(("default", in_sync)), None);
        }

        state.set_best_chain_height(100);
        state.set_local_head(98);
        assert!(events.lock().is_empty());

        state.mark_initial_sync_phase_done();
        assert_eq!(*events.lock(), vec![("default", true)]);

        state.set_local_head(100);
        assert_eq!(*events.lock(), vec![("default", true), ("strict", true)]);

        assert!(state.unsubscribe_in_sync(strict));
        assert!(!state.unsubscribe_in_sync(strict));
        state.set_best_chain_height(200);
        assert_eq!(events.lock().last(), Some(&("default", false)));
        assert_eq!(events.lock().len(), 3);
    }

    #[test]
    fn sync_status_listener_unsubscribes() {
        let state = SyncState::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let id = {
            let calls = calls.clone();
            state.subscribe_sync_status(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        state.set_best_chain_height(50);
        // unchanged status is not reported
        state.set_best_chain_height(50);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(state.unsubscribe_sync_status(id));
        state.set_best_chain_height(60);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_ids_are_unique() {
        let state = SyncState::new();
        let a = state.subscribe_sync_status(|_| {});
        let b = state.subscribe_in_sync(|_| {}, None);
        assert_ne!(a, b);
        // ids are not shared between the two registries
        assert!(!state.unsubscribe_sync_status(b));
        assert!(state.unsubscribe_in_sync(b));
    }
}
