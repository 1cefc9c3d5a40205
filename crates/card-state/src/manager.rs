//! The ConditionStateManager
//!
//! Owns the current snapshot and distributes `{old, new}` transitions.
//! Updates are serialized: a `set_state` issued while a notification pass is
//! running (from a listener, or from another thread) is queued and applied
//! once the running pass completes, so every listener observes every
//! transition exactly once and in order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use card_core::{ConditionState, ConditionStatePatch};
use tracing::{debug, error, instrument, trace};

use crate::listeners::ListenerSet;

/// Maximum number of updates queued by listeners that a single notification
/// pass will apply before the remaining ones are dropped
///
/// Updates queued from other threads while a pass is running are not
/// counted.
pub const MAX_CHAINED_UPDATES: usize = 100;

/// A transition between two published snapshots
#[derive(Debug, Clone)]
pub struct ConditionStateChange {
    pub old: Arc<ConditionState>,
    pub new: Arc<ConditionState>,
}

/// Callback invoked on every state transition
pub type StateListener = Arc<dyn Fn(&ConditionStateChange) + Send + Sync>;

/// Read-only view of a condition state owner
///
/// Consumers that only evaluate state depend on this trait; the mutator
/// stays with whoever owns the [`ConditionStateManager`].
pub trait ConditionStateSource: Send + Sync {
    /// The current snapshot
    fn get_state(&self) -> Arc<ConditionState>;

    /// Subscribe to transitions; adding the same listener twice is a no-op
    fn add_listener(&self, listener: StateListener);

    /// Unsubscribe; removing an unknown listener is a no-op
    fn remove_listener(&self, listener: &StateListener);
}

#[derive(Default)]
struct UpdateQueue {
    pending: VecDeque<(ThreadId, ConditionStatePatch)>,
    dispatching: bool,
}

/// Owns the current [`ConditionState`] and notifies subscribers of changes
pub struct ConditionStateManager {
    /// The last published snapshot
    state: RwLock<Arc<ConditionState>>,
    /// Subscribers, notified in subscription order
    listeners: ListenerSet<dyn Fn(&ConditionStateChange) + Send + Sync>,
    /// Updates waiting for the running notification pass to finish
    queue: Mutex<UpdateQueue>,
}

impl ConditionStateManager {
    /// Create a manager with an empty state
    pub fn new() -> Self {
        Self::with_state(ConditionState::default())
    }

    /// Create a manager with an initial state
    pub fn with_state(state: ConditionState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
            listeners: ListenerSet::new(),
            queue: Mutex::new(UpdateQueue::default()),
        }
    }

    /// Merge a partial update over the current snapshot
    ///
    /// Listeners are notified only if some key actually changed. When called
    /// while a notification pass is running, the update is queued and this
    /// call returns before it has been applied.
    #[instrument(skip_all)]
    pub fn set_state(&self, patch: ConditionStatePatch) {
        {
            let mut queue = self.lock_queue();
            queue.pending.push_back((thread::current().id(), patch));
            if queue.dispatching {
                trace!(
                    pending = queue.pending.len(),
                    "Notification in progress, queueing update"
                );
                return;
            }
            queue.dispatching = true;
        }

        let mut guard = DispatchGuard {
            queue: &self.queue,
            armed: true,
        };
        self.drain();
        guard.armed = false;
    }

    /// The current snapshot
    pub fn get_state(&self) -> Arc<ConditionState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe to transitions
    pub fn add_listener(&self, listener: StateListener) {
        self.listeners.add(listener);
    }

    /// Unsubscribe from transitions
    pub fn remove_listener(&self, listener: &StateListener) {
        self.listeners.remove(listener);
    }

    /// Number of subscribed listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn drain(&self) {
        let dispatcher = thread::current().id();
        let mut chained = 0usize;
        let mut first = true;

        loop {
            let patch = {
                let mut queue = self.lock_queue();
                let Some((origin, patch)) = queue.pending.pop_front() else {
                    queue.dispatching = false;
                    return;
                };
                if !first && origin == dispatcher {
                    chained += 1;
                }
                if chained > MAX_CHAINED_UPDATES {
                    error!(
                        dropped = queue.pending.len() + 1,
                        "Too many chained condition state updates, check automations for loops"
                    );
                    queue.pending.clear();
                    queue.dispatching = false;
                    return;
                }
                patch
            };
            first = false;
            self.apply(&patch);
        }
    }

    fn apply(&self, patch: &ConditionStatePatch) {
        let change = {
            let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let (merged, changed) = current.merged(patch);
            if !changed {
                trace!("Condition state unchanged, skipping notification");
                return;
            }

            let old = Arc::clone(&current);
            let new = Arc::new(merged);
            *current = Arc::clone(&new);
            ConditionStateChange { old, new }
        };

        let listeners = self.listeners.snapshot();
        debug!(listeners = listeners.len(), "Condition state changed");

        for listener in listeners {
            listener(&change);
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, UpdateQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConditionStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionStateSource for ConditionStateManager {
    fn get_state(&self) -> Arc<ConditionState> {
        ConditionStateManager::get_state(self)
    }

    fn add_listener(&self, listener: StateListener) {
        ConditionStateManager::add_listener(self, listener);
    }

    fn remove_listener(&self, listener: &StateListener) {
        ConditionStateManager::remove_listener(self, listener);
    }
}

/// Resets the dispatching flag if a listener panics mid-pass
struct DispatchGuard<'a> {
    queue: &'a Mutex<UpdateQueue>,
    armed: bool,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.pending.clear();
            queue.dispatching = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_core::EntitySnapshot;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_listener() -> (StateListener, Arc<Mutex<Vec<ConditionStateChange>>>) {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        let listener: StateListener = Arc::new(move |change: &ConditionStateChange| {
            sink.lock().unwrap().push(change.clone());
        });
        (listener, changes)
    }

    #[test]
    fn test_set_and_get_state() {
        let manager = ConditionStateManager::new();
        manager.set_state(ConditionStatePatch::new().camera("front").fullscreen(true));

        let state = manager.get_state();
        assert_eq!(state.camera.as_deref(), Some("front"));
        assert_eq!(state.fullscreen, Some(true));
    }

    #[test]
    fn test_listener_receives_old_and_new() {
        let manager = ConditionStateManager::new();
        manager.set_state(ConditionStatePatch::new().camera("a"));

        let (listener, changes) = recording_listener();
        manager.add_listener(listener);

        let before = manager.get_state();
        manager.set_state(ConditionStatePatch::new().camera("b"));

        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert!(Arc::ptr_eq(&changes[0].old, &before));
        assert_eq!(changes[0].old.camera.as_deref(), Some("a"));
        assert_eq!(changes[0].new.camera.as_deref(), Some("b"));
        // Old snapshot is never mutated
        assert_eq!(before.camera.as_deref(), Some("a"));
    }

    #[test]
    fn test_unchanged_update_does_not_notify() {
        let manager = ConditionStateManager::new();
        let entities = Arc::new(EntitySnapshot::new().with_state("light.a", "on"));
        manager.set_state(ConditionStatePatch::new().entities(entities.clone()).view("live"));

        let (listener, changes) = recording_listener();
        manager.add_listener(listener);

        manager.set_state(ConditionStatePatch::new().view("live"));
        manager.set_state(ConditionStatePatch::new().entities(entities));
        manager.set_state(ConditionStatePatch::new());

        assert!(changes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_add_listener_is_idempotent() {
        let manager = ConditionStateManager::new();
        let (listener, changes) = recording_listener();

        manager.add_listener(listener.clone());
        manager.add_listener(listener.clone());
        assert_eq!(manager.listener_count(), 1);

        manager.set_state(ConditionStatePatch::new().expand(true));
        assert_eq!(changes.lock().unwrap().len(), 1);

        manager.remove_listener(&listener);
        manager.remove_listener(&listener);
        assert_eq!(manager.listener_count(), 0);

        manager.set_state(ConditionStatePatch::new().expand(false));
        assert_eq!(changes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reentrant_update_is_queued() {
        let manager = Arc::new(ConditionStateManager::new());
        let weak = Arc::downgrade(&manager);

        // Reacts to fullscreen by setting expand, from inside the notification
        let reactor: StateListener = Arc::new(move |change: &ConditionStateChange| {
            if change.new.fullscreen == Some(true) && change.old.fullscreen != Some(true) {
                if let Some(manager) = weak.upgrade() {
                    manager.set_state(ConditionStatePatch::new().expand(true));
                    // Not applied until the current pass completes
                    assert_eq!(manager.get_state().expand, None);
                }
            }
        });
        let (recorder, changes) = recording_listener();
        manager.add_listener(reactor);
        manager.add_listener(recorder);

        manager.set_state(ConditionStatePatch::new().fullscreen(true));

        let changes = changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].new.fullscreen, Some(true));
        assert_eq!(changes[0].new.expand, None);
        assert_eq!(changes[1].old.expand, None);
        assert_eq!(changes[1].new.expand, Some(true));
        assert_eq!(manager.get_state().expand, Some(true));
    }

    #[test]
    fn test_listener_removed_during_notification() {
        let manager = Arc::new(ConditionStateManager::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let (recorder, changes) = recording_listener();
        let recorder_handle = recorder.clone();
        let weak = Arc::downgrade(&manager);
        let remover: StateListener = Arc::new(move |_: &ConditionStateChange| {
            if let Some(manager) = weak.upgrade() {
                manager.remove_listener(&recorder_handle);
            }
        });
        let counter: StateListener = {
            let calls = calls.clone();
            Arc::new(move |_: &ConditionStateChange| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        manager.add_listener(remover);
        manager.add_listener(recorder);
        manager.add_listener(counter);

        manager.set_state(ConditionStatePatch::new().interaction(true));
        // The pass in progress still reaches every listener
        assert_eq!(changes.lock().unwrap().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        manager.set_state(ConditionStatePatch::new().interaction(false));
        assert_eq!(changes.lock().unwrap().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_chained_update_loop_is_cut() {
        let manager = Arc::new(ConditionStateManager::new());
        let weak = Arc::downgrade(&manager);

        // Toggles interaction forever
        let toggler: StateListener = Arc::new(move |change: &ConditionStateChange| {
            if let Some(manager) = weak.upgrade() {
                let next = !change.new.interaction.unwrap_or(false);
                manager.set_state(ConditionStatePatch::new().interaction(next));
            }
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let counter: StateListener = {
            let calls = calls.clone();
            Arc::new(move |_: &ConditionStateChange| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        manager.add_listener(toggler);
        manager.add_listener(counter);

        manager.set_state(ConditionStatePatch::new().interaction(true));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_CHAINED_UPDATES + 1);

        // The manager accepts updates again afterwards
        manager.set_state(ConditionStatePatch::new().camera("x"));
        assert_eq!(manager.get_state().camera.as_deref(), Some("x"));
    }
}
