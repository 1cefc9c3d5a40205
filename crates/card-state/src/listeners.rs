//! Identity-keyed listener lists
//!
//! Listeners are `Arc` callbacks compared by pointer identity, so adding the
//! same `Arc` twice is a no-op. Notification iterates over a snapshot of the
//! list, taken before any callback runs; a callback may add or remove
//! listeners (itself included) without affecting the pass in progress.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A set of listeners compared by `Arc` identity
pub struct ListenerSet<L: ?Sized> {
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerSet<L> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Add a listener; returns false if it was already present
    pub fn add(&self, listener: Arc<L>) -> bool {
        let mut listeners = self.lock();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove a listener; returns false if it was not present
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    /// Remove all listeners
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current list, in registration order
    ///
    /// Callers iterate over the copy with no lock held.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<L>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerSet<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

// Compare data pointers only; vtable pointers of the same closure may differ
// between codegen units.
fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
