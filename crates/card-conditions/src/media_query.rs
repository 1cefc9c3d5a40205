//! Media query collaborators
//!
//! `screen` conditions are matched against live media queries owned by the
//! host display. The host exposes them through [`MediaQueries`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use card_state::ListenerSet;
use tracing::trace;

/// Callback invoked when a watched media query changes its result
pub type MediaQueryCallback = Arc<dyn Fn() + Send + Sync>;

/// Live media query evaluation
pub trait MediaQueries: Send + Sync {
    /// Evaluate a query now
    fn matches(&self, query: &str) -> bool;

    /// Watch a query for result changes
    ///
    /// The callback stays registered until the returned watcher is detached.
    fn watch(&self, query: &str, on_change: MediaQueryCallback) -> Box<dyn MediaQueryWatcher>;
}

/// Handle for a registered media query callback
pub trait MediaQueryWatcher: Send + Sync {
    /// Stop delivering changes; calling this more than once is a no-op
    fn detach(&self);
}

type CallbackSet = ListenerSet<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct StaticQueries {
    results: HashMap<String, bool>,
    watchers: HashMap<String, Arc<CallbackSet>>,
}

/// In-process media queries with settable results
///
/// Used by hosts without a display and in tests. Unknown queries do not
/// match.
#[derive(Clone, Default)]
pub struct StaticMediaQueries {
    inner: Arc<Mutex<StaticQueries>>,
}

impl std::fmt::Debug for StaticMediaQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("StaticMediaQueries")
            .field("results", &inner.results)
            .finish_non_exhaustive()
    }
}

impl StaticMediaQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the result of a query, notifying watchers if it changed
    pub fn set(&self, query: impl Into<String>, matches: bool) {
        let query = query.into();
        let callbacks = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = inner.results.insert(query.clone(), matches);
            if previous.unwrap_or(false) == matches {
                return;
            }
            inner.watchers.get(&query).map(|set| set.snapshot())
        };

        trace!(query = %query, matches, "Media query changed");
        for callback in callbacks.into_iter().flatten() {
            callback();
        }
    }

    /// Number of callbacks registered for a query
    pub fn watcher_count(&self, query: &str) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.watchers.get(query).map_or(0, |set| set.len())
    }
}

impl MediaQueries for StaticMediaQueries {
    fn matches(&self, query: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.results.get(query).copied().unwrap_or(false)
    }

    fn watch(&self, query: &str, on_change: MediaQueryCallback) -> Box<dyn MediaQueryWatcher> {
        let set = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(inner.watchers.entry(query.to_string()).or_default())
        };
        set.add(Arc::clone(&on_change));
        Box::new(StaticWatcher {
            set,
            callback: on_change,
        })
    }
}

struct StaticWatcher {
    set: Arc<CallbackSet>,
    callback: MediaQueryCallback,
}

impl MediaQueryWatcher for StaticWatcher {
    fn detach(&self) {
        self.set.remove(&self.callback);
    }
}
