//! The ConditionsManager
//!
//! Owns a list of condition trees, re-evaluates them whenever the condition
//! state or a watched media query changes, and notifies listeners when the
//! evaluation changes.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use card_core::ConditionState;
use card_state::{ConditionStateChange, ConditionStateSource, ListenerSet, StateListener};
use tracing::{debug, trace};

use crate::condition::Condition;
use crate::eval::{ConditionEnvironment, ConditionEvaluator, ConditionsEvaluation};
use crate::media_query::{MediaQueryCallback, MediaQueryWatcher};

/// Callback invoked with each published evaluation
pub type EvaluationListener = Arc<dyn Fn(&ConditionsEvaluation) + Send + Sync>;

struct Inner {
    conditions: RwLock<Vec<Condition>>,
    evaluator: ConditionEvaluator,
    state_source: Option<Arc<dyn ConditionStateSource>>,
    state_listener: Mutex<Option<StateListener>>,
    media_watchers: Mutex<Vec<Box<dyn MediaQueryWatcher>>>,
    /// The last published evaluation
    evaluation: Mutex<ConditionsEvaluation>,
    listeners: ListenerSet<dyn Fn(&ConditionsEvaluation) + Send + Sync>,
    destroyed: AtomicBool,
}

impl Inner {
    fn current_state(&self) -> Arc<ConditionState> {
        self.state_source
            .as_ref()
            .map(|source| source.get_state())
            .unwrap_or_default()
    }

    fn conditions(&self) -> std::sync::RwLockReadGuard<'_, Vec<Condition>> {
        self.conditions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn evaluation(&self) -> MutexGuard<'_, ConditionsEvaluation> {
        self.evaluation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate and publish if the result flipped or there is trigger data
    fn evaluate(&self, old: &ConditionState, new: &ConditionState) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }

        let published = {
            let conditions = self.conditions();
            let evaluation = self.evaluator.evaluate_all(&conditions, old, new);

            let mut current = self.evaluation();
            if evaluation.result == current.result && evaluation.trigger_data.is_none() {
                trace!(result = evaluation.result, "Evaluation unchanged");
                return;
            }
            *current = evaluation.clone();
            evaluation
        };

        debug!(
            result = published.result,
            trigger_data = published.trigger_data.is_some(),
            "Conditions evaluation changed"
        );

        for listener in self.listeners.snapshot() {
            listener(&published);
        }
    }

    fn on_media_query_change(&self) {
        let state = self.current_state();
        self.evaluate(&state, &state);
    }
}

/// Evaluates a list of condition trees against the live condition state
///
/// The trees are treated as an implicit AND. The evaluation is computed once,
/// silently, at construction, so [`get_evaluation`](Self::get_evaluation) is
/// always valid. Afterwards every state transition and every watched media
/// query change triggers a re-evaluation; listeners are notified when the
/// result flips or the evaluation carries trigger data.
///
/// Dropping the manager destroys it.
pub struct ConditionsManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConditionsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionsManager")
            .field("conditions", &self.inner.conditions().len())
            .field("evaluation", &*self.inner.evaluation())
            .field("destroyed", &self.inner.destroyed.load(Ordering::SeqCst))
            .finish()
    }
}

impl ConditionsManager {
    /// Create a manager over `conditions`
    ///
    /// Without a state source conditions are evaluated against an empty
    /// state and only media query changes trigger re-evaluation.
    pub fn new(
        conditions: Vec<Condition>,
        state_source: Option<Arc<dyn ConditionStateSource>>,
        env: ConditionEnvironment,
    ) -> Self {
        let media_queries = env.media_queries.clone();
        let inner = Arc::new(Inner {
            conditions: RwLock::new(conditions),
            evaluator: ConditionEvaluator::new(env),
            state_source,
            state_listener: Mutex::new(None),
            media_watchers: Mutex::new(Vec::new()),
            evaluation: Mutex::new(ConditionsEvaluation::default()),
            listeners: ListenerSet::new(),
            destroyed: AtomicBool::new(false),
        });

        if let Some(media_queries) = media_queries {
            let watchers: Vec<Box<dyn MediaQueryWatcher>> = screen_queries(&inner.conditions())
                .into_iter()
                .map(|query| {
                    let weak = Arc::downgrade(&inner);
                    let on_change: MediaQueryCallback = Arc::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.on_media_query_change();
                        }
                    });
                    media_queries.watch(&query, on_change)
                })
                .collect();
            *inner
                .media_watchers
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = watchers;
        }

        if let Some(source) = &inner.state_source {
            let listener = state_listener(Arc::downgrade(&inner));
            source.add_listener(Arc::clone(&listener));
            *inner
                .state_listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(listener);
        }

        let state = inner.current_state();
        let initial = inner
            .evaluator
            .evaluate_all(&inner.conditions(), &state, &state);
        trace!(result = initial.result, "Initial evaluation");
        *inner.evaluation() = initial;

        Self { inner }
    }

    /// The last published evaluation
    pub fn get_evaluation(&self) -> ConditionsEvaluation {
        self.inner.evaluation().clone()
    }

    /// Subscribe to published evaluations; adding twice is a no-op
    pub fn add_listener(&self, listener: EvaluationListener) {
        self.inner.listeners.add(listener);
    }

    /// Unsubscribe; removing an unknown listener is a no-op
    pub fn remove_listener(&self, listener: &EvaluationListener) {
        self.inner.listeners.remove(listener);
    }

    /// Whether any condition reads entity state
    pub fn has_entity_conditions(&self) -> bool {
        let mut found = false;
        for condition in self.inner.conditions().iter() {
            condition.walk(&mut |c| found |= c.uses_entities());
        }
        found
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Detach from the state source and media queries and drop all
    /// listeners and conditions
    ///
    /// Safe to call more than once.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let listener = self
            .inner
            .state_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let (Some(source), Some(listener)) = (&self.inner.state_source, listener) {
            source.remove_listener(&listener);
        }

        let watchers = std::mem::take(
            &mut *self
                .inner
                .media_watchers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for watcher in watchers {
            watcher.detach();
        }

        self.inner.listeners.clear();
        self.inner
            .conditions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        debug!("Conditions manager destroyed");
    }
}

impl Drop for ConditionsManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn state_listener(weak: Weak<Inner>) -> StateListener {
    Arc::new(move |change: &ConditionStateChange| {
        if let Some(inner) = weak.upgrade() {
            inner.evaluate(&change.old, &change.new);
        }
    })
}

/// Distinct media queries of all `screen` conditions in the trees
fn screen_queries(conditions: &[Condition]) -> BTreeSet<String> {
    let mut queries = BTreeSet::new();
    for condition in conditions {
        condition.walk(&mut |c| {
            if let Condition::Screen(screen) = c {
                queries.insert(screen.media_query.clone());
            }
        });
    }
    queries
}
