//! Automation management
//!
//! The AutomationsManager owns one conditions manager per automation and
//! dispatches its actions whenever the evaluation is published.

use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use card_conditions::{ConditionEnvironment, ConditionsEvaluation, ConditionsManager};
use card_state::ConditionStateSource;
use indexmap::IndexMap;
use tracing::{debug, error, info, trace};
use ulid::Ulid;

use crate::automation::{Action, ActionContext, ActionExecutor, Automation, AutomationTag};

/// Maximum depth of automation runs started from within other runs
pub const MAX_NESTED_AUTOMATION_EXECUTIONS: usize = 10;

thread_local! {
    static EXECUTION_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks one level of nested execution on the current thread
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Option<Self> {
        EXECUTION_DEPTH.with(|depth| {
            if depth.get() >= MAX_NESTED_AUTOMATION_EXECUTIONS {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        EXECUTION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

struct RegisteredAutomation {
    tag: Option<AutomationTag>,
    conditions: ConditionsManager,
}

/// Manages automations and runs their actions
pub struct AutomationsManager {
    executor: Arc<dyn ActionExecutor>,
    state_source: Option<Arc<dyn ConditionStateSource>>,
    env: ConditionEnvironment,
    automations: Mutex<IndexMap<Ulid, RegisteredAutomation>>,
}

impl std::fmt::Debug for AutomationsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationsManager")
            .field("automations", &self.len())
            .finish_non_exhaustive()
    }
}

impl AutomationsManager {
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        state_source: Option<Arc<dyn ConditionStateSource>>,
        env: ConditionEnvironment,
    ) -> Self {
        Self {
            executor,
            state_source,
            env,
            automations: Mutex::new(IndexMap::new()),
        }
    }

    /// Add automations
    ///
    /// Each automation starts watching its conditions immediately; actions
    /// only run on later changes.
    pub fn add_automations(&self, automations: Vec<Automation>) {
        let registered: Vec<(Ulid, RegisteredAutomation)> = automations
            .into_iter()
            .map(|automation| (Ulid::new(), self.register(automation)))
            .collect();

        let count = registered.len();
        self.lock().extend(registered);
        info!(count, "Added automations");
    }

    /// Delete every automation carrying `tag`; returns how many were removed
    pub fn delete_automations(&self, tag: &AutomationTag) -> usize {
        let removed: Vec<RegisteredAutomation> = {
            let mut automations = self.lock();
            let ids: Vec<Ulid> = automations
                .iter()
                .filter(|(_, a)| a.tag.as_ref() == Some(tag))
                .map(|(id, _)| *id)
                .collect();
            ids.iter()
                .filter_map(|id| automations.shift_remove(id))
                .collect()
        };

        for automation in &removed {
            automation.conditions.destroy();
        }
        info!(%tag, count = removed.len(), "Deleted automations");
        removed.len()
    }

    /// Replace the automations carrying `tag`
    ///
    /// Untagged replacements are given `tag`.
    pub fn replace_automations(&self, tag: &AutomationTag, automations: Vec<Automation>) {
        self.delete_automations(tag);
        self.add_automations(
            automations
                .into_iter()
                .map(|a| match a.tag {
                    Some(_) => a,
                    None => a.with_tag(*tag),
                })
                .collect(),
        );
    }

    /// Number of registered automations
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove all automations
    pub fn destroy(&self) {
        let removed = std::mem::take(&mut *self.lock());
        for (_, automation) in &removed {
            automation.conditions.destroy();
        }
        debug!(count = removed.len(), "Automations manager destroyed");
    }

    fn register(&self, automation: Automation) -> RegisteredAutomation {
        if !automation.has_actions() {
            debug!("Automation has no actions");
        }

        let conditions = ConditionsManager::new(
            automation.conditions,
            self.state_source.clone(),
            self.env.clone(),
        );

        let dispatch = Dispatch {
            executor: Arc::clone(&self.executor),
            state_source: self.state_source.clone(),
            actions: automation.actions.unwrap_or_default().into(),
            actions_not: automation.actions_not.unwrap_or_default().into(),
        };
        conditions.add_listener(Arc::new(move |evaluation: &ConditionsEvaluation| {
            dispatch.run(evaluation)
        }));

        RegisteredAutomation {
            tag: automation.tag,
            conditions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<Ulid, RegisteredAutomation>> {
        self.automations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AutomationsManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// What an automation runs, captured by its evaluation listener
struct Dispatch {
    executor: Arc<dyn ActionExecutor>,
    state_source: Option<Arc<dyn ConditionStateSource>>,
    actions: Arc<[Action]>,
    actions_not: Arc<[Action]>,
}

impl Dispatch {
    fn run(&self, evaluation: &ConditionsEvaluation) {
        let actions = if evaluation.result {
            &self.actions
        } else {
            &self.actions_not
        };
        if actions.is_empty() {
            return;
        }

        let Some(_depth) = DepthGuard::enter() else {
            error!(
                max = MAX_NESTED_AUTOMATION_EXECUTIONS,
                "Too many nested automation executions, skipping actions"
            );
            return;
        };

        let context = ActionContext {
            trigger_data: evaluation.trigger_data.clone(),
            condition_state: self
                .state_source
                .as_ref()
                .map(|source| source.get_state())
                .unwrap_or_default(),
        };

        trace!(
            result = evaluation.result,
            count = actions.len(),
            "Executing automation actions"
        );
        if let Err(e) = self.executor.execute(actions, &context) {
            error!(error = %e, "Automation actions failed");
        }
    }
}
