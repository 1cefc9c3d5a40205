//! The OverridesManager
//!
//! Holds the installed override specifications, each paired with a
//! [`ConditionsManager`] over its conditions, and computes the effective
//! configuration from a base document.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use card_conditions::{ConditionEnvironment, ConditionsEvaluation, ConditionsManager};
use card_state::ConditionStateSource;
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::document::Document;
use crate::error::{OverrideConfigError, OverrideResult};
use crate::spec::OverrideSpec;
use crate::validator::ConfigValidator;

/// Callback invoked when any override's evaluation changes
pub type OverridesListener = Arc<dyn Fn() + Send + Sync>;

struct InstalledOverride {
    spec: OverrideSpec,
    conditions: ConditionsManager,
}

/// Applies conditional overrides to a configuration
pub struct OverridesManager {
    validator: Arc<dyn ConfigValidator>,
    on_change: Option<OverridesListener>,
    env: ConditionEnvironment,
    overrides: RwLock<Vec<InstalledOverride>>,
}

impl std::fmt::Debug for OverridesManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverridesManager")
            .field("overrides", &self.installed().len())
            .finish_non_exhaustive()
    }
}

impl OverridesManager {
    /// Create a manager with no overrides installed
    ///
    /// `on_change` fires whenever any installed override's evaluation is
    /// published, which is when the effective configuration may change.
    pub fn new(validator: Arc<dyn ConfigValidator>, on_change: Option<OverridesListener>) -> Self {
        Self {
            validator,
            on_change,
            env: ConditionEnvironment::default(),
            overrides: RwLock::new(Vec::new()),
        }
    }

    /// Collaborators for template and screen conditions of later `set` calls
    pub fn with_environment(mut self, env: ConditionEnvironment) -> Self {
        self.env = env;
        self
    }

    /// Replace all installed overrides
    ///
    /// Previously installed overrides are destroyed and one conditions
    /// manager is created per spec.
    pub fn set(
        &self,
        state_source: Option<Arc<dyn ConditionStateSource>>,
        specs: Vec<OverrideSpec>,
    ) {
        let installed: Vec<InstalledOverride> = specs
            .into_iter()
            .map(|spec| {
                let conditions = ConditionsManager::new(
                    spec.conditions.clone(),
                    state_source.clone(),
                    self.env.clone(),
                );
                if let Some(on_change) = &self.on_change {
                    let on_change = Arc::clone(on_change);
                    conditions.add_listener(Arc::new(move |_: &ConditionsEvaluation| on_change()));
                }
                InstalledOverride { spec, conditions }
            })
            .collect();

        info!(count = installed.len(), "Installing overrides");

        let previous = std::mem::replace(
            &mut *self.overrides.write().unwrap_or_else(PoisonError::into_inner),
            installed,
        );
        for old in previous {
            old.conditions.destroy();
        }
    }

    /// Whether any override is installed
    pub fn has_overrides(&self) -> bool {
        !self.installed().is_empty()
    }

    /// Compute the effective configuration
    ///
    /// Returns `base` itself when no override is active. Otherwise applies
    /// each active override in order and validates the result.
    pub fn get_config(&self, base: &Arc<Value>) -> OverrideResult<Arc<Value>> {
        let installed = self.installed();

        let mut doc: Option<Document> = None;
        for (index, entry) in installed.iter().enumerate() {
            if !entry.conditions.get_evaluation().result {
                continue;
            }
            trace!(index, "Applying override");

            let target = doc.get_or_insert_with(|| Document::new(Value::clone(base)));
            apply(target, &entry.spec);
        }
        drop(installed);

        let Some(mut doc) = doc else {
            return Ok(Arc::clone(base));
        };

        if doc.has_holes() {
            doc.desparsify();
        }

        let config = doc.into_value();
        match self.validator.validate(&config) {
            Ok(validated) => {
                debug!("Overridden configuration is valid");
                Ok(Arc::new(validated))
            }
            Err(errors) => Err(OverrideConfigError { errors, config }),
        }
    }

    /// Destroy all installed overrides
    pub fn destroy(&self) {
        let previous =
            std::mem::take(&mut *self.overrides.write().unwrap_or_else(PoisonError::into_inner));
        for old in previous {
            old.conditions.destroy();
        }
    }

    fn installed(&self) -> RwLockReadGuard<'_, Vec<InstalledOverride>> {
        self.overrides.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply(doc: &mut Document, spec: &OverrideSpec) {
    for path in spec.delete.iter().flatten() {
        doc.unset(path);
    }
    for (path, value) in spec.set.iter().flatten() {
        doc.set(path, value.clone());
    }
    for (path, value) in spec.merge.iter().flatten() {
        doc.merge(path, value.clone());
    }
}
