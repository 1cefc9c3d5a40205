//! Automation definitions

use std::fmt;
use std::sync::Arc;

use card_conditions::{Condition, TriggerData};
use card_core::ConditionState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// An action to run, interpreted by the [`ActionExecutor`]
pub type Action = serde_json::Value;

/// Automation errors
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

/// Result type for automation operations
pub type AutomationResult<T> = Result<T, AutomationError>;

/// Identity token used to delete or replace a group of automations
///
/// Tags compare by identity: two tags minted separately are never equal,
/// whatever automations they label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AutomationTag(Ulid);

impl AutomationTag {
    /// Mint a fresh tag
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AutomationTag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AutomationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Automation configuration
///
/// `actions` run when the conditions become (or stay, with fresh trigger
/// data) true; `actions_not` run when they become false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_not: Option<Vec<Action>>,

    /// Owner-assigned tag, never part of the configuration
    #[serde(skip)]
    pub tag: Option<AutomationTag>,
}

impl Automation {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            actions: None,
            actions_not: None,
            tag: None,
        }
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_actions_not(mut self, actions: Vec<Action>) -> Self {
        self.actions_not = Some(actions);
        self
    }

    pub fn with_tag(mut self, tag: AutomationTag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Whether the automation has anything to run
    pub fn has_actions(&self) -> bool {
        self.actions.as_ref().is_some_and(|a| !a.is_empty())
            || self.actions_not.as_ref().is_some_and(|a| !a.is_empty())
    }
}

/// Context passed to the executor with each run
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// What changed to cause this run
    pub trigger_data: Option<TriggerData>,

    /// The condition state at the time of the run
    pub condition_state: Arc<ConditionState>,
}

/// Runs automation actions
///
/// Execution is synchronous. An executor may update the condition state;
/// such updates are applied after the running notification completes.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, actions: &[Action], context: &ActionContext) -> AutomationResult<()>;
}

impl<F> ActionExecutor for F
where
    F: Fn(&[Action], &ActionContext) -> AutomationResult<()> + Send + Sync,
{
    fn execute(&self, actions: &[Action], context: &ActionContext) -> AutomationResult<()> {
        self(actions, context)
    }
}
