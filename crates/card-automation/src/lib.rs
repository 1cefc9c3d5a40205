//! Condition-driven automations for the camera card
//!
//! An automation runs `actions` when its conditions evaluate true and
//! `actions_not` when they evaluate false. Actions are opaque to this crate
//! and handed to an [`ActionExecutor`] supplied by the host.
//!
//! ```text
//! ConditionStateManager ─► ConditionsManager ─► AutomationsManager ─► ActionExecutor
//! ```

pub mod automation;
pub mod manager;

pub use automation::{
    Action, ActionContext, ActionExecutor, Automation, AutomationError, AutomationResult,
    AutomationTag,
};
pub use manager::{AutomationsManager, MAX_NESTED_AUTOMATION_EXECUTIONS};
