//! Condition evaluation engine for the camera card
//!
//! Conditions are declarative predicates over the
//! [`ConditionState`](card_core::ConditionState) snapshot. This crate
//! provides:
//!
//! - [`Condition`] - The condition tree, deserializable from JSON or YAML
//! - [`ConditionEvaluator`] - Pure evaluation of a tree against an
//!   `{old, new}` state pair
//! - [`ConditionsManager`] - Live evaluation of a list of trees, subscribed
//!   to a [`ConditionStateSource`](card_state::ConditionStateSource) and to
//!   media queries
//!
//! # Evaluation
//!
//! ```text
//! set_state ─► ConditionStateManager ─► {old, new} ─► ConditionsManager ─► listeners
//!                                                        ▲
//!                              media query change ───────┘
//! ```
//!
//! An evaluation carries the boolean result and, when the transition changed
//! a watched fact of a matching condition, [`TriggerData`] describing the
//! change. Listeners fire when the result flips or trigger data is present.

pub mod condition;
pub mod eval;
pub mod manager;
pub mod media_query;

pub use condition::{Condition, StateMatch, UserAgentPattern};
pub use eval::{
    ConditionEnvironment, ConditionEvaluator, ConditionsEvaluation, StateTransition, Transition,
    TriggerData,
};
pub use manager::{ConditionsManager, EvaluationListener};
pub use media_query::{MediaQueries, MediaQueryCallback, MediaQueryWatcher, StaticMediaQueries};
