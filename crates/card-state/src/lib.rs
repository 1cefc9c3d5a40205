//! ConditionState distribution for the camera card
//!
//! This crate provides the [`ConditionStateManager`], which owns the current
//! [`ConditionState`](card_core::ConditionState) snapshot, merges partial
//! updates over it and notifies subscribers with `{old, new}` pairs. It holds
//! no evaluation logic.
//!
//! Readers that must not mutate the state depend on the
//! [`ConditionStateSource`] trait instead of the manager itself.

mod listeners;
mod manager;

pub use listeners::ListenerSet;
pub use manager::{
    ConditionStateChange, ConditionStateManager, ConditionStateSource, StateListener,
    MAX_CHAINED_UPDATES,
};
