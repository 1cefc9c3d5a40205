//! Core types for the camera card
//!
//! This crate provides the fundamental types shared by the condition engine
//! and its consumers: the [`ConditionState`] snapshot of world facts, the
//! [`ConditionStatePatch`] used to update it, and the entity types that
//! describe the home-automation state source.

mod condition_state;
mod entity;
pub mod path;

pub use condition_state::{
    ConditionState, ConditionStatePatch, DisplayMode, KeyState, KeyboardState, MicrophoneState,
};
pub use entity::{EntitySnapshot, EntityState, User};

/// Prefix of the user agent reported by the Home Assistant companion apps
pub const COMPANION_APP_USER_AGENT_PREFIX: &str = "Home Assistant/";

/// Check whether a user agent belongs to a companion app
pub fn is_companion_app(user_agent: &str) -> bool {
    user_agent.starts_with(COMPANION_APP_USER_AGENT_PREFIX)
}
