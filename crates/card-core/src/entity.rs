//! Entity state types
//!
//! The home-automation model is an external state source. The engine only
//! sees a snapshot of entity states plus the authenticated user.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of a single entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    /// The state value (e.g., "on", "off", "23.5", "unavailable")
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even if the value didn't change
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    /// Create a new state with current timestamp
    pub fn new(
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
        }
    }

    /// Create an updated state, preserving last_changed if state value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let state_changed = self.state != new_state;

        Self {
            state: new_state,
            attributes: new_attributes,
            last_changed: if state_changed {
                now
            } else {
                self.last_changed
            },
            last_updated: now,
        }
    }

    /// Check if the state value represents an unavailable entity
    pub fn is_unavailable(&self) -> bool {
        self.state == "unavailable"
    }

    /// Check if the state value represents an unknown state
    pub fn is_unknown(&self) -> bool {
        self.state == "unknown"
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for EntityState {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps are not compared
        self.state == other.state && self.attributes == other.attributes
    }
}

/// The authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
}

/// All entity states known to the card plus the authenticated user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity states keyed by entity_id
    #[serde(default)]
    pub states: HashMap<String, EntityState>,

    /// The user the card is rendered for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl EntitySnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the full state of an entity
    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.states.get(entity_id)
    }

    /// Get the state value of an entity
    pub fn state_of(&self, entity_id: &str) -> Option<&str> {
        self.states.get(entity_id).map(|s| s.state.as_str())
    }

    /// Return a copy of this snapshot with one entity set
    ///
    /// `last_changed` is preserved when the value is unchanged.
    pub fn with_state(&self, entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let mut next = self.clone();
        let updated = match self.states.get(&entity_id) {
            Some(existing) => existing.with_update(state, existing.attributes.clone()),
            None => EntityState::new(state, HashMap::new()),
        };
        next.states.insert(entity_id, updated);
        next
    }

    /// Return a copy of this snapshot with the authenticated user set
    pub fn with_user(&self, user_id: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.user = Some(User { id: user_id.into() });
        next
    }

    /// Get the id of the authenticated user
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}
