//! The ConditionState snapshot
//!
//! A `ConditionState` holds every world fact a condition can reference. Each
//! field is populated independently by whichever subsystem owns that fact.
//! Snapshots are immutable once published; updates are expressed as a
//! [`ConditionStatePatch`] merged over the previous snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::EntitySnapshot;

/// How many cameras are shown at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Single,
    Grid,
}

/// Whether a key is currently held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Up,
    #[default]
    Down,
}

/// State of a single keyboard key and the modifiers held with it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyboardState {
    pub state: KeyState,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
}

/// Microphone state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MicrophoneState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

/// Snapshot of all world facts available to condition evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionState {
    /// Entity states and the authenticated user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Arc<EntitySnapshot>>,

    /// Current logical view name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    /// Currently selected camera
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullscreen: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<DisplayMode>,

    /// Cameras currently in an alerting state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered: Option<BTreeSet<String>>,

    /// Whether the user is actively interacting with the card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub microphone: Option<MicrophoneState>,

    /// Keyboard state keyed by key name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeMap<String, KeyboardState>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Whether media is currently loaded (absent means not loaded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_loaded: Option<bool>,

    /// The currently effective configuration document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Arc<serde_json::Value>>,

    /// Whether the host completed its first render
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialized: Option<bool>,
}

impl ConditionState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a patch over this state, shallow per top-level key
    ///
    /// Returns the merged state and whether any key actually changed. Shared
    /// documents (`entities`, `config`) are compared by identity only: a new
    /// `Arc` counts as a change even when its content is equal.
    pub fn merged(&self, patch: &ConditionStatePatch) -> (ConditionState, bool) {
        let mut next = self.clone();
        let mut changed = false;

        merge_shared(&mut next.entities, &patch.entities, &mut changed);
        merge_value(&mut next.view, &patch.view, &mut changed);
        merge_value(&mut next.camera, &patch.camera, &mut changed);
        merge_value(&mut next.fullscreen, &patch.fullscreen, &mut changed);
        merge_value(&mut next.expand, &patch.expand, &mut changed);
        merge_value(&mut next.display_mode, &patch.display_mode, &mut changed);
        merge_value(&mut next.triggered, &patch.triggered, &mut changed);
        merge_value(&mut next.interaction, &patch.interaction, &mut changed);
        merge_value(&mut next.microphone, &patch.microphone, &mut changed);
        merge_value(&mut next.keys, &patch.keys, &mut changed);
        merge_value(&mut next.user_agent, &patch.user_agent, &mut changed);
        merge_value(&mut next.media_loaded, &patch.media_loaded, &mut changed);
        merge_shared(&mut next.config, &patch.config, &mut changed);
        merge_value(&mut next.initialized, &patch.initialized, &mut changed);

        (next, changed)
    }

    /// Get the state value of an entity
    pub fn entity_state(&self, entity_id: &str) -> Option<&str> {
        self.entities.as_ref()?.state_of(entity_id)
    }

    /// Get the id of the authenticated user
    pub fn user_id(&self) -> Option<&str> {
        self.entities.as_ref()?.user_id()
    }
}

fn merge_value<T: PartialEq + Clone>(
    current: &mut Option<T>,
    patch: &Option<T>,
    changed: &mut bool,
) {
    if let Some(value) = patch {
        if current.as_ref() != Some(value) {
            *current = Some(value.clone());
            *changed = true;
        }
    }
}

fn merge_shared<T>(current: &mut Option<Arc<T>>, patch: &Option<Arc<T>>, changed: &mut bool) {
    if let Some(value) = patch {
        let same = current.as_ref().is_some_and(|c| Arc::ptr_eq(c, value));
        if !same {
            *current = Some(Arc::clone(value));
            *changed = true;
        }
    }
}

/// A partial update to a [`ConditionState`]
///
/// `Some` fields replace the corresponding key of the current snapshot;
/// `None` fields leave it untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionStatePatch {
    pub entities: Option<Arc<EntitySnapshot>>,
    pub view: Option<String>,
    pub camera: Option<String>,
    pub fullscreen: Option<bool>,
    pub expand: Option<bool>,
    pub display_mode: Option<DisplayMode>,
    pub triggered: Option<BTreeSet<String>>,
    pub interaction: Option<bool>,
    pub microphone: Option<MicrophoneState>,
    pub keys: Option<BTreeMap<String, KeyboardState>>,
    pub user_agent: Option<String>,
    pub media_loaded: Option<bool>,
    pub config: Option<Arc<serde_json::Value>>,
    pub initialized: Option<bool>,
}

impl ConditionStatePatch {
    /// Create an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the patch sets no key at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn entities(mut self, entities: impl Into<Arc<EntitySnapshot>>) -> Self {
        self.entities = Some(entities.into());
        self
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = Some(camera.into());
        self
    }

    pub fn fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = Some(fullscreen);
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = Some(expand);
        self
    }

    pub fn display_mode(mut self, display_mode: DisplayMode) -> Self {
        self.display_mode = Some(display_mode);
        self
    }

    pub fn triggered<I, S>(mut self, cameras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggered = Some(cameras.into_iter().map(Into::into).collect());
        self
    }

    pub fn interaction(mut self, interaction: bool) -> Self {
        self.interaction = Some(interaction);
        self
    }

    pub fn microphone(mut self, microphone: MicrophoneState) -> Self {
        self.microphone = Some(microphone);
        self
    }

    pub fn keys(mut self, keys: BTreeMap<String, KeyboardState>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn media_loaded(mut self, media_loaded: bool) -> Self {
        self.media_loaded = Some(media_loaded);
        self
    }

    pub fn config(mut self, config: impl Into<Arc<serde_json::Value>>) -> Self {
        self.config = Some(config.into());
        self
    }

    pub fn initialized(mut self, initialized: bool) -> Self {
        self.initialized = Some(initialized);
        self
    }
}
