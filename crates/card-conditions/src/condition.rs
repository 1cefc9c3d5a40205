//! Condition types
//!
//! A condition tree is built from leaf predicates, each testing one fact of
//! the [`ConditionState`](card_core::ConditionState), and the `and`, `or`
//! and `not` combinators.

use card_core::{DisplayMode, KeyState};
use regex::Regex;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Condition definition
///
/// Tagged by the `condition` key. When the key is omitted the condition is a
/// `state` condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// Check entity state
    State(StateCondition),

    /// Check numeric value thresholds
    NumericState(NumericStateCondition),

    /// Check the current view
    View(ViewCondition),

    /// Check the selected camera
    Camera(CameraCondition),

    Fullscreen(FullscreenCondition),

    Expand(ExpandCondition),

    DisplayMode(DisplayModeCondition),

    /// Check whether any of the given cameras is triggered
    Triggered(TriggeredCondition),

    Interaction(InteractionCondition),

    Microphone(MicrophoneCondition),

    /// Check a keyboard key and its modifiers
    Key(KeyCondition),

    UserAgent(UserAgentCondition),

    MediaLoaded(MediaLoadedCondition),

    /// Check a live media query
    Screen(ScreenCondition),

    /// Evaluate a template
    Template(TemplateCondition),

    /// Check for configuration changes
    Config(ConfigCondition),

    /// Check the authenticated user
    User(UserCondition),

    /// All conditions must be true (AND)
    And(AndCondition),

    /// Any condition must be true (OR)
    Or(OrCondition),

    /// The conditions must not all be true (NOT)
    Not(NotCondition),
}

const CONDITION_TYPES: &[&str] = &[
    "state",
    "numeric_state",
    "view",
    "camera",
    "fullscreen",
    "expand",
    "display_mode",
    "triggered",
    "interaction",
    "microphone",
    "key",
    "user_agent",
    "media_loaded",
    "screen",
    "template",
    "config",
    "user",
    "and",
    "or",
    "not",
];

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        fn parse<T: DeserializeOwned, E: de::Error>(value: serde_json::Value) -> Result<T, E> {
            serde_json::from_value(value).map_err(E::custom)
        }

        let mut value = serde_json::Value::deserialize(deserializer)?;
        let map = value
            .as_object_mut()
            .ok_or_else(|| de::Error::custom("condition must be a mapping"))?;

        let kind = match map.remove("condition") {
            None => "state".to_string(),
            Some(serde_json::Value::String(kind)) => kind,
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "condition type must be a string, got {}",
                    other
                )))
            }
        };

        match kind.as_str() {
            "state" => parse(value).map(Condition::State),
            "numeric_state" => parse(value).map(Condition::NumericState),
            "view" => parse(value).map(Condition::View),
            "camera" => parse(value).map(Condition::Camera),
            "fullscreen" => parse(value).map(Condition::Fullscreen),
            "expand" => parse(value).map(Condition::Expand),
            "display_mode" => parse(value).map(Condition::DisplayMode),
            "triggered" => parse(value).map(Condition::Triggered),
            "interaction" => parse(value).map(Condition::Interaction),
            "microphone" => parse(value).map(Condition::Microphone),
            "key" => parse(value).map(Condition::Key),
            "user_agent" => parse(value).map(Condition::UserAgent),
            "media_loaded" => parse(value).map(Condition::MediaLoaded),
            "screen" => parse(value).map(Condition::Screen),
            "template" => parse(value).map(Condition::Template),
            "config" => parse(value).map(Condition::Config),
            "user" => parse(value).map(Condition::User),
            "and" => parse(value).map(Condition::And),
            "or" => parse(value).map(Condition::Or),
            "not" => parse(value).map(Condition::Not),
            other => Err(de::Error::unknown_variant(other, CONDITION_TYPES)),
        }
    }
}

impl Condition {
    /// Create an AND condition
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(AndCondition { conditions })
    }

    /// Create an OR condition
    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or(OrCondition { conditions })
    }

    /// Create a NOT condition
    pub fn not(conditions: Vec<Condition>) -> Self {
        Condition::Not(NotCondition { conditions })
    }

    /// Create a state condition matching any change of an entity
    pub fn state(entity: impl Into<String>) -> Self {
        Condition::State(StateCondition {
            entity: entity.into(),
            state: None,
            state_not: None,
        })
    }

    /// Create a camera condition
    pub fn camera<I, S>(cameras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::Camera(CameraCondition {
            cameras: Some(cameras.into_iter().map(Into::into).collect()),
        })
    }

    /// Create a view condition
    pub fn view<I, S>(views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::View(ViewCondition {
            views: Some(views.into_iter().map(Into::into).collect()),
        })
    }

    /// Create a fullscreen condition
    pub fn fullscreen(fullscreen: bool) -> Self {
        Condition::Fullscreen(FullscreenCondition { fullscreen })
    }

    /// Child conditions of a combinator, empty for leaves
    pub fn children(&self) -> &[Condition] {
        match self {
            Condition::And(c) => &c.conditions,
            Condition::Or(c) => &c.conditions,
            Condition::Not(c) => &c.conditions,
            _ => &[],
        }
    }

    /// Visit every condition in the tree, depth-first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Check whether this leaf reads entity state
    pub fn uses_entities(&self) -> bool {
        matches!(
            self,
            Condition::State(_)
                | Condition::NumericState(_)
                | Condition::Template(_)
                | Condition::User(_)
        )
    }
}

/// A state value or list of state values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateMatch {
    Single(String),
    List(Vec<String>),
}

impl StateMatch {
    /// Check if a state matches
    pub fn matches(&self, state: &str) -> bool {
        match self {
            StateMatch::Single(s) => s == state,
            StateMatch::List(list) => list.iter().any(|s| s == state),
        }
    }
}

impl From<&str> for StateMatch {
    fn from(state: &str) -> Self {
        StateMatch::Single(state.to_string())
    }
}

/// State condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCondition {
    /// Entity to check
    pub entity: String,

    /// Required state(s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateMatch>,

    /// Excluded state(s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_not: Option<StateMatch>,
}

/// Numeric state condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStateCondition {
    pub entity: String,

    /// Value must be strictly above this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,

    /// Value must be strictly below this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
}

/// View condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCondition {
    /// Allowed views; any view change matches when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<Vec<String>>,
}

/// Camera condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCondition {
    /// Allowed cameras; any camera change matches when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cameras: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullscreenCondition {
    pub fullscreen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandCondition {
    pub expand: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayModeCondition {
    pub display_mode: DisplayMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredCondition {
    /// Camera ids, any of which being triggered matches
    pub triggered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionCondition {
    pub interaction: bool,
}

/// Microphone condition; unspecified fields are not checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrophoneCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

/// Key condition; unspecified modifiers are not checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCondition {
    pub key: String,

    #[serde(default)]
    pub state: KeyState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctrl: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<bool>,
}

/// User agent condition; every specified check must pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAgentCondition {
    /// Exact user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Regular expression the user agent must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent_re: Option<UserAgentPattern>,

    /// Whether the user agent must (or must not) be a companion app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion: Option<bool>,
}

/// A compiled user agent regular expression
///
/// Invalid expressions are rejected when the condition is deserialized.
#[derive(Debug, Clone)]
pub struct UserAgentPattern(Regex);

impl UserAgentPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn is_match(&self, user_agent: &str) -> bool {
        self.0.is_match(user_agent)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for UserAgentPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for UserAgentPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserAgentPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        UserAgentPattern::new(&pattern).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLoadedCondition {
    pub media_loaded: bool,
}

/// Screen condition, matched against a live media query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenCondition {
    pub media_query: String,
}

/// Template condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCondition {
    /// Template that must render to `true`
    pub value_template: String,
}

/// Config condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigCondition {
    /// Paths to compare; any config change matches when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
}

/// User condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCondition {
    /// User ids allowed to match
    pub users: Vec<String>,
}

/// AND condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndCondition {
    pub conditions: Vec<Condition>,
}

/// OR condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrCondition {
    pub conditions: Vec<Condition>,
}

/// NOT condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotCondition {
    pub conditions: Vec<Condition>,
}
