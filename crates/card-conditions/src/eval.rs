//! Condition evaluation logic
//!
//! Evaluates condition trees against an `{old, new}` pair of condition
//! states. Besides the boolean result, an evaluation reports which watched
//! facts changed between the two states as [`TriggerData`].

use std::sync::Arc;

use card_core::path::get_path;
use card_core::{is_companion_app, ConditionState};
use card_template::TemplateRenderer;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::condition::{
    CameraCondition, Condition, ConfigCondition, KeyCondition, MicrophoneCondition,
    NumericStateCondition, ScreenCondition, StateCondition, TemplateCondition,
    UserAgentCondition, ViewCondition,
};
use crate::media_query::MediaQueries;

/// A change of one value between the old and new state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<T>,
}

impl<T> Transition<T> {
    pub fn new(from: Option<T>, to: Option<T>) -> Self {
        Self { from, to }
    }
}

/// A change of one entity's state value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Changes detected while evaluating a tree, keyed by predicate family
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriggerData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateTransition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<Transition<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<Transition<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Transition<Arc<Value>>>,
}

impl TriggerData {
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.view.is_none()
            && self.camera.is_none()
            && self.config.is_none()
    }

    /// Merge another set of changes over this one; `other` wins per family
    pub fn merge(&mut self, other: TriggerData) {
        if other.state.is_some() {
            self.state = other.state;
        }
        if other.view.is_some() {
            self.view = other.view;
        }
        if other.camera.is_some() {
            self.camera = other.camera;
        }
        if other.config.is_some() {
            self.config = other.config;
        }
    }
}

/// Result of evaluating a condition tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConditionsEvaluation {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_data: Option<TriggerData>,
}

impl ConditionsEvaluation {
    /// A result without trigger data
    pub fn new(result: bool) -> Self {
        Self {
            result,
            trigger_data: None,
        }
    }

    /// A result with trigger data; empty data is dropped
    pub fn with_trigger_data(result: bool, trigger_data: TriggerData) -> Self {
        Self {
            result,
            trigger_data: (!trigger_data.is_empty()).then_some(trigger_data),
        }
    }

    /// A matching result carrying `trigger_data` only when `changed`
    fn matched_if(result: bool, changed: bool, trigger_data: impl FnOnce() -> TriggerData) -> Self {
        if result && changed {
            Self::with_trigger_data(true, trigger_data())
        } else {
            Self::new(result)
        }
    }
}

/// External collaborators available to evaluation
#[derive(Clone, Default)]
pub struct ConditionEnvironment {
    /// Renders `template` conditions; they never match without one
    pub template_renderer: Option<Arc<dyn TemplateRenderer>>,

    /// Evaluates `screen` conditions; they never match without one
    pub media_queries: Option<Arc<dyn MediaQueries>>,
}

impl std::fmt::Debug for ConditionEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionEnvironment")
            .field("template_renderer", &self.template_renderer.is_some())
            .field("media_queries", &self.media_queries.is_some())
            .finish()
    }
}

impl ConditionEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.template_renderer = Some(renderer);
        self
    }

    pub fn with_media_queries(mut self, media_queries: Arc<dyn MediaQueries>) -> Self {
        self.media_queries = Some(media_queries);
        self
    }
}

/// Condition evaluator
///
/// Evaluation is a pure walk of the tree: the only outside calls are to the
/// template renderer and media queries of its environment.
#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator {
    env: ConditionEnvironment,
}

impl ConditionEvaluator {
    pub fn new(env: ConditionEnvironment) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &ConditionEnvironment {
        &self.env
    }

    /// Evaluate a condition
    pub fn evaluate(
        &self,
        condition: &Condition,
        old: &ConditionState,
        new: &ConditionState,
    ) -> ConditionsEvaluation {
        match condition {
            Condition::And(c) => self.evaluate_all(&c.conditions, old, new),
            Condition::Or(c) => self.eval_or(&c.conditions, old, new),
            Condition::Not(c) => {
                ConditionsEvaluation::new(!self.evaluate_all(&c.conditions, old, new).result)
            }
            Condition::State(c) => eval_state(c, old, new),
            Condition::NumericState(c) => ConditionsEvaluation::new(eval_numeric_state(c, new)),
            Condition::View(c) => eval_view(c, old, new),
            Condition::Camera(c) => eval_camera(c, old, new),
            Condition::Fullscreen(c) => {
                ConditionsEvaluation::new(new.fullscreen == Some(c.fullscreen))
            }
            Condition::Expand(c) => ConditionsEvaluation::new(new.expand == Some(c.expand)),
            Condition::DisplayMode(c) => {
                ConditionsEvaluation::new(new.display_mode == Some(c.display_mode))
            }
            Condition::Triggered(c) => {
                let triggered = new.triggered.as_ref().is_some_and(|triggered| {
                    c.triggered.iter().any(|camera| triggered.contains(camera))
                });
                ConditionsEvaluation::new(triggered)
            }
            Condition::Interaction(c) => {
                ConditionsEvaluation::new(new.interaction == Some(c.interaction))
            }
            Condition::Microphone(c) => ConditionsEvaluation::new(eval_microphone(c, new)),
            Condition::Key(c) => ConditionsEvaluation::new(eval_key(c, new)),
            Condition::UserAgent(c) => ConditionsEvaluation::new(eval_user_agent(c, new)),
            Condition::MediaLoaded(c) => {
                ConditionsEvaluation::new(new.media_loaded.unwrap_or(false) == c.media_loaded)
            }
            Condition::Screen(c) => ConditionsEvaluation::new(self.eval_screen(c)),
            Condition::Template(c) => ConditionsEvaluation::new(self.eval_template(c, new)),
            Condition::Config(c) => eval_config(c, old, new),
            Condition::User(c) => ConditionsEvaluation::new(
                new.user_id()
                    .is_some_and(|id| c.users.iter().any(|user| user == id)),
            ),
        }
    }

    /// Evaluate conditions as an implicit AND
    ///
    /// Stops at the first failing condition, dropping any trigger data seen
    /// so far. On success the trigger data of all conditions is merged in
    /// order. An empty list is true.
    pub fn evaluate_all(
        &self,
        conditions: &[Condition],
        old: &ConditionState,
        new: &ConditionState,
    ) -> ConditionsEvaluation {
        let mut trigger_data = TriggerData::default();

        for condition in conditions {
            let evaluation = self.evaluate(condition, old, new);
            if !evaluation.result {
                return ConditionsEvaluation::new(false);
            }
            if let Some(data) = evaluation.trigger_data {
                trigger_data.merge(data);
            }
        }

        ConditionsEvaluation::with_trigger_data(true, trigger_data)
    }

    /// The first matching condition's evaluation, unmerged
    fn eval_or(
        &self,
        conditions: &[Condition],
        old: &ConditionState,
        new: &ConditionState,
    ) -> ConditionsEvaluation {
        conditions
            .iter()
            .map(|condition| self.evaluate(condition, old, new))
            .find(|evaluation| evaluation.result)
            .unwrap_or_default()
    }

    fn eval_screen(&self, condition: &ScreenCondition) -> bool {
        self.env
            .media_queries
            .as_ref()
            .is_some_and(|queries| queries.matches(&condition.media_query))
    }

    fn eval_template(&self, condition: &TemplateCondition, new: &ConditionState) -> bool {
        let Some(renderer) = &self.env.template_renderer else {
            debug!(
                template = %condition.value_template,
                "No template renderer, template condition does not match"
            );
            return false;
        };

        match renderer.render(new.entities.as_ref(), &condition.value_template, new) {
            Ok(value) => {
                trace!(template = %condition.value_template, ?value, "Template rendered");
                value == Value::Bool(true)
            }
            Err(e) => {
                warn!(
                    template = %condition.value_template,
                    error = %e,
                    "Template condition failed to render"
                );
                false
            }
        }
    }
}

// --- Individual condition evaluators ---

fn eval_state(
    condition: &StateCondition,
    old: &ConditionState,
    new: &ConditionState,
) -> ConditionsEvaluation {
    let from = old.entity_state(&condition.entity);
    let to = new.entity_state(&condition.entity);

    let result = if condition.state.is_none() && condition.state_not.is_none() {
        from != to
    } else {
        to.is_some_and(|to| {
            condition.state.as_ref().map_or(true, |s| s.matches(to))
                && !condition.state_not.as_ref().is_some_and(|s| s.matches(to))
        })
    };

    trace!(entity = %condition.entity, ?from, ?to, result, "State check result");

    ConditionsEvaluation::matched_if(result, from != to, || TriggerData {
        state: Some(StateTransition {
            entity: condition.entity.clone(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        }),
        ..Default::default()
    })
}

fn eval_numeric_state(condition: &NumericStateCondition, new: &ConditionState) -> bool {
    let Some(state) = new.entity_state(&condition.entity) else {
        return false;
    };
    // Non-numeric states parse to NaN, which fails both bounds
    let value = state.trim().parse::<f64>().unwrap_or(f64::NAN);

    if let Some(above) = condition.above {
        if value.is_nan() || value <= above {
            trace!(entity = %condition.entity, value, above, "Failed above check");
            return false;
        }
    }
    if let Some(below) = condition.below {
        if value.is_nan() || value >= below {
            trace!(entity = %condition.entity, value, below, "Failed below check");
            return false;
        }
    }
    true
}

fn eval_selection(
    allowed: Option<&[String]>,
    old: Option<&String>,
    new: Option<&String>,
) -> (bool, bool) {
    let changed = old != new;
    let result = match allowed {
        Some(allowed) => new.is_some_and(|current| allowed.contains(current)),
        None => changed,
    };
    (result, changed)
}

fn eval_view(
    condition: &ViewCondition,
    old: &ConditionState,
    new: &ConditionState,
) -> ConditionsEvaluation {
    let (result, changed) =
        eval_selection(condition.views.as_deref(), old.view.as_ref(), new.view.as_ref());
    ConditionsEvaluation::matched_if(result, changed, || TriggerData {
        view: Some(Transition::new(old.view.clone(), new.view.clone())),
        ..Default::default()
    })
}

fn eval_camera(
    condition: &CameraCondition,
    old: &ConditionState,
    new: &ConditionState,
) -> ConditionsEvaluation {
    let (result, changed) = eval_selection(
        condition.cameras.as_deref(),
        old.camera.as_ref(),
        new.camera.as_ref(),
    );
    ConditionsEvaluation::matched_if(result, changed, || TriggerData {
        camera: Some(Transition::new(old.camera.clone(), new.camera.clone())),
        ..Default::default()
    })
}

fn eval_microphone(condition: &MicrophoneCondition, new: &ConditionState) -> bool {
    let microphone = new.microphone.unwrap_or_default();
    condition
        .connected
        .map_or(true, |c| microphone.connected.unwrap_or(false) == c)
        && condition
            .muted
            .map_or(true, |m| microphone.muted.unwrap_or(false) == m)
}

fn eval_key(condition: &KeyCondition, new: &ConditionState) -> bool {
    let Some(key) = new.keys.as_ref().and_then(|keys| keys.get(&condition.key)) else {
        return false;
    };

    key.state == condition.state
        && condition.ctrl.map_or(true, |ctrl| key.ctrl == ctrl)
        && condition.alt.map_or(true, |alt| key.alt == alt)
        && condition.meta.map_or(true, |meta| key.meta == meta)
        && condition.shift.map_or(true, |shift| key.shift == shift)
}

fn eval_user_agent(condition: &UserAgentCondition, new: &ConditionState) -> bool {
    let user_agent = new.user_agent.as_deref();

    condition
        .user_agent
        .as_deref()
        .map_or(true, |expected| user_agent == Some(expected))
        && condition
            .user_agent_re
            .as_ref()
            .map_or(true, |re| user_agent.is_some_and(|ua| re.is_match(ua)))
        && condition
            .companion
            .map_or(true, |companion| {
                user_agent.is_some_and(is_companion_app) == companion
            })
}

fn eval_config(
    condition: &ConfigCondition,
    old: &ConditionState,
    new: &ConditionState,
) -> ConditionsEvaluation {
    let replaced = match (&old.config, &new.config) {
        (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
        (None, None) => false,
        _ => true,
    };

    let result = replaced
        && condition.paths.as_ref().map_or(true, |paths| {
            paths.iter().any(|path| {
                let from = old.config.as_deref().and_then(|c| get_path(c, path));
                let to = new.config.as_deref().and_then(|c| get_path(c, path));
                from != to
            })
        });

    ConditionsEvaluation::matched_if(result, true, || TriggerData {
        config: Some(Transition::new(old.config.clone(), new.config.clone())),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_core::{ConditionStatePatch, EntitySnapshot, KeyState, KeyboardState};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn state(patch: ConditionStatePatch) -> ConditionState {
        ConditionState::default().merged(&patch).0
    }

    fn with_entity(entity: &str, value: &str) -> ConditionState {
        let entities = EntitySnapshot::new().with_state(entity, value);
        state(ConditionStatePatch::new().entities(entities))
    }

    fn with_user(user_id: &str) -> ConditionState {
        state(ConditionStatePatch::new().entities(EntitySnapshot::new().with_user(user_id)))
    }

    fn parse(value: Value) -> Condition {
        serde_json::from_value(value).unwrap()
    }

    fn evaluate(
        condition: &Condition,
        old: &ConditionState,
        new: &ConditionState,
    ) -> ConditionsEvaluation {
        ConditionEvaluator::default().evaluate(condition, old, new)
    }

    fn matches(condition: Value, old: &ConditionState, new: &ConditionState) -> bool {
        evaluate(&parse(condition), old, new).result
    }

    // ==================== State ====================

    #[test]
    fn test_state_without_values_matches_on_change() {
        let condition = Condition::state("light.porch");
        let off = with_entity("light.porch", "off");
        let on = with_entity("light.porch", "on");

        let evaluation = evaluate(&condition, &off, &on);
        assert!(evaluation.result);
        assert_eq!(
            evaluation.trigger_data.unwrap().state,
            Some(StateTransition {
                entity: "light.porch".into(),
                from: Some("off".into()),
                to: Some("on".into()),
            })
        );

        assert!(!evaluate(&condition, &on, &on).result);
    }

    #[test]
    fn test_state_match_and_exclude() {
        let condition = parse(json!({
            "entity": "alarm.home",
            "state": ["armed_away", "armed_home"],
            "state_not": "armed_home"
        }));

        let away = with_entity("alarm.home", "armed_away");
        let home = with_entity("alarm.home", "armed_home");
        let empty = ConditionState::default();

        let evaluation = evaluate(&condition, &away, &away);
        assert!(evaluation.result);
        assert!(evaluation.trigger_data.is_none());

        assert!(!evaluate(&condition, &away, &home).result);
        assert!(!evaluate(&condition, &away, &empty).result);
    }

    #[test]
    fn test_state_trigger_data_only_when_matching() {
        let condition = parse(json!({"entity": "light.porch", "state": "on"}));
        let off = with_entity("light.porch", "off");
        let on = with_entity("light.porch", "on");

        let evaluation = evaluate(&condition, &on, &off);
        assert_eq!(evaluation, ConditionsEvaluation::new(false));
    }

    // ==================== Numeric State ====================

    #[test]
    fn test_numeric_state_bounds_are_strict() {
        let condition = parse(json!({
            "condition": "numeric_state",
            "entity": "sensor.temperature",
            "above": 20,
            "below": 25
        }));

        let empty = ConditionState::default();
        let temperature = |value: &str| with_entity("sensor.temperature", value);

        assert!(evaluate(&condition, &empty, &temperature("23.5")).result);
        assert!(!evaluate(&condition, &empty, &temperature("20")).result);
        assert!(!evaluate(&condition, &empty, &temperature("25")).result);
        assert!(!evaluate(&condition, &empty, &temperature("warm")).result);
        assert!(!evaluate(&condition, &empty, &empty).result);
    }

    // ==================== View / Camera ====================

    #[test]
    fn test_view_in_set() {
        let condition = Condition::view(["live", "clips"]);
        let live = state(ConditionStatePatch::new().view("live"));
        let image = state(ConditionStatePatch::new().view("image"));

        let evaluation = evaluate(&condition, &image, &live);
        assert!(evaluation.result);
        assert_eq!(
            evaluation.trigger_data.unwrap().view,
            Some(Transition::new(Some("image".into()), Some("live".into())))
        );

        let evaluation = evaluate(&condition, &live, &live);
        assert!(evaluation.result);
        assert!(evaluation.trigger_data.is_none());

        assert!(!evaluate(&condition, &live, &image).result);
    }

    #[test]
    fn test_camera_without_set_matches_any_change() {
        let condition = parse(json!({"condition": "camera"}));
        let a = state(ConditionStatePatch::new().camera("camera.a"));
        let b = state(ConditionStatePatch::new().camera("camera.b"));

        let evaluation = evaluate(&condition, &a, &b);
        assert!(evaluation.result);
        assert_eq!(
            evaluation.trigger_data.unwrap().camera,
            Some(Transition::new(
                Some("camera.a".into()),
                Some("camera.b".into())
            ))
        );

        let evaluation = evaluate(&condition, &b, &b);
        assert!(!evaluation.result);
        assert!(evaluation.trigger_data.is_none());
    }

    // ==================== Simple equality ====================

    #[test]
    fn test_equality_leaves() {
        let new = state(
            ConditionStatePatch::new()
                .fullscreen(true)
                .expand(false)
                .interaction(true)
                .display_mode(card_core::DisplayMode::Grid),
        );
        let old = ConditionState::default();

        assert!(evaluate(&Condition::fullscreen(true), &old, &new).result);
        assert!(!evaluate(&Condition::fullscreen(false), &old, &new).result);
        assert!(matches(json!({"condition": "expand", "expand": false}), &old, &new));
        assert!(matches(
            json!({"condition": "interaction", "interaction": true}),
            &old,
            &new
        ));
        assert!(matches(
            json!({"condition": "display_mode", "display_mode": "grid"}),
            &old,
            &new
        ));

        // Unset is not equal to false
        assert!(!evaluate(&Condition::fullscreen(false), &old, &old).result);
    }

    #[test]
    fn test_media_loaded_absent_is_false() {
        let condition = parse(json!({"condition": "media_loaded", "media_loaded": false}));
        let empty = ConditionState::default();
        let loaded = state(ConditionStatePatch::new().media_loaded(true));

        assert!(evaluate(&condition, &empty, &empty).result);
        assert!(!evaluate(&condition, &empty, &loaded).result);
    }

    #[test]
    fn test_triggered() {
        let condition = parse(json!({
            "condition": "triggered",
            "triggered": ["camera.a", "camera.b"]
        }));
        let new = state(ConditionStatePatch::new().triggered(["camera.b"]));
        assert!(evaluate(&condition, &ConditionState::default(), &new).result);

        let other = state(ConditionStatePatch::new().triggered(["camera.c"]));
        assert!(!evaluate(&condition, &ConditionState::default(), &other).result);
    }

    #[test]
    fn test_microphone_unspecified_fields_ignored() {
        let new = state(ConditionStatePatch::new().microphone(card_core::MicrophoneState {
            connected: Some(true),
            muted: Some(false),
        }));
        let old = ConditionState::default();

        assert!(matches(json!({"condition": "microphone"}), &old, &new));
        assert!(matches(json!({"condition": "microphone", "connected": true}), &old, &new));
        assert!(!matches(json!({"condition": "microphone", "muted": true}), &old, &new));
    }

    #[test]
    fn test_key_with_modifiers() {
        let keys = BTreeMap::from([(
            "f".to_string(),
            KeyboardState {
                state: KeyState::Down,
                ctrl: true,
                ..Default::default()
            },
        )]);
        let new = state(ConditionStatePatch::new().keys(keys));
        let old = ConditionState::default();

        assert!(matches(json!({"condition": "key", "key": "f"}), &old, &new));
        assert!(matches(json!({"condition": "key", "key": "f", "ctrl": true}), &old, &new));
        assert!(!matches(json!({"condition": "key", "key": "f", "alt": true}), &old, &new));
        assert!(!matches(json!({"condition": "key", "key": "f", "state": "up"}), &old, &new));
        assert!(!matches(json!({"condition": "key", "key": "g"}), &old, &new));
    }

    #[test]
    fn test_user_agent_checks() {
        let companion = state(ConditionStatePatch::new().user_agent("Home Assistant/2024.1 (iOS)"));
        let browser = state(ConditionStatePatch::new().user_agent("Mozilla/5.0 Chrome/120"));
        let old = ConditionState::default();

        let is_companion = parse(json!({"condition": "user_agent", "companion": true}));
        assert!(evaluate(&is_companion, &old, &companion).result);
        assert!(!evaluate(&is_companion, &old, &browser).result);

        let chrome = parse(json!({
            "condition": "user_agent",
            "user_agent_re": "Chrome/\\d+",
            "companion": false
        }));
        assert!(evaluate(&chrome, &old, &browser).result);
        assert!(!evaluate(&chrome, &old, &companion).result);

        let exact = parse(json!({
            "condition": "user_agent",
            "user_agent": "Mozilla/5.0 Chrome/120"
        }));
        assert!(evaluate(&exact, &old, &browser).result);
        assert!(!evaluate(&exact, &old, &old).result);
    }

    #[test]
    fn test_user() {
        let condition = parse(json!({"condition": "user", "users": ["alice", "bob"]}));
        let alice = with_user("alice");
        let carol = with_user("carol");

        assert!(evaluate(&condition, &alice, &alice).result);
        assert!(!evaluate(&condition, &alice, &carol).result);
        assert!(!evaluate(&condition, &alice, &ConditionState::default()).result);
    }

    // ==================== Config ====================

    #[test]
    fn test_config_requires_identity_change() {
        let config = Arc::new(json!({"menu": {"style": "hidden"}}));
        let first = state(ConditionStatePatch::new().config(config.clone()));
        let same = state(ConditionStatePatch::new().config(config));
        let condition = parse(json!({"condition": "config"}));

        assert!(!evaluate(&condition, &first, &same).result);

        let rebuilt = json!({"menu": {"style": "hidden"}});
        let replaced = state(ConditionStatePatch::new().config(rebuilt));
        let evaluation = evaluate(&condition, &first, &replaced);
        assert!(evaluation.result);
        let data = evaluation.trigger_data.unwrap().config.unwrap();
        assert_eq!(data.from.as_deref(), Some(&json!({"menu": {"style": "hidden"}})));
    }

    #[test]
    fn test_config_paths() {
        let condition = parse(json!({
            "condition": "config",
            "paths": ["menu.style", "cameras[0].id"]
        }));
        let first = state(ConditionStatePatch::new().config(json!({
            "menu": {"style": "hidden"},
            "cameras": [{"id": "a"}],
            "other": 1
        })));
        let other_changed = state(ConditionStatePatch::new().config(json!({
            "menu": {"style": "hidden"},
            "cameras": [{"id": "a"}],
            "other": 2
        })));
        let camera_changed = state(ConditionStatePatch::new().config(json!({
            "menu": {"style": "hidden"},
            "cameras": [{"id": "b"}],
            "other": 1
        })));

        assert!(!evaluate(&condition, &first, &other_changed).result);
        assert!(evaluate(&condition, &first, &camera_changed).result);
    }

    // ==================== Combinators ====================

    #[test]
    fn test_and_merges_trigger_data() {
        let condition = Condition::and(vec![
            parse(json!({"condition": "camera"})),
            parse(json!({"condition": "view"})),
        ]);
        let old = state(ConditionStatePatch::new().camera("a").view("live"));
        let new = state(ConditionStatePatch::new().camera("b").view("clips"));

        let data = evaluate(&condition, &old, &new).trigger_data.unwrap();
        assert!(data.camera.is_some());
        assert!(data.view.is_some());
    }

    #[test]
    fn test_and_later_children_overwrite() {
        let condition = Condition::and(vec![
            Condition::state("light.a"),
            Condition::state("light.b"),
        ]);
        let old = state(ConditionStatePatch::new().entities(
            EntitySnapshot::new().with_state("light.a", "off").with_state("light.b", "off"),
        ));
        let new = state(ConditionStatePatch::new().entities(
            EntitySnapshot::new().with_state("light.a", "on").with_state("light.b", "on"),
        ));

        let data = evaluate(&condition, &old, &new).trigger_data.unwrap();
        assert_eq!(data.state.unwrap().entity, "light.b");
    }

    #[test]
    fn test_and_short_circuits_without_trigger_data() {
        let condition = Condition::and(vec![
            parse(json!({"condition": "camera"})),
            Condition::fullscreen(true),
        ]);
        let old = state(ConditionStatePatch::new().camera("a"));
        let new = state(ConditionStatePatch::new().camera("b"));

        assert_eq!(evaluate(&condition, &old, &new), ConditionsEvaluation::new(false));
    }

    #[test]
    fn test_or_returns_first_match_unmerged() {
        let condition = Condition::or(vec![
            Condition::fullscreen(true),
            parse(json!({"condition": "camera"})),
            parse(json!({"condition": "view"})),
        ]);
        let old = state(ConditionStatePatch::new().camera("a").view("live"));
        let new = state(ConditionStatePatch::new().camera("b").view("clips"));

        let data = evaluate(&condition, &old, &new).trigger_data.unwrap();
        assert!(data.camera.is_some());
        assert!(data.view.is_none());

        let none = Condition::or(vec![Condition::fullscreen(true)]);
        assert_eq!(evaluate(&none, &old, &new), ConditionsEvaluation::new(false));
    }

    #[test]
    fn test_not_negates_and_drops_trigger_data() {
        let condition = Condition::not(vec![
            Condition::fullscreen(true),
            parse(json!({"condition": "camera"})),
        ]);
        let old = state(ConditionStatePatch::new().camera("a").fullscreen(true));
        let new = state(ConditionStatePatch::new().camera("b").fullscreen(true));

        assert_eq!(evaluate(&condition, &old, &new), ConditionsEvaluation::new(false));
        assert_eq!(evaluate(&condition, &new, &new), ConditionsEvaluation::new(true));
    }

    #[test]
    fn test_empty_list_is_true() {
        let evaluator = ConditionEvaluator::default();
        let empty = ConditionState::default();
        assert_eq!(
            evaluator.evaluate_all(&[], &empty, &empty),
            ConditionsEvaluation::new(true)
        );
    }

    // ==================== Collaborators ====================

    #[test]
    fn test_screen_without_media_queries_is_false() {
        let condition = parse(json!({"condition": "screen", "media_query": "(min-width: 600px)"}));
        let empty = ConditionState::default();
        assert!(!evaluate(&condition, &empty, &empty).result);
    }

    #[test]
    fn test_template_without_renderer_is_false() {
        let condition = parse(json!({"condition": "template", "value_template": "{{ true }}"}));
        let empty = ConditionState::default();
        assert!(!evaluate(&condition, &empty, &empty).result);
    }

    #[test]
    fn test_trigger_data_serialization() {
        let data = TriggerData {
            camera: Some(Transition::new(None, Some("camera.b".to_string()))),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({"camera": {"to": "camera.b"}})
        );
    }
}
