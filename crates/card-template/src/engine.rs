//! Template engine for condition evaluation
//!
//! Renders Jinja2-compatible templates against an entity snapshot and the
//! current condition state.

use crate::error::TemplateResult;
use crate::filters;
use crate::states;
use card_core::{ConditionState, EntitySnapshot};
use minijinja::{Environment, Value};
use std::sync::Arc;
use tracing::debug;

/// Name under which the condition state is exposed to templates
pub const CONDITION_STATE_KEY: &str = "condition_state";

/// Renders a template into a JSON value
///
/// Implementations must be usable from any thread that evaluates
/// conditions.
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        entities: Option<&Arc<EntitySnapshot>>,
        template: &str,
        condition_state: &ConditionState,
    ) -> TemplateResult<serde_json::Value>;
}

/// minijinja-backed template engine
///
/// The engine provides:
/// - Access to entity states via the `states` object
/// - State functions like `is_state()`, `state_attr()`, `has_value()`
/// - The condition state as `condition_state`
/// - Filters like `float`, `int`, `regex_match`, `to_json`
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_debug(true);

        Self::register_filters(&mut env);
        Self::register_functions(&mut env);
        Self::register_tests(&mut env);

        Self { env }
    }

    fn register_filters(env: &mut Environment<'static>) {
        env.add_filter("float", filters::to_float);
        env.add_filter("int", filters::to_int);
        env.add_filter("bool", filters::to_bool);
        env.add_filter("regex_match", filters::regex_match);
        env.add_filter("regex_search", filters::regex_search);
        env.add_filter("to_json", filters::to_json);
        env.add_filter("from_json", filters::from_json);
        env.add_filter("contains", filters::contains);
    }

    fn register_functions(env: &mut Environment<'static>) {
        env.add_function("is_state", states::is_state_fn);
        env.add_function("state_attr", states::state_attr_fn);
        env.add_function("is_state_attr", states::is_state_attr_fn);
        env.add_function("has_value", states::has_value_fn);
    }

    fn register_tests(env: &mut Environment<'static>) {
        env.add_test("defined", filters::is_defined);
        env.add_test("number", filters::is_number);
        env.add_test("match", filters::regex_match);
        env.add_test("search", filters::regex_search);
        env.add_test("contains", filters::contains);
    }

    /// Render a template to its raw string output
    pub fn render_str(
        &self,
        entities: Option<&Arc<EntitySnapshot>>,
        template: &str,
        condition_state: &ConditionState,
    ) -> TemplateResult<String> {
        debug!("Rendering template: {}", template);

        let tmpl = self.env.template_from_str(template)?;
        let ctx = minijinja::context! {
            states => states::states_value(entities),
            condition_state => Value::from_serialize(condition_state),
        };
        Ok(tmpl.render(ctx)?)
    }

    /// Check if a string contains template syntax
    pub fn is_template(template: &str) -> bool {
        template.contains("{{") || template.contains("{%") || template.contains("{#")
    }
}

impl TemplateRenderer for TemplateEngine {
    /// Render and coerce the output to JSON
    ///
    /// Output that parses as JSON (`true`, `42`, `[1]`) is returned as that
    /// value, anything else as a string.
    fn render(
        &self,
        entities: Option<&Arc<EntitySnapshot>>,
        template: &str,
        condition_state: &ConditionState,
    ) -> TemplateResult<serde_json::Value> {
        let output = self.render_str(entities, template, condition_state)?;
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return Ok(serde_json::Value::String(String::new()));
        }
        Ok(serde_json::from_str(trimmed)
            .ok()
            .or_else(|| parse_python_literal(trimmed))
            .unwrap_or_else(|| serde_json::Value::String(trimmed.to_string())))
    }
}

/// Jinja renders booleans and none in Python form
fn parse_python_literal(output: &str) -> Option<serde_json::Value> {
    match output {
        "True" => Some(serde_json::Value::Bool(true)),
        "False" => Some(serde_json::Value::Bool(false)),
        "None" => Some(serde_json::Value::Null),
        _ => None,
    }
}
