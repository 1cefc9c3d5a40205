//! Jinja2-compatible template rendering for camera card conditions
//!
//! The condition engine treats template rendering as an external
//! collaborator behind the [`TemplateRenderer`] trait. This crate provides
//! that trait and a minijinja-based [`TemplateEngine`] implementing it.
//!
//! # State Access
//!
//! - `states('entity_id')` - Get entity state as string
//! - `states.light.living_room` - Access state object
//! - `is_state('entity_id', 'on')` - Check if entity is in state
//! - `state_attr('entity_id', 'brightness')` - Get attribute value
//! - `has_value('entity_id')` - Check if entity has valid value
//!
//! The full condition state is available as `condition_state`, e.g.
//! `{{ condition_state.camera == 'front_door' }}`.
//!
//! # Filters
//!
//! - `| float` / `| int` / `| bool` - Type conversion
//! - `| regex_match(pattern)` - Regex test
//! - `| to_json` - JSON serialization
//!
//! # Example
//!
//! ```ignore
//! use card_template::{TemplateEngine, TemplateRenderer};
//!
//! let engine = TemplateEngine::new();
//! let result = engine.render(
//!     state.entities.as_ref(),
//!     "{{ is_state('binary_sensor.door', 'on') }}",
//!     &state,
//! )?;
//! assert_eq!(result, serde_json::Value::Bool(true));
//! ```

mod engine;
mod error;
mod filters;
mod states;

pub use engine::{TemplateEngine, TemplateRenderer, CONDITION_STATE_KEY};
pub use error::{TemplateError, TemplateResult};
pub use states::{StateWrapper, StatesObject};
