//! Conditional configuration overrides for the camera card
//!
//! An override is a set of path-based edits (`delete`, `set`, `merge`)
//! applied to the base configuration while its conditions hold. The
//! [`OverridesManager`] keeps one
//! [`ConditionsManager`](card_conditions::ConditionsManager) per override
//! and computes the effective configuration on demand.
//!
//! ```ignore
//! let overrides = OverridesManager::new(validator, Some(on_change));
//! overrides.set(Some(state_manager.clone()), specs);
//!
//! // The same Arc comes back while no override is active
//! let config = overrides.get_config(&base)?;
//! ```

mod document;
mod error;
mod manager;
mod spec;
mod validator;

pub use document::Document;
pub use error::{OverrideConfigError, OverrideResult, SchemaError, ValidationIssue};
pub use manager::{OverridesListener, OverridesManager};
pub use spec::OverrideSpec;
pub use validator::{ConfigValidator, JsonSchemaValidator};
