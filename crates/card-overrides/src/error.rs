//! Error types for configuration overrides

use serde::Serialize;
use thiserror::Error;

/// Result type for override operations
pub type OverrideResult<T> = Result<T, OverrideConfigError>;

/// A single problem found while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// JSON pointer to the offending value, empty for the root
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// The overridden configuration failed validation
///
/// Carries every validation issue and the invalid document so the host can
/// show the user what the overrides produced.
#[derive(Debug, Error)]
#[error("invalid override configuration: {}", join_issues(.errors))]
pub struct OverrideConfigError {
    pub errors: Vec<ValidationIssue>,
    pub config: serde_json::Value,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors building a validator
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid configuration schema: {message}")]
    InvalidSchema { message: String },
}
