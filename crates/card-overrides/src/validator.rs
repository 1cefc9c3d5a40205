//! Configuration validation
//!
//! Overridden configurations are re-validated before use. Any
//! `Fn(&Value) -> Result<Value, Vec<ValidationIssue>>` is a validator; the
//! returned value may normalize the input (e.g. fill defaults).

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::{SchemaError, ValidationIssue};

/// Validates a full configuration document
pub trait ConfigValidator: Send + Sync {
    fn validate(&self, config: &Value) -> Result<Value, Vec<ValidationIssue>>;
}

impl<F> ConfigValidator for F
where
    F: Fn(&Value) -> Result<Value, Vec<ValidationIssue>> + Send + Sync,
{
    fn validate(&self, config: &Value) -> Result<Value, Vec<ValidationIssue>> {
        self(config)
    }
}

/// Validator backed by a JSON Schema
pub struct JsonSchemaValidator {
    schema: JSONSchema,
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator").finish_non_exhaustive()
    }
}

impl JsonSchemaValidator {
    /// Compile a schema
    pub fn new(schema: &Value) -> Result<Self, SchemaError> {
        let schema = JSONSchema::compile(schema).map_err(|e| SchemaError::InvalidSchema {
            message: e.to_string(),
        })?;
        Ok(Self { schema })
    }
}

impl ConfigValidator for JsonSchemaValidator {
    fn validate(&self, config: &Value) -> Result<Value, Vec<ValidationIssue>> {
        match self.schema.validate(config) {
            Ok(()) => Ok(config.clone()),
            Err(errors) => Err(errors
                .map(|e| ValidationIssue::new(e.instance_path.to_string(), e.to_string()))
                .collect()),
        }
    }
}
