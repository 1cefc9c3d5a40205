//! Override specifications

use card_conditions::Condition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A set of configuration edits applied while its conditions hold
///
/// Edits are keyed by path (`a.b.0.c` or `a.b[0].c`) and applied in the
/// order written: deletions first, then sets, then merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideSpec {
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<IndexMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<IndexMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Vec<String>>,
}

impl OverrideSpec {
    /// A spec with conditions and no edits
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            set: None,
            merge: None,
            delete: None,
        }
    }

    pub fn with_set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.set.get_or_insert_with(IndexMap::new).insert(path.into(), value);
        self
    }

    pub fn with_merge(mut self, path: impl Into<String>, value: Value) -> Self {
        self.merge
            .get_or_insert_with(IndexMap::new)
            .insert(path.into(), value);
        self
    }

    pub fn with_delete(mut self, path: impl Into<String>) -> Self {
        self.delete.get_or_insert_with(Vec::new).push(path.into());
        self
    }
}
