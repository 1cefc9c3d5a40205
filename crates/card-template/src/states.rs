//! States object for accessing entity states in templates
//!
//! Provides the `states` object that allows templates to access the entity
//! snapshot a condition is evaluated against.

use card_core::{EntitySnapshot, EntityState};
use minijinja::value::{Object, ObjectRepr, Value};
use minijinja::{Error, ErrorKind, State};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the states object in the render context
pub(crate) const STATES_KEY: &str = "states";

/// The states object exposed to templates
///
/// Allows access to entity states via:
/// - `states('entity_id')` - Get state value as string
/// - `states.entity_id` - Get full state object
/// - `states.domain` - Get domain proxy for `states.domain.entity`
#[derive(Clone)]
pub struct StatesObject {
    entities: Arc<EntitySnapshot>,
}

impl std::fmt::Debug for StatesObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatesObject")
            .field("entities", &self.entities.states.len())
            .finish_non_exhaustive()
    }
}

impl StatesObject {
    pub fn new(entities: Arc<EntitySnapshot>) -> Self {
        Self { entities }
    }

    /// Get the state value as a string
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.entities.state_of(entity_id).map(str::to_string)
    }

    /// Check if entity is in a specific state
    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.entities.state_of(entity_id) == Some(state)
    }

    /// Check if entity is in any of the specified states
    pub fn is_state_any(&self, entity_id: &str, states: &[&str]) -> bool {
        match self.entities.state_of(entity_id) {
            Some(current) => states.iter().any(|s| *s == current),
            None => false,
        }
    }

    /// Get an attribute value
    pub fn state_attr(&self, entity_id: &str, attribute: &str) -> Value {
        self.entities
            .get(entity_id)
            .and_then(|s| s.attributes.get(attribute))
            .map(Value::from_serialize)
            .unwrap_or(Value::UNDEFINED)
    }

    /// Check if entity has a meaningful value (not unknown/unavailable)
    pub fn has_value(&self, entity_id: &str) -> bool {
        self.entities
            .get(entity_id)
            .is_some_and(|s| !s.is_unavailable() && !s.is_unknown())
    }

    /// Get all entity states for a domain, sorted by entity_id
    fn domain_states(&self, domain: &str) -> Vec<(String, EntityState)> {
        let prefix = format!("{}.", domain);
        let mut states: Vec<(String, EntityState)> = self
            .entities
            .states
            .iter()
            .filter(|(id, _)| id.starts_with(&prefix))
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    fn wrap(&self, entity_id: &str) -> Option<Value> {
        self.entities
            .get(entity_id)
            .map(|s| state_to_value(entity_id.to_string(), s.clone()))
    }
}

impl Object for StatesObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;

        if key.contains('.') {
            return self.wrap(key);
        }

        Some(Value::from_object(DomainProxy {
            domain: key.to_string(),
            states: Arc::clone(self),
        }))
    }

    fn call(self: &Arc<Self>, _state: &State, args: &[Value]) -> Result<Value, Error> {
        // states('entity_id') -> returns state string
        let entity_id = args.first().and_then(|v| v.as_str()).ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "states() requires entity_id")
        })?;

        Ok(self
            .get_state(entity_id)
            .map(Value::from)
            .unwrap_or(Value::UNDEFINED))
    }
}

/// Proxy for accessing entities by domain
///
/// Allows `states.light.living_room` syntax
#[derive(Debug, Clone)]
struct DomainProxy {
    domain: String,
    states: Arc<StatesObject>,
}

impl Object for DomainProxy {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let object_id = key.as_str()?;
        self.states.wrap(&format!("{}.{}", self.domain, object_id))
    }

    fn call(self: &Arc<Self>, _state: &State, _args: &[Value]) -> Result<Value, Error> {
        let entities: Vec<Value> = self
            .states
            .domain_states(&self.domain)
            .into_iter()
            .map(|(id, s)| state_to_value(id, s))
            .collect();

        Ok(Value::from(entities))
    }
}

fn state_to_value(entity_id: String, state: EntityState) -> Value {
    Value::from_object(StateWrapper { entity_id, state })
}

/// Wrapper for an entity state exposed to templates
#[derive(Debug, Clone)]
pub struct StateWrapper {
    pub entity_id: String,
    pub state: EntityState,
}

impl std::fmt::Display for StateWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.state.state)
    }
}

impl Object for StateWrapper {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;
        let (domain, object_id) = self
            .entity_id
            .split_once('.')
            .unwrap_or(("", self.entity_id.as_str()));

        match key {
            "state" => Some(Value::from(self.state.state.as_str())),
            "entity_id" => Some(Value::from(self.entity_id.as_str())),
            "domain" => Some(Value::from(domain)),
            "object_id" => Some(Value::from(object_id)),
            "name" => self
                .state
                .attributes
                .get("friendly_name")
                .and_then(|v| v.as_str().map(Value::from))
                .or_else(|| Some(Value::from(object_id))),
            "last_changed" => Some(Value::from(self.state.last_changed.to_rfc3339())),
            "last_updated" => Some(Value::from(self.state.last_updated.to_rfc3339())),
            "attributes" => {
                let attrs: BTreeMap<String, Value> = self
                    .state
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_serialize(v)))
                    .collect();
                Some(Value::from_object(attrs))
            }
            _ => self.state.attributes.get(key).map(Value::from_serialize),
        }
    }
}

/// Look up the states object of the template being rendered
fn states_of(state: &State) -> Option<Value> {
    state.lookup(STATES_KEY)
}

/// Function wrapper for is_state
pub(crate) fn is_state_fn(state: &State, entity_id: &str, expected: Value) -> bool {
    let Some(value) = states_of(state) else {
        return false;
    };
    let Some(states) = value.downcast_object_ref::<StatesObject>() else {
        return false;
    };

    // Strings are iterable in minijinja, so check them first
    if let Some(s) = expected.as_str() {
        states.is_state(entity_id, s)
    } else if let Ok(iter) = expected.try_iter() {
        let wanted: Vec<String> = iter
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();
        let refs: Vec<&str> = wanted.iter().map(|s| s.as_str()).collect();
        states.is_state_any(entity_id, &refs)
    } else {
        false
    }
}

/// Function wrapper for state_attr
pub(crate) fn state_attr_fn(state: &State, entity_id: &str, attribute: &str) -> Value {
    states_of(state)
        .and_then(|v| {
            v.downcast_object_ref::<StatesObject>()
                .map(|s| s.state_attr(entity_id, attribute))
        })
        .unwrap_or(Value::UNDEFINED)
}

/// Function wrapper for is_state_attr
pub(crate) fn is_state_attr_fn(
    state: &State,
    entity_id: &str,
    attribute: &str,
    expected: Value,
) -> bool {
    let actual = state_attr_fn(state, entity_id, attribute);
    !actual.is_undefined() && actual == expected
}

/// Function wrapper for has_value
pub(crate) fn has_value_fn(state: &State, entity_id: &str) -> bool {
    states_of(state)
        .and_then(|v| {
            v.downcast_object_ref::<StatesObject>()
                .map(|s| s.has_value(entity_id))
        })
        .unwrap_or(false)
}

/// Build a states object from an optional snapshot
pub(crate) fn states_value(entities: Option<&Arc<EntitySnapshot>>) -> Value {
    let entities = entities.cloned().unwrap_or_default();
    Value::from_object(StatesObject::new(entities))
}
