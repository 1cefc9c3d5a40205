//! Filters and tests registered on the template environment

use minijinja::value::Value;
use minijinja::{Error, ErrorKind};
use regex::Regex;

fn value_to_f64(value: &Value) -> Option<f64> {
    f64::try_from(value.clone())
        .ok()
        .or_else(|| value.as_i64().map(|i| i as f64))
}

fn parse_f64(value: &Value) -> Option<f64> {
    value_to_f64(value).or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn invalid_regex(err: regex::Error) -> Error {
    Error::new(ErrorKind::InvalidOperation, format!("invalid regex: {}", err))
}

/// Check whether a regex pattern matches at the start of a string
pub fn regex_match(value: &str, pattern: &str) -> Result<bool, Error> {
    let re = Regex::new(&format!("^(?:{})", pattern)).map_err(invalid_regex)?;
    Ok(re.is_match(value))
}

/// Check whether a regex pattern matches anywhere in a string
pub fn regex_search(value: &str, pattern: &str) -> Result<bool, Error> {
    let re = Regex::new(pattern).map_err(invalid_regex)?;
    Ok(re.is_match(value))
}

/// Convert to float, falling back to `default` or 0.0
pub fn to_float(value: Value, default: Option<Value>) -> Value {
    match parse_f64(&value) {
        Some(f) => Value::from(f),
        None => Value::from(default.as_ref().and_then(value_to_f64).unwrap_or(0.0)),
    }
}

/// Convert to integer, truncating floats, falling back to `default` or 0
pub fn to_int(value: Value, default: Option<Value>) -> Value {
    let parsed = value.as_i64().or_else(|| {
        value
            .as_str()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .or_else(|| parse_f64(&value).map(|f| f as i64))
    });

    match parsed {
        Some(i) => Value::from(i),
        None => Value::from(
            default
                .as_ref()
                .and_then(|d| d.as_i64().or_else(|| value_to_f64(d).map(|f| f as i64)))
                .unwrap_or(0),
        ),
    }
}

/// Convert to boolean using the usual truthy strings
pub fn to_bool(value: Value, default: Option<bool>) -> bool {
    if value.is_undefined() || value.is_none() {
        return default.unwrap_or(false);
    }
    if let Ok(b) = bool::try_from(value.clone()) {
        return b;
    }
    if let Some(s) = value.as_str() {
        return matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "on" | "1" | "enable" | "enabled"
        );
    }
    value_to_f64(&value).map_or(default.unwrap_or(false), |f| f != 0.0)
}

/// Serialize a value to a JSON string
pub fn to_json(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("JSON error: {}", e)))
}

/// Parse a JSON string into a value
pub fn from_json(value: &str) -> Result<Value, Error> {
    let json: serde_json::Value = serde_json::from_str(value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("invalid JSON: {}", e)))?;
    Ok(Value::from_serialize(&json))
}

/// Test if a value is a number or numeric string
pub fn is_number(value: Value) -> bool {
    parse_f64(&value).is_some_and(f64::is_finite)
}

/// Test if a string, list or map contains a value
pub fn contains(value: Value, search: Value) -> bool {
    if let (Some(haystack), Some(needle)) = (value.as_str(), search.as_str()) {
        return haystack.contains(needle);
    }
    value
        .try_iter()
        .map(|mut iter| iter.any(|v| v == search))
        .unwrap_or(false)
}

/// Test if value is defined
pub fn is_defined(value: Value) -> bool {
    !value.is_undefined()
}
