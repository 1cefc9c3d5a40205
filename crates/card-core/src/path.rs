//! Paths into JSON configuration documents
//!
//! A path is a dotted list of keys with numeric array indices, written either
//! as `a.b.0.c` or `a.b[0].c`.

use std::fmt;

use serde_json::Value;

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// The segment as an object key
    ///
    /// Index segments address objects by their decimal form, so `a.0`
    /// reaches both `{"a": ["x"]}` and `{"a": {"0": "x"}}`.
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(index) => index.to_string(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

fn segment(raw: &str) -> PathSegment {
    match raw.parse::<usize>() {
        Ok(index) if !raw.starts_with('+') => PathSegment::Index(index),
        _ => PathSegment::Key(raw.to_string()),
    }
}

/// Split a path into segments
///
/// Empty segments are skipped, so `a..b` and `a.b` are the same path.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();

    for part in path.split('.') {
        let mut rest = part;
        while !rest.is_empty() {
            match rest.find('[') {
                Some(0) => {
                    let Some(end) = rest.find(']') else {
                        segments.push(segment(&rest[1..]));
                        break;
                    };
                    let inner = rest[1..end].trim_matches(|c| c == '"' || c == '\'');
                    if !inner.is_empty() {
                        segments.push(segment(inner));
                    }
                    rest = &rest[end + 1..];
                }
                Some(start) => {
                    segments.push(segment(&rest[..start]));
                    rest = &rest[start..];
                }
                None => {
                    segments.push(segment(rest));
                    break;
                }
            }
        }
    }

    segments
}

/// Resolve a path, returning `None` if any step is missing
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    get_segments(value, &parse_path(path))
}

/// Resolve pre-parsed segments
pub fn get_segments<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments.iter().try_fold(value, |current, segment| match (current, segment) {
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        (Value::Object(map), segment) => map.get(&segment.as_key()),
        _ => None,
    })
}
