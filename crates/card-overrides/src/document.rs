//! Path-based edits of a JSON configuration document
//!
//! Deleting an array element leaves a hole so later paths in the same pass
//! keep addressing the original positions. Holes are recorded and removed
//! afterwards by [`Document::desparsify`].

use card_core::path::{get_segments, parse_path, PathSegment};
use serde_json::{Map, Value};
use tracing::warn;

/// How far past the end of an array a `set` may address
///
/// Positions in between are filled with nulls. Paths that reach further are
/// skipped.
pub const MAX_ARRAY_GAP: usize = 1024;

/// A configuration document being edited
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
    holes: Vec<Vec<PathSegment>>,
}

impl Document {
    pub fn new(root: Value) -> Self {
        Self {
            root,
            holes: Vec::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        get_segments(&self.root, &parse_path(path))
    }

    /// Set the value at `path`, creating missing containers
    ///
    /// A missing container is an array when the segment addressing into it
    /// is an index, an object otherwise. An empty path replaces the root.
    pub fn set(&mut self, path: &str, value: Value) {
        let segments = parse_path(path);
        let Some((last, parents)) = segments.split_last() else {
            self.root = value;
            return;
        };

        let mut current = &mut self.root;
        for (i, segment) in parents.iter().enumerate() {
            let next_is_index = matches!(segments[i + 1], PathSegment::Index(_));
            match child_mut(current, segment, next_is_index) {
                Some(child) => current = child,
                None => {
                    warn!(path, "Cannot set path through a non-container or out of range value");
                    return;
                }
            }
        }

        match (current, last) {
            (Value::Array(items), PathSegment::Index(index)) => match slot_mut(items, *index) {
                Some(slot) => *slot = value,
                None => warn!(path, index, "Array index out of range, skipping"),
            },
            (Value::Object(map), segment) => {
                map.insert(segment.as_key(), value);
            }
            _ => warn!(path, "Cannot set path on a non-container value"),
        }
    }

    /// Remove the value at `path`; returns whether anything was removed
    pub fn unset(&mut self, path: &str) -> bool {
        let segments = parse_path(path);
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };

        let Some(parent) = get_segments_mut(&mut self.root, parents) else {
            return false;
        };

        match (parent, last) {
            (Value::Array(items), PathSegment::Index(index)) if *index < items.len() => {
                items[*index] = Value::Null;
                self.holes.push(segments);
                true
            }
            (Value::Object(map), segment) => map.shift_remove(&segment.as_key()).is_some(),
            _ => false,
        }
    }

    /// Deep-merge `value` into the value at `path`
    ///
    /// Objects merge recursively and arrays merge index-wise; anything else
    /// in `value` replaces the existing value.
    pub fn merge(&mut self, path: &str, value: Value) {
        let segments = parse_path(path);
        match get_segments_mut(&mut self.root, &segments) {
            Some(existing) => deep_merge(existing, value),
            None => self.set(path, value),
        }
    }

    /// Remove the holes left by deleted array elements
    ///
    /// Remaining elements keep their relative order. A hole that was written
    /// to after the deletion is kept.
    pub fn desparsify(&mut self) {
        let mut holes = std::mem::take(&mut self.holes);
        // Deepest paths first, then highest index first, so removals never
        // shift a position that is still to be removed
        holes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| b.cmp(a)));
        holes.dedup();

        for hole in holes {
            let Some((PathSegment::Index(index), parents)) = hole.split_last() else {
                continue;
            };
            if let Some(Value::Array(items)) = get_segments_mut(&mut self.root, parents) {
                if items.get(*index).is_some_and(Value::is_null) {
                    items.remove(*index);
                }
            }
        }
    }

    pub fn has_holes(&self) -> bool {
        !self.holes.is_empty()
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

fn child_mut<'a>(
    current: &'a mut Value,
    segment: &PathSegment,
    next_is_index: bool,
) -> Option<&'a mut Value> {
    let empty = move || {
        if next_is_index {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    };

    match (current, segment) {
        (Value::Array(items), PathSegment::Index(index)) => {
            let child = slot_mut(items, *index)?;
            if !child.is_object() && !child.is_array() {
                *child = empty();
            }
            Some(child)
        }
        (Value::Object(map), segment) => {
            let child = map.entry(segment.as_key()).or_insert_with(empty);
            if !child.is_object() && !child.is_array() {
                *child = empty();
            }
            Some(child)
        }
        _ => None,
    }
}

/// The element at `index`, growing the array with nulls when `index` is
/// within [`MAX_ARRAY_GAP`] of the end
fn slot_mut(items: &mut Vec<Value>, index: usize) -> Option<&mut Value> {
    if index >= items.len() {
        if index - items.len() > MAX_ARRAY_GAP {
            return None;
        }
        let len = index.checked_add(1)?;
        items.resize(len, Value::Null);
    }
    items.get_mut(index)
}

fn get_segments_mut<'a>(value: &'a mut Value, segments: &[PathSegment]) -> Option<&'a mut Value> {
    segments.iter().try_fold(value, |current, segment| match (current, segment) {
        (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
        (Value::Object(map), segment) => map.get_mut(&segment.as_key()),
        _ => None,
    })
}

fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for (index, value) in source.into_iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => deep_merge(existing, value),
                    None => target.push(value),
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_existing_and_nested() {
        let mut doc = Document::new(json!({"menu": {"style": "none"}}));
        doc.set("menu.style", json!("hidden"));
        doc.set("live.controls.thumbnails.mode", json!("left"));
        assert_eq!(
            doc.into_value(),
            json!({
                "menu": {"style": "hidden"},
                "live": {"controls": {"thumbnails": {"mode": "left"}}}
            })
        );
    }

    #[test]
    fn test_set_creates_arrays_for_indices() {
        let mut doc = Document::new(json!({}));
        doc.set("cameras[1].id", json!("b"));
        assert_eq!(doc.into_value(), json!({"cameras": [null, {"id": "b"}]}));
    }

    #[test]
    fn test_set_out_of_range_index_is_skipped() {
        let mut doc = Document::new(json!({"cameras": []}));
        doc.set("cameras.18446744073709551615", json!("x"));
        doc.set("cameras.10000000000", json!("x"));
        doc.set("cameras.10000000000.id", json!("x"));
        assert_eq!(doc.into_value(), json!({"cameras": []}));
    }

    #[test]
    fn test_set_within_gap_pads_with_nulls() {
        let mut doc = Document::new(json!({"cameras": ["a"]}));
        doc.set(&format!("cameras.{}", MAX_ARRAY_GAP + 1), json!("b"));
        let cameras = doc.get("cameras").unwrap().as_array().unwrap();
        assert_eq!(cameras.len(), MAX_ARRAY_GAP + 2);
        assert_eq!(cameras[MAX_ARRAY_GAP + 1], json!("b"));
        assert!(cameras[1].is_null());
    }

    #[test]
    fn test_set_replaces_scalar_parent() {
        let mut doc = Document::new(json!({"menu": "off"}));
        doc.set("menu.style", json!("hidden"));
        assert_eq!(doc.into_value(), json!({"menu": {"style": "hidden"}}));
    }

    #[test]
    fn test_unset_object_key() {
        let mut doc = Document::new(json!({"a": {"b": 1, "c": 2}}));
        assert!(doc.unset("a.b"));
        assert!(!doc.unset("a.missing"));
        assert!(!doc.has_holes());
        assert_eq!(doc.into_value(), json!({"a": {"c": 2}}));
    }

    #[test]
    fn test_unset_array_elements_keep_original_positions() {
        let mut doc = Document::new(json!({"cameras": ["a", "b", "c", "d"]}));
        assert!(doc.unset("cameras.1"));
        assert!(doc.unset("cameras[2]"));
        assert!(doc.has_holes());
        assert_eq!(doc.get("cameras.3"), Some(&json!("d")));

        doc.desparsify();
        assert_eq!(doc.into_value(), json!({"cameras": ["a", "d"]}));
    }

    #[test]
    fn test_desparsify_nested_holes() {
        let mut doc = Document::new(json!({"rows": [[1, 2, 3], [4, 5]]}));
        doc.unset("rows.0.1");
        doc.unset("rows.1");
        doc.desparsify();
        assert_eq!(doc.into_value(), json!({"rows": [[1, 3]]}));
    }

    #[test]
    fn test_desparsify_keeps_refilled_hole() {
        let mut doc = Document::new(json!({"cameras": ["a", "b"]}));
        doc.unset("cameras.0");
        doc.set("cameras.0", json!("z"));
        doc.desparsify();
        assert_eq!(doc.into_value(), json!({"cameras": ["z", "b"]}));
    }

    #[test]
    fn test_merge_objects_and_arrays() {
        let mut doc = Document::new(json!({
            "live": {"controls": {"builtin": true, "next": "thumbnails"}},
            "cameras": [{"id": "a", "icon": "x"}, {"id": "b"}]
        }));
        doc.merge("live.controls", json!({"next": "chevrons", "title": "popup"}));
        doc.merge("cameras", json!([{"icon": "y"}, {}, {"id": "c"}]));
        assert_eq!(
            doc.into_value(),
            json!({
                "live": {"controls": {"builtin": true, "next": "chevrons", "title": "popup"}},
                "cameras": [{"id": "a", "icon": "y"}, {"id": "b"}, {"id": "c"}]
            })
        );
    }

    #[test]
    fn test_merge_missing_path_sets() {
        let mut doc = Document::new(json!({}));
        doc.merge("view.default", json!({"camera": "a"}));
        assert_eq!(doc.into_value(), json!({"view": {"default": {"camera": "a"}}}));
    }
}
