//! Dotted-path traversal over JSON attribute maps.

use serde_json::{Map, Value};

/// Resolve `path` (`"a.b.0.c"`) against `root`. An empty path is the root.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolve `path` inside an attribute map.
pub fn get_in<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let (head, rest) = split_head(path);
    let first = map.get(head)?;
    match rest {
        Some(rest) => get_path(first, rest),
        None => Some(first),
    }
}

/// Write `value` at `path`, creating (or replacing non-object) intermediates.
///
/// Returns the previous value, if any.
pub fn set_in(map: &mut Map<String, Value>, path: &str, value: Value) -> Option<Value> {
    let (head, rest) = split_head(path);
    match rest {
        None => map.insert(head.to_string(), value),
        Some(rest) => {
            let slot = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            match slot {
                Value::Object(child) => set_in(child, rest, value),
                _ => None,
            }
        }
    }
}

/// Remove the value at `path`, returning it.
pub fn remove_in(map: &mut Map<String, Value>, path: &str) -> Option<Value> {
    let (head, rest) = split_head(path);
    match rest {
        None => map.remove(head),
        Some(rest) => match map.get_mut(head) {
            Some(Value::Object(child)) => remove_in(child, rest),
            _ => None,
        },
    }
}

/// Shallow merge: top-level keys of `patch` overwrite those of `target`.
pub fn merge(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Template/condition truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Plain-text rendering of a value (strings without quotes).
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}
