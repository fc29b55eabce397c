//! Diff: the minimal patch turning `src` into `dst`.

use crate::merge::merge;
use crate::value::{Map, Value, directive};
use tracing::trace;

/// Compute a patch `P` such that `merge(src, P) == dst`.
///
/// - Maps: changed keys are diffed recursively, unchanged keys are omitted,
///   new keys are copied and removed keys become `"$delete"`.
/// - Lists: new elements are appended and removed map elements become
///   `{$delete: element}`. When that cannot reproduce `dst` exactly (reordered
///   elements, removed scalars, patterns deleting too much) the patch is
///   `dst` followed by a `{$replace: true}` marker.
/// - Anything else: `dst`.
pub fn diff(src: &Value, dst: &Value) -> Value {
    match (src, dst) {
        (Value::Map(a), Value::Map(b)) => Value::Map(diff_maps(a, b)),
        (Value::List(a), Value::List(b)) => diff_lists(a, b),
        _ => dst.clone(),
    }
}

/// Diff two documents. A map patch is tagged `$match: {}` so that it merges
/// into the document it was computed against.
pub fn diff_document(src: &Value, dst: &Value) -> Value {
    match diff(src, dst) {
        Value::Map(mut map) => {
            map.insert(directive::MATCH.to_string(), Value::map());
            Value::Map(map)
        }
        other => other,
    }
}

fn diff_maps(a: &Map, b: &Map) -> Map {
    let mut patch = Map::new();
    for (key, new) in b {
        match a.get(key) {
            Some(old) if old == new => {}
            Some(old) => {
                patch.insert(key.clone(), diff(old, new));
            }
            None => {
                patch.insert(key.clone(), new.clone());
            }
        }
    }
    for key in a.keys() {
        if !b.contains_key(key) {
            patch.insert(key.clone(), Value::from(directive::DELETE));
        }
    }
    patch
}

fn diff_lists(a: &[Value], b: &[Value]) -> Value {
    let removed: Vec<&Value> = a.iter().filter(|item| !b.contains(item)).collect();
    let added: Vec<&Value> = b.iter().filter(|item| !a.contains(item)).collect();

    if removed.iter().all(|item| matches!(item, Value::Map(_))) {
        let mut candidate: Vec<Value> = removed
            .iter()
            .map(|item| {
                let mut delete = Map::new();
                delete.insert(directive::DELETE.to_string(), (*item).clone());
                Value::Map(delete)
            })
            .collect();
        candidate.extend(added.into_iter().cloned());

        let reproduced = merge(Value::List(a.to_vec()), Value::List(candidate.clone()), "");
        if matches!(&reproduced, Ok(Value::List(items)) if items.as_slice() == b) {
            return Value::List(candidate);
        }
    }

    trace!(src = a.len(), dst = b.len(), "list diff falls back to replace");
    let mut replace = b.to_vec();
    let mut marker = Map::new();
    marker.insert(directive::REPLACE.to_string(), Value::Bool(true));
    replace.push(Value::Map(marker));
    Value::List(replace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    fn yaml(s: &str) -> Value {
        Format::Yaml.decode(s).unwrap()
    }

    fn round_trip(src: &str, dst: &str) -> Value {
        let (src, dst) = (yaml(src), yaml(dst));
        let patch = diff(&src, &dst);
        assert_eq!(merge(src, patch.clone(), "").unwrap(), dst);
        patch
    }

    #[test]
    fn test_map_diff() {
        let patch = round_trip("{a: 1, b: 2, c: {d: 1, e: 2}}", "{a: 1, b: 3, c: {d: 1}, f: 4}");
        assert_eq!(patch, yaml("{b: 3, c: {e: $delete}, f: 4}"));
    }

    #[test]
    fn test_list_append_and_delete() {
        let patch = round_trip("[{n: a}, {n: b}]", "[{n: a}, {n: c}]");
        assert_eq!(patch, yaml("[{$delete: {n: b}}, {n: c}]"));
    }

    #[test]
    fn test_list_reorder_falls_back_to_replace() {
        let patch = round_trip("[1, 2]", "[2, 1]");
        assert_eq!(patch, yaml("[2, 1, {$replace: true}]"));
    }

    #[test]
    fn test_scalar_removal_falls_back_to_replace() {
        let patch = round_trip("[1, 2, 3]", "[1, 3]");
        assert_eq!(patch, yaml("[1, 3, {$replace: true}]"));
    }

    #[test]
    fn test_overdeleting_pattern_falls_back() {
        // {n: a} as a pattern also matches {n: a, x: 1}
        let patch = round_trip("[{n: a}, {n: a, x: 1}]", "[{n: a, x: 1}]");
        assert_eq!(patch, yaml("[{n: a, x: 1}, {$replace: true}]"));
    }

    #[test]
    fn test_shape_change() {
        round_trip("{a: [1]}", "{a: {b: 1}}");
        round_trip("{a: 1}", "{a: ~}");
        round_trip("{a: ~}", "{a: 1}");
    }

    #[test]
    fn test_diff_document_tags_match() {
        let patch = diff_document(&yaml("{a: 1}"), &yaml("{a: 2}"));
        assert_eq!(patch, yaml("{$match: {}, a: 2}"));
    }
}
