//! Structural merge of a patch into an existing value.
//!
//! Maps merge key by key, lists append by default, scalars are replaced.
//! Patches steer the merge with directives:
//!
//! - `$replace: true` on a map, or a `"$replace"` / `{$replace: true}` list
//!   element, replaces the destination wholesale
//! - a map value `"$delete"` removes that key
//! - a list element `{$delete: <pattern>}` removes every matching element
//! - a list element `{$match: <pattern>, ...}` (or `$matches: [...]`) merges
//!   into the matching elements instead of appending
//!
//! A patch that would change nothing is reported as a useless override.
//!
//! # Example
//! ```
//! use strata::format::Format;
//! use strata::merge::merge;
//!
//! let base = Format::Yaml.decode("server: {port: 8080, host: localhost}").unwrap();
//! let patch = Format::Yaml.decode("server: {port: 9000}").unwrap();
//! let merged = merge(base, patch, "").unwrap();
//! assert_eq!(
//!     merged,
//!     Format::Yaml.decode("server: {port: 9000, host: localhost}").unwrap()
//! );
//! ```

use crate::error::{Error, Result};
use crate::pattern::matches;
use crate::value::{Map, Value, directive, join_path};

/// Merge `src` into `dst`, returning the merged value.
///
/// `path` is the key path of `dst`, used for error context.
pub fn merge(dst: Value, src: Value, path: &str) -> Result<Value> {
    match (dst, src) {
        (Value::Map(dst), Value::Map(src)) => merge_maps(dst, src, path),
        (Value::List(dst), Value::List(src)) => merge_lists(dst, src, path),
        (Value::Null, src) => normalize(src, path),
        (dst, src) => {
            if is_scalar(&dst) && dst == src {
                return Err(Error::useless_override(
                    path,
                    &format!("value is already {}", dst),
                ));
            }
            normalize(src, path)
        }
    }
}

/// Merge every value in order, later values taking precedence.
pub fn merge_all(values: impl IntoIterator<Item = Value>) -> Result<Value> {
    values
        .into_iter()
        .try_fold(Value::Null, |acc, v| merge(acc, v, ""))
}

/// Prepare patch content that has no destination to merge into.
///
/// Equivalent to merging into an empty container: replace markers are
/// stripped, while deletions and element matches have nothing to act on and
/// are reported.
pub fn normalize(value: Value, path: &str) -> Result<Value> {
    match value {
        Value::Map(mut map) => {
            strip_replace_flag(&mut map);
            let mut out = Map::new();
            for (key, v) in map {
                let child = join_path(path, &key);
                if v.is_str(directive::DELETE) {
                    return Err(Error::useless_override(&child, "deleted key does not exist"));
                }
                out.insert(key, normalize(v, &child)?);
            }
            Ok(Value::Map(out))
        }
        Value::List(items) => merge_lists(Vec::new(), items, path),
        scalar => Ok(scalar),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Map(_) | Value::List(_) | Value::Null)
}

/// Remove a boolean `$replace` flag, reporting whether it was `true`.
///
/// Non-boolean `$replace` values are references and stay for phase A.
fn strip_replace_flag(map: &mut Map) -> bool {
    match map.get(directive::REPLACE) {
        Some(Value::Bool(flag)) => {
            let flag = *flag;
            map.remove(directive::REPLACE);
            flag
        }
        _ => false,
    }
}

fn merge_maps(mut dst: Map, mut src: Map, path: &str) -> Result<Value> {
    if strip_replace_flag(&mut src) {
        return normalize(Value::Map(src), path);
    }

    for (key, value) in src {
        let child = join_path(path, &key);
        if value.is_str(directive::DELETE) {
            if dst.remove(&key).is_none() {
                return Err(Error::useless_override(&child, "deleted key does not exist"));
            }
            continue;
        }
        let merged = match dst.remove(&key) {
            Some(existing) => merge(existing, value, &child)?,
            None => normalize(value, &child)?,
        };
        dst.insert(key, merged);
    }
    Ok(Value::Map(dst))
}

/// Whether a list element requests wholesale replacement.
fn is_replace_marker(item: &Value) -> bool {
    match item {
        Value::String(s) => s == directive::REPLACE,
        Value::Map(m) => m.len() == 1 && matches!(m.get(directive::REPLACE), Some(Value::Bool(true))),
        _ => false,
    }
}

fn merge_lists(mut dst: Vec<Value>, src: Vec<Value>, path: &str) -> Result<Value> {
    if dst.first().is_some_and(Value::is_required) {
        dst.remove(0);
    }

    if src.iter().any(is_replace_marker) {
        let kept: Vec<Value> = src.into_iter().filter(|v| !is_replace_marker(v)).collect();
        return merge_lists(Vec::new(), kept, path);
    }

    for item in src {
        let child = join_path(path, dst.len());
        match item {
            Value::Map(map) if map.contains_key(directive::DELETE) => {
                delete_elements(&mut dst, map, &child)?;
            }
            Value::Map(map)
                if map.contains_key(directive::MATCH) || map.contains_key(directive::MATCHES) =>
            {
                merge_matching_elements(&mut dst, map, path)?;
            }
            other => dst.push(normalize(other, &child)?),
        }
    }
    Ok(Value::List(dst))
}

fn delete_elements(dst: &mut Vec<Value>, mut directive_map: Map, path: &str) -> Result<()> {
    let pattern = directive_map.remove(directive::DELETE).unwrap_or_default();
    if !directive_map.is_empty() {
        let keys: Vec<&str> = directive_map.keys().map(String::as_str).collect();
        return Err(Error::extra_keys(directive::DELETE, &keys).with_path(path));
    }

    let before = dst.len();
    dst.retain(|item| !matches(item, &pattern));
    if dst.len() == before {
        return Err(Error::useless_override(
            path,
            &format!("no list element matches {}", pattern),
        ));
    }
    Ok(())
}

/// Collect the patterns of a `$match` / `$matches` directive map.
fn take_patterns(directive_map: &mut Map, path: &str) -> Result<Vec<Value>> {
    let mut patterns = Vec::new();
    if let Some(pattern) = directive_map.remove(directive::MATCH) {
        patterns.push(pattern);
    }
    match directive_map.remove(directive::MATCHES) {
        Some(Value::List(items)) => patterns.extend(items),
        Some(other) => {
            return Err(
                Error::invalid_type(directive::MATCHES, "a list of patterns", other.type_name())
                    .with_path(path),
            );
        }
        None => {}
    }
    Ok(patterns)
}

fn merge_matching_elements(dst: &mut [Value], mut directive_map: Map, path: &str) -> Result<()> {
    let patterns = take_patterns(&mut directive_map, path)?;

    let patch = match directive_map.remove(directive::VALUE) {
        Some(value) => {
            if !directive_map.is_empty() {
                let keys: Vec<&str> = directive_map.keys().map(String::as_str).collect();
                return Err(Error::extra_keys(directive::VALUE, &keys).with_path(path));
            }
            value
        }
        None => Value::Map(directive_map),
    };

    let mut targets: Vec<usize> = Vec::new();
    for pattern in &patterns {
        let found: Vec<usize> = dst
            .iter()
            .enumerate()
            .filter(|(_, item)| matches(item, pattern))
            .map(|(i, _)| i)
            .collect();
        if found.is_empty() {
            return Err(Error::no_match(pattern).with_path(path));
        }
        for i in found {
            if !targets.contains(&i) {
                targets.push(i);
            }
        }
    }

    for i in targets {
        let existing = std::mem::take(&mut dst[i]);
        dst[i] = merge(existing, patch.clone(), &join_path(path, i))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::format::Format;

    fn yaml(s: &str) -> Value {
        Format::Yaml.decode(s).unwrap()
    }

    fn merged(base: &str, patch: &str) -> Value {
        merge(yaml(base), yaml(patch), "").unwrap()
    }

    fn merge_err(base: &str, patch: &str) -> Error {
        merge(yaml(base), yaml(patch), "").unwrap_err()
    }

    #[test]
    fn test_merge_simple_maps() {
        assert_eq!(merged("{a: 1, b: 2}", "{b: 3, c: 4}"), yaml("{a: 1, b: 3, c: 4}"));
    }

    #[test]
    fn test_merge_nested_maps() {
        let result = merged(
            "{server: {host: localhost, port: 8080}, debug: true}",
            "{server: {port: 9000}}",
        );
        assert_eq!(
            result,
            yaml("{server: {host: localhost, port: 9000}, debug: true}")
        );
    }

    #[test]
    fn test_replace_map() {
        let result = merged("{a: 1, b: {c: 2}}", "{$replace: true, x: 1}");
        assert_eq!(result, yaml("{x: 1}"));
    }

    #[test]
    fn test_nested_replace_map() {
        let result = merged("{keep: 1, b: {c: 2, d: 3}}", "{b: {$replace: true, e: 4}}");
        assert_eq!(result, yaml("{keep: 1, b: {e: 4}}"));
    }

    #[test]
    fn test_delete_key() {
        assert_eq!(merged("{a: 1, b: 2}", "{b: $delete}"), yaml("{a: 1}"));
    }

    #[test]
    fn test_delete_missing_key_is_useless() {
        let err = merge_err("{a: 1}", "{b: $delete}");
        assert_eq!(err.code, ErrorCode::UselessOverride);
        assert_eq!(err.path.as_deref(), Some("b"));
    }

    #[test]
    fn test_identical_scalar_is_useless() {
        let err = merge_err("{a: {b: 1}}", "{a: {b: 1}}");
        assert_eq!(err.code, ErrorCode::UselessOverride);
        assert_eq!(err.path.as_deref(), Some("a.b"));
    }

    #[test]
    fn test_shape_change_replaces() {
        assert_eq!(merged("{v: 42}", "{v: {nested: true}}"), yaml("{v: {nested: true}}"));
        assert_eq!(merged("{v: {nested: true}}", "{v: 42}"), yaml("{v: 42}"));
        assert_eq!(merged("{v: ~}", "{v: [1]}"), yaml("{v: [1]}"));
    }

    #[test]
    fn test_list_append() {
        assert_eq!(merged("[1]", "[2]"), yaml("[1, 2]"));
    }

    #[test]
    fn test_list_replace() {
        assert_eq!(merged("[1]", "[2, {$replace: true}]"), yaml("[2]"));
        assert_eq!(merged("[1, 2]", "[$replace]"), yaml("[]"));
    }

    #[test]
    fn test_list_delete_by_match() {
        let result = merged("[{x: 1}, {x: 2}, {x: 3}]", "[{$delete: {x: 2}}]");
        assert_eq!(result, yaml("[{x: 1}, {x: 3}]"));
    }

    #[test]
    fn test_list_delete_without_match_is_useless() {
        let err = merge_err("[{x: 1}]", "[{$delete: {x: 9}}]");
        assert_eq!(err.code, ErrorCode::UselessOverride);
    }

    #[test]
    fn test_list_match_merges_directive_map() {
        let result = merged(
            "[{name: a, port: 1}, {name: b, port: 2}]",
            "[{$match: {name: b}, port: 3}]",
        );
        assert_eq!(result, yaml("[{name: a, port: 1}, {name: b, port: 3}]"));
    }

    #[test]
    fn test_list_match_merges_value() {
        let result = merged("[[1], [2, 3]]", "[{$match: [2], $value: [4]}]");
        assert_eq!(result, yaml("[[1], [2, 3, 4]]"));
    }

    #[test]
    fn test_list_matches_every_pattern_must_hit() {
        let result = merged(
            "[{n: a}, {n: b}, {n: c}]",
            "[{$matches: [{n: a}, {n: c}], enabled: true}]",
        );
        assert_eq!(result, yaml("[{n: a, enabled: true}, {n: b}, {n: c, enabled: true}]"));

        let err = merge_err("[{n: a}]", "[{$matches: [{n: a}, {n: z}], enabled: true}]");
        assert_eq!(err.code, ErrorCode::NoMatchFound);
    }

    #[test]
    fn test_list_match_value_with_siblings() {
        let err = merge_err("[{n: a}]", "[{$match: {n: a}, $value: {x: 1}, y: 2}]");
        assert_eq!(err.code, ErrorCode::ExtraKeys);
    }

    #[test]
    fn test_required_sentinel_dropped_from_list() {
        assert_eq!(merged("[$required]", "[a]"), yaml("[a]"));
    }

    #[test]
    fn test_new_content_is_normalized() {
        assert_eq!(merged("{}", "{a: {$replace: true, b: 1}}"), yaml("{a: {b: 1}}"));
        let err = merge_err("{}", "{a: {b: $delete}}");
        assert_eq!(err.code, ErrorCode::UselessOverride);
        assert_eq!(err.path.as_deref(), Some("a.b"));
    }

    #[test]
    fn test_merge_all() {
        let result = merge_all(vec![yaml("{a: 1}"), yaml("{b: 2}"), yaml("{a: 3, c: 4}")]).unwrap();
        assert_eq!(result, yaml("{a: 3, b: 2, c: 4}"));
    }
}
