//! Structural pattern matching used by `$match`, `$matches` and `$delete`.

use crate::value::{Value, directive};

/// Whether `obj` structurally matches `pattern`.
///
/// - Map patterns match maps whose entries match every pattern entry; extra
///   object keys are ignored and a `null` pattern value also matches an absent
///   key. `$invert: true` inverts the result.
/// - A map whose only key is `$merge`, `$replace` or `$encode` is a directive,
///   not data, and never matches, whether it is the object or the pattern.
/// - List patterns match lists containing, for every pattern element, at least
///   one matching element.
/// - Scalars compare by value.
pub fn matches(obj: &Value, pattern: &Value) -> bool {
    if is_directive_marker(obj) || is_directive_marker(pattern) {
        return false;
    }
    match pattern {
        Value::Map(pat) => {
            let invert = matches!(pat.get(directive::INVERT), Some(Value::Bool(true)));
            let matched = match obj {
                Value::Map(map) => pat
                    .iter()
                    .filter(|(k, _)| k.as_str() != directive::INVERT)
                    .all(|(k, expected)| match map.get(k) {
                        Some(actual) => matches(actual, expected),
                        None => expected.is_null(),
                    }),
                _ => false,
            };
            matched != invert
        }
        Value::List(pat) => match obj {
            Value::List(items) => pat
                .iter()
                .all(|expected| items.iter().any(|item| matches(item, expected))),
            _ => false,
        },
        scalar => obj.loose_eq(scalar),
    }
}

fn is_directive_marker(value: &Value) -> bool {
    match value {
        Value::Map(map) if map.len() == 1 => map.keys().any(|k| {
            k == directive::MERGE || k == directive::REPLACE || k == directive::ENCODE
        }),
        _ => false,
    }
}
