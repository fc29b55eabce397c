//! Intersect: the structure shared by several values.

use crate::value::{Map, Value, directive};

/// Maximal structure common to `a` and `b`.
///
/// Maps keep keys present on both sides (`null` against a value drops the
/// key, `null` on both sides stays `null`). Lists keep the elements of `a`
/// found in `b`, or become `["$required"]` when none are. Equal leaves are
/// kept and differing ones become `"$required"`.
pub fn intersect(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Map(x), Value::Map(y)) => {
            let mut out = Map::new();
            for (key, left) in x {
                let Some(right) = y.get(key) else {
                    continue;
                };
                match (left, right) {
                    (Value::Null, Value::Null) => {
                        out.insert(key.clone(), Value::Null);
                    }
                    (Value::Null, _) | (_, Value::Null) => {}
                    _ => {
                        out.insert(key.clone(), intersect(left, right));
                    }
                }
            }
            Value::Map(out)
        }
        (Value::List(x), Value::List(y)) => {
            let kept: Vec<Value> = x.iter().filter(|item| y.contains(item)).cloned().collect();
            if kept.is_empty() {
                Value::List(vec![Value::from(directive::REQUIRED)])
            } else {
                Value::List(kept)
            }
        }
        _ if a == b => a.clone(),
        _ => Value::from(directive::REQUIRED),
    }
}

/// Intersect every value, left to right. No values intersect to `null`.
pub fn intersect_all(values: &[Value]) -> Value {
    let mut iter = values.iter();
    let Some(first) = iter.next() else {
        return Value::Null;
    };
    iter.fold(first.clone(), |acc, next| intersect(&acc, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    fn yaml(s: &str) -> Value {
        Format::Yaml.decode(s).unwrap()
    }

    #[test]
    fn test_maps() {
        assert_eq!(
            intersect(&yaml("{a: 1, b: 2, c: 3}"), &yaml("{a: 1, b: 3}")),
            yaml("{a: 1, b: $required}")
        );
    }

    #[test]
    fn test_nulls() {
        assert_eq!(
            intersect(&yaml("{a: ~, b: ~}"), &yaml("{a: ~, b: 1}")),
            yaml("{a: ~}")
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(intersect(&yaml("[1, 2]"), &yaml("[2, 3]")), yaml("[2]"));
        assert_eq!(intersect(&yaml("[1]"), &yaml("[3]")), yaml("[$required]"));
    }

    #[test]
    fn test_shape_mismatch() {
        assert_eq!(intersect(&yaml("{a: [1]}"), &yaml("{a: {b: 1}}")), yaml("{a: $required}"));
    }

    #[test]
    fn test_intersect_all() {
        let values = vec![yaml("{a: 1, b: 1}"), yaml("{a: 1, b: 1}"), yaml("{a: 1, b: 2}")];
        assert_eq!(intersect_all(&values), yaml("{a: 1, b: $required}"));
        assert_eq!(intersect_all(&[]), Value::Null);
        assert_eq!(intersect_all(&values[..1]), values[0]);
    }
}
