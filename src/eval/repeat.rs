//! `$repeat` bindings.
//!
//! A repeat spec is one of:
//!
//! - an integer `N`: `0..N-1`
//! - a list: one binding per element
//! - a range map of exactly two of `$first`, `$last`, `$count`, plus an
//!   optional non-zero `$step` (default 1)
//! - a map of named dimensions, each one of the forms above
//!
//! Unnamed specs bind `$repeat`; named dimensions bind `$repeat:<name>` and
//! produce the cartesian product, folded in sorted name order.
//!
//! No spec may produce more than [`MAX_REPEAT`] bindings.

use crate::context::repeat_symbol;
use crate::error::{Error, Result};
use crate::value::{Map, Value, directive};

/// Upper bound on the bindings of one spec.
pub const MAX_REPEAT: i64 = 100_000;

/// One iteration's variable bindings.
pub type Binding = Vec<(String, Value)>;

/// Expand a repeat spec into its ordered bindings.
pub fn bindings(spec: &Value) -> Result<Vec<Binding>> {
    match spec {
        Value::Map(map) if !is_range(map) => named_bindings(map),
        other => Ok(dimension(other)?
            .into_iter()
            .map(|value| vec![(repeat_symbol(None), value)])
            .collect()),
    }
}

fn is_range(map: &Map) -> bool {
    [directive::FIRST, directive::LAST, directive::COUNT, directive::STEP]
        .iter()
        .any(|k| map.contains_key(*k))
}

fn named_bindings(map: &Map) -> Result<Vec<Binding>> {
    if map.is_empty() {
        return Err(Error::invalid_repeat("named $repeat needs at least one dimension"));
    }
    let mut combos: Vec<Binding> = vec![Vec::new()];
    for (name, spec) in map {
        if name.starts_with('$') {
            return Err(Error::invalid_repeat(format!(
                "unexpected key {} in named $repeat",
                name
            )));
        }
        let values = dimension(spec)?;
        check_limit(i64::try_from(combos.len().saturating_mul(values.len())).unwrap_or(i64::MAX))?;
        let symbol = repeat_symbol(Some(name));
        let symbol = &symbol;
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                values.iter().map(move |value| {
                    let mut next = combo.clone();
                    next.push((symbol.clone(), value.clone()));
                    next
                })
            })
            .collect();
    }
    Ok(combos)
}

/// Values of a single (unnamed) dimension.
fn dimension(spec: &Value) -> Result<Vec<Value>> {
    match spec {
        Value::Int(n) if *n < 0 => Err(Error::invalid_repeat(format!(
            "repeat count must not be negative, got {}",
            n
        ))),
        Value::Int(n) => {
            check_limit(*n)?;
            Ok((0..*n).map(Value::Int).collect())
        }
        Value::List(items) => Ok(items.clone()),
        Value::Map(map) if is_range(map) => range(map),
        other => Err(Error::invalid_repeat(format!(
            "$repeat expects an integer, list or range, found {}",
            other.type_name()
        ))),
    }
}

fn range_field(map: &Map, key: &str) -> Result<Option<i64>> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Int(i)) => Ok(Some(*i)),
        Some(other) => Err(Error::invalid_repeat(format!(
            "{} must be an integer, found {}",
            key,
            other.type_name()
        ))),
    }
}

fn range(map: &Map) -> Result<Vec<Value>> {
    if let Some(key) = map.keys().find(|k| {
        ![directive::FIRST, directive::LAST, directive::COUNT, directive::STEP].contains(&k.as_str())
    }) {
        return Err(Error::invalid_repeat(format!("unexpected key {} in $repeat range", key)));
    }

    let first = range_field(map, directive::FIRST)?;
    let last = range_field(map, directive::LAST)?;
    let count = range_field(map, directive::COUNT)?;
    let step = range_field(map, directive::STEP)?.unwrap_or(1);
    if step == 0 {
        return Err(Error::invalid_repeat("$step must not be zero"));
    }

    let (first, count) = match (first, last, count) {
        (Some(first), Some(last), None) => {
            let span = last.checked_sub(first).ok_or_else(overflow)?;
            // i64::MIN / -1 is the only overflowing division.
            let (Some(rem), Some(steps)) = (span.checked_rem(step), span.checked_div(step)) else {
                return Err(overflow());
            };
            if rem != 0 || steps < 0 {
                return Err(Error::invalid_repeat(format!(
                    "range {}..{} is not reachable with step {}",
                    first, last, step
                )));
            }
            (first, steps.checked_add(1).ok_or_else(overflow)?)
        }
        (Some(first), None, Some(count)) => (first, count),
        (None, Some(last), Some(count)) => {
            let back = count
                .checked_sub(1)
                .and_then(|n| n.checked_mul(step))
                .and_then(|offset| last.checked_sub(offset))
                .ok_or_else(overflow)?;
            (back, count)
        }
        _ => {
            return Err(Error::invalid_repeat(
                "range needs exactly two of $first, $last and $count",
            ));
        }
    };
    if count <= 0 {
        return Err(Error::invalid_repeat(format!("$count must be positive, got {}", count)));
    }
    check_limit(count)?;
    (0..count)
        .map(|i| {
            i.checked_mul(step)
                .and_then(|offset| first.checked_add(offset))
                .map(Value::Int)
                .ok_or_else(overflow)
        })
        .collect()
}

fn overflow() -> Error {
    Error::invalid_repeat("$repeat range overflows a 64-bit integer")
}

fn check_limit(copies: i64) -> Result<()> {
    if copies > MAX_REPEAT {
        return Err(Error::invalid_repeat(format!(
            "$repeat would produce {} copies, the limit is {}",
            copies, MAX_REPEAT
        )));
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

    fn unnamed(spec: &str) -> Vec<Value> {
        bindings(&yaml(spec))
            .unwrap()
            .into_iter()
            .map(|mut b| {
                assert_eq!(b.len(), 1);
                assert_eq!(b[0].0, "$repeat");
                b.remove(0).1
            })
            .collect()
    }

    fn err(spec: &str) -> ErrorCode {
        bindings(&yaml(spec)).unwrap_err().code
    }

    #[test]
    fn test_integer() {
        assert_eq!(unnamed("3"), vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
        assert!(unnamed("0").is_empty());
        assert_eq!(err("-1"), ErrorCode::InvalidRepeat);
    }

    #[test]
    fn test_list() {
        assert_eq!(unnamed("[a, b]"), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(unnamed("{$first: 2, $count: 3}"), yaml("[2, 3, 4]").as_list().unwrap());
        assert_eq!(
            unnamed("{$first: 0, $last: 10, $step: 5}"),
            yaml("[0, 5, 10]").as_list().unwrap()
        );
        assert_eq!(
            unnamed("{$last: 10, $count: 3, $step: 2}"),
            yaml("[6, 8, 10]").as_list().unwrap()
        );
        assert_eq!(
            unnamed("{$first: 3, $last: 1, $step: -1}"),
            yaml("[3, 2, 1]").as_list().unwrap()
        );
    }

    #[test]
    fn test_invalid_ranges() {
        assert_eq!(err("{$first: 0, $last: 3, $count: 4}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{$first: 0}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{$first: 0, $count: 2, $step: 0}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{$first: 0, $last: 3, $step: 2}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{$first: 3, $last: 0}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{$first: 0, $count: 0}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{$first: a, $count: 2}"), ErrorCode::InvalidRepeat);
    }

    #[test]
    fn test_overflowing_ranges() {
        assert_eq!(err("{$first: 9223372036854775807, $count: 2}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{$first: -9223372036854775807, $last: 9}"), ErrorCode::InvalidRepeat);
        assert_eq!(
            err("{$last: -9223372036854775807, $count: 3, $step: 2}"),
            ErrorCode::InvalidRepeat
        );
        assert_eq!(
            unnamed("{$first: 9223372036854775806, $count: 2}"),
            vec![Value::Int(i64::MAX - 1), Value::Int(i64::MAX)]
        );
    }

    #[test]
    fn test_copy_limit() {
        assert_eq!(err("1000000000000"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{$first: 0, $count: 100001}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{a: 1000, b: 1000}"), ErrorCode::InvalidRepeat);
        assert_eq!(unnamed("100000").len(), 100_000);
    }

    #[test]
    fn test_named_dimensions() {
        let result = bindings(&yaml("{zone: [a, b], idx: 2}")).unwrap();
        let rendered: Vec<String> = result
            .iter()
            .map(|b| {
                b.iter()
                    .map(|(k, v)| format!("{}={}", k, v.to_plain_string()))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect();
        assert_eq!(
            rendered,
            vec![
                "$repeat:idx=0,$repeat:zone=a",
                "$repeat:idx=0,$repeat:zone=b",
                "$repeat:idx=1,$repeat:zone=a",
                "$repeat:idx=1,$repeat:zone=b",
            ]
        );
    }

    #[test]
    fn test_invalid_named() {
        assert_eq!(err("{}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{a: 2, $other: 1}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("{a: text}"), ErrorCode::InvalidRepeat);
        assert_eq!(err("true"), ErrorCode::InvalidRepeat);
    }
}
