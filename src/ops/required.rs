//! Required: the skeleton of a value made of its `"$required"` markers.

use crate::value::{Map, Value};

/// Keep only the branches that lead to a `"$required"` marker.
///
/// Returns `None` when nothing is required.
pub fn required(value: &Value) -> Option<Value> {
    match value {
        v if v.is_required() => Some(v.clone()),
        Value::Map(map) => {
            let kept: Map = map
                .iter()
                .filter_map(|(k, v)| required(v).map(|r| (k.clone(), r)))
                .collect();
            (!kept.is_empty()).then_some(Value::Map(kept))
        }
        Value::List(items) => {
            let kept: Vec<Value> = items.iter().filter_map(required).collect();
            (!kept.is_empty()).then_some(Value::List(kept))
        }
        _ => None,
    }
}
