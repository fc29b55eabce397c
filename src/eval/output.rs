//! Output filtering, validation and finalization.
//!
//! `$output: true` on a map (or a `{$output: true}` list element) emits the
//! subtree as an extra output while leaving it in place; `$output: false`
//! prunes it. Hoisted outputs follow the remaining root in pre-order.

use super::process::find_required;
use crate::error::{Error, Result};
use crate::value::{Map, Value, directive, join_path};

/// Split one processed document into its outputs.
pub fn split_outputs(root: Value) -> Result<Vec<Value>> {
    let mut filter = Filter::default();
    let (kept, root_hoisted) = filter.walk(root, "")?;
    if !filter.marked {
        return Ok(kept.into_iter().collect());
    }

    let mut outputs = Vec::new();
    if let Some(root) = kept
        && !root_hoisted
        && !root.is_empty_container()
    {
        outputs.push(root);
    }
    outputs.extend(filter.hoisted.into_iter().flatten());
    Ok(outputs)
}

/// Fail with the key path of the first `"$required"` marker left in `value`.
pub fn validate(value: &Value) -> Result<()> {
    match find_required(value, "") {
        Some(path) => Err(Error::required_field(&path)),
        None => Ok(()),
    }
}

/// Unescape `$$` to `$` in every string and key.
pub fn finalize(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(unescape(s)),
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (unescape(k), finalize(v)))
                .collect(),
        ),
        Value::List(items) => Value::List(items.into_iter().map(finalize).collect()),
        scalar => scalar,
    }
}

fn unescape(s: String) -> String {
    if s.contains("$$") { s.replace("$$", "$") } else { s }
}

#[derive(Default)]
struct Filter {
    /// Hoisted subtrees in pre-order; a slot is reserved before descending.
    hoisted: Vec<Option<Value>>,
    marked: bool,
}

impl Filter {
    /// Returns the node with pruned children removed, and whether it was hoisted.
    fn walk(&mut self, value: Value, path: &str) -> Result<(Option<Value>, bool)> {
        match value {
            Value::Map(mut map) => {
                let flag = output_flag(map.remove(directive::OUTPUT), path)?;
                self.visit(flag, |filter| {
                    let mut out = Map::new();
                    for (key, child) in map {
                        let child_path = join_path(path, &key);
                        if let (Some(kept), _) = filter.walk(child, &child_path)? {
                            out.insert(key, kept);
                        }
                    }
                    Ok(Value::Map(out))
                })
            }
            Value::List(mut items) => {
                let marker = items.iter().position(|item| match item {
                    Value::Map(m) => m.len() == 1 && m.contains_key(directive::OUTPUT),
                    _ => false,
                });
                let flag = match marker {
                    Some(index) => {
                        let raw = match items.remove(index) {
                            Value::Map(mut m) => m.remove(directive::OUTPUT),
                            _ => None,
                        };
                        output_flag(raw, path)?
                    }
                    None => None,
                };
                self.visit(flag, |filter| {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        let item_path = join_path(path, out.len());
                        if let (Some(kept), _) = filter.walk(item, &item_path)? {
                            out.push(kept);
                        }
                    }
                    Ok(Value::List(out))
                })
            }
            scalar => Ok((Some(scalar), false)),
        }
    }

    fn visit(
        &mut self,
        flag: Option<bool>,
        children: impl FnOnce(&mut Self) -> Result<Value>,
    ) -> Result<(Option<Value>, bool)> {
        match flag {
            None => Ok((Some(children(self)?), false)),
            Some(false) => {
                self.marked = true;
                children(self)?;
                Ok((None, false))
            }
            Some(true) => {
                self.marked = true;
                let slot = self.hoisted.len();
                self.hoisted.push(None);
                let value = children(self)?;
                self.hoisted[slot] = Some(value.clone());
                Ok((Some(value), true))
            }
        }
    }
}

fn output_flag(raw: Option<Value>, path: &str) -> Result<Option<bool>> {
    match raw {
        None => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(flag)),
        Some(other) => Err(Error::invalid_type(directive::OUTPUT, "a boolean", other.type_name())
            .with_path(path)),
    }
}
