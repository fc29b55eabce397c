//! Cross-document reference resolution.
//!
//! References take three shapes:
//!
//! - a dotted path string `a.b.c` into the current document
//! - a list `[pattern?, seg, seg, ...]` where an optional leading map pattern
//!   selects another document
//! - a map `{$match: pattern, $path: path}`
//!
//! A string that parses as a YAML list or map is treated as the structured
//! form, so `"[{kind: Service}, spec.port]"` works inside interpolation.

use crate::context::EvalContext;
use crate::document::{DocId, DocumentSet};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::pattern::matches;
use crate::value::{Value, directive};
use std::collections::BTreeSet;

/// Read-only view of the merged documents used to resolve references.
pub struct Resolver<'a> {
    docs: &'a DocumentSet,
    /// Documents that take part in evaluation, in output order.
    result: &'a [DocId],
}

impl<'a> Resolver<'a> {
    pub fn new(docs: &'a DocumentSet, result: &'a [DocId]) -> Self {
        Self { docs, result }
    }

    /// Resolve `reference` relative to document `doc`.
    pub fn get(&self, doc: DocId, reference: &Value) -> Result<Value> {
        match reference {
            Value::String(s) => match structured(s) {
                Some(parsed) => self.get(doc, &parsed),
                None => walk(&self.docs.get(doc).data, &split_path(s), s),
            },
            Value::List(items) => {
                let (target, segments) = match items.split_first() {
                    Some((Value::Map(pattern), rest)) => {
                        (self.select(doc, &Value::Map(pattern.clone()))?, rest)
                    }
                    _ => (doc, items.as_slice()),
                };
                let mut path = Vec::new();
                for segment in segments {
                    match segment {
                        Value::String(s) => path.extend(split_path(s)),
                        Value::Int(i) => path.push(i.to_string()),
                        other => {
                            return Err(Error::invalid_type(
                                "reference segment",
                                "a string or integer",
                                other.type_name(),
                            ));
                        }
                    }
                }
                walk(&self.docs.get(target).data, &path, &reference.to_string())
            }
            Value::Map(map) => {
                let extra: Vec<&str> = map
                    .keys()
                    .map(String::as_str)
                    .filter(|k| *k != directive::MATCH && *k != directive::PATH)
                    .collect();
                if !extra.is_empty() {
                    return Err(Error::extra_keys(directive::MATCH, &extra));
                }
                let pattern = map.get(directive::MATCH).cloned().unwrap_or_else(Value::map);
                let target = self.select(doc, &pattern)?;
                let path = match map.get(directive::PATH) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::String(p)) => split_path(p),
                    Some(other) => {
                        return Err(Error::invalid_type(
                            directive::PATH,
                            "a dotted path",
                            other.type_name(),
                        ));
                    }
                };
                walk(&self.docs.get(target).data, &path, &reference.to_string())
            }
            other => Err(Error::invalid_type(
                "reference",
                "a path, list or {$match, $path} map",
                other.type_name(),
            )),
        }
    }

    /// Resolve a bound context variable, or else a reference.
    pub fn get_with_var(&self, doc: DocId, reference: &str, ctx: &EvalContext) -> Result<Value> {
        if let Some(value) = ctx.get(reference) {
            return Ok(value.clone());
        }
        match self.get(doc, &Value::from(reference)) {
            Ok(value) => Ok(value),
            Err(_) if reference.starts_with('$') => Err(Error::variable_not_found(reference)),
            Err(err) => Err(err),
        }
    }

    /// Select exactly one document matching `pattern`.
    ///
    /// `doc` and its ancestors are searched first, then every result document.
    fn select(&self, doc: DocId, pattern: &Value) -> Result<DocId> {
        let mut near: BTreeSet<DocId> = self.docs.ancestors(doc);
        near.insert(doc);

        let matching: Vec<DocId> = self
            .result
            .iter()
            .copied()
            .filter(|id| matches(&self.docs.get(*id).data, pattern))
            .collect();
        let preferred: Vec<DocId> = matching
            .iter()
            .copied()
            .filter(|id| near.contains(id))
            .collect();
        let candidates = if preferred.is_empty() { matching } else { preferred };

        match candidates.as_slice() {
            [] => Err(Error::missing_match(pattern)),
            [one] => Ok(*one),
            many => Err(Error::multi_match(pattern, many.len())),
        }
    }
}

/// Parse a string reference as a structured one when it is YAML flow syntax.
fn structured(s: &str) -> Option<Value> {
    let trimmed = s.trim_start();
    if !trimmed.starts_with('[') && !trimmed.starts_with('{') {
        return None;
    }
    match Format::Yaml.decode(s) {
        Ok(value @ (Value::List(_) | Value::Map(_))) => Some(value),
        _ => None,
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Follow `path` through nested maps (and list indices).
fn walk(root: &Value, path: &[String], reference: &str) -> Result<Value> {
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Map(map) => map.get(segment),
            Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .ok_or_else(|| Error::ref_not_found(reference))?;
    }
    Ok(current.clone())
}
