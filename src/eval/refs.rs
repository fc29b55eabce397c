//! Phase A: reference expansion (`$merge`, `$replace`).
//!
//! Every substitution is expanded again until nothing changes. The number of
//! nested substitutions is bounded by the recursion limit; exceeding it means
//! the references form a cycle.

use super::resolve::Resolver;
use crate::document::DocId;
use crate::error::{Error, Result};
use crate::merge::merge;
use crate::value::{Map, Value, directive, join_path};
use tracing::trace;

/// Expands references in one document against a resolver snapshot.
pub struct Expander<'a> {
    resolver: &'a Resolver<'a>,
    limit: usize,
}

/// Outcome of one substitution attempt on a node.
enum Step {
    Substituted(Value),
    Done(Value),
}

impl<'a> Expander<'a> {
    pub fn new(resolver: &'a Resolver<'a>, limit: usize) -> Self {
        Self { resolver, limit }
    }

    /// Expand every reference inside `value`, which belongs to document `doc`.
    pub fn expand(&self, doc: DocId, value: Value, path: &str) -> Result<Value> {
        self.expand_at(doc, value, path, 0)
    }

    fn expand_at(&self, doc: DocId, value: Value, path: &str, depth: usize) -> Result<Value> {
        let mut value = value;
        let mut depth = depth;
        loop {
            if depth > self.limit {
                return Err(Error::recursion_limit(self.limit).with_path(path));
            }
            match self.substitute(doc, value, path)? {
                Step::Substituted(next) => {
                    trace!(path, depth, "expanded reference");
                    value = next;
                    depth += 1;
                }
                Step::Done(done) => {
                    value = done;
                    break;
                }
            }
        }

        match value {
            Value::Map(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    let child_path = join_path(path, &key);
                    out.insert(key, self.expand_at(doc, child, &child_path, depth)?);
                }
                Ok(Value::Map(out))
            }
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let item_path = join_path(path, out.len());
                    match splice_reference(&item).cloned() {
                        Some(reference) => {
                            match self.resolve(doc, &reference, &item_path)? {
                                Value::List(spliced) => {
                                    for element in spliced {
                                        let element_path = join_path(path, out.len());
                                        out.push(self.expand_at(doc, element, &element_path, depth + 1)?);
                                    }
                                }
                                other => out.push(self.expand_at(doc, other, &item_path, depth + 1)?),
                            }
                        }
                        None => out.push(self.expand_at(doc, item, &item_path, depth)?),
                    }
                }
                Ok(Value::List(out))
            }
            scalar => Ok(scalar),
        }
    }

    /// Replace the node itself if it is a reference directive.
    fn substitute(&self, doc: DocId, value: Value, path: &str) -> Result<Step> {
        match value {
            Value::String(s) => {
                let reference = s
                    .strip_prefix(directive::MERGE_PREFIX)
                    .or_else(|| s.strip_prefix(directive::REPLACE_PREFIX));
                match reference {
                    Some(reference) => Ok(Step::Substituted(
                        self.resolve(doc, &Value::from(reference), path)?,
                    )),
                    None => Ok(Step::Done(Value::String(s))),
                }
            }
            Value::Map(mut map) => {
                match map.remove(directive::REPLACE) {
                    Some(Value::Bool(_)) | None => {}
                    Some(reference) => {
                        if !map.is_empty() {
                            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                            return Err(Error::extra_keys(directive::REPLACE, &keys).with_path(path));
                        }
                        return Ok(Step::Substituted(self.resolve(doc, &reference, path)?));
                    }
                }

                let Some(reference) = map.remove(directive::MERGE) else {
                    return Ok(Step::Done(Value::Map(map)));
                };
                let resolved = self.resolve(doc, &reference, path)?;
                if map.is_empty() {
                    return Ok(Step::Substituted(resolved));
                }
                match resolved {
                    Value::Map(_) => Ok(Step::Substituted(merge(resolved, Value::Map(map), path)?)),
                    other => Err(Error::invalid_type(
                        directive::MERGE,
                        "a map reference when sibling keys are present",
                        other.type_name(),
                    )
                    .with_path(path)),
                }
            }
            other => Ok(Step::Done(other)),
        }
    }

    fn resolve(&self, doc: DocId, reference: &Value, path: &str) -> Result<Value> {
        self.resolver
            .get(doc, reference)
            .map_err(|e| if e.path.is_none() { e.with_path(path) } else { e })
    }
}

/// The reference of a `{$merge: ref}` list element, which may splice a list.
fn splice_reference(item: &Value) -> Option<&Value> {
    match item {
        Value::Map(map) if map.len() == 1 => map.get(directive::MERGE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSet;
    use crate::error::ErrorCode;
    use crate::format::Format;

    fn yaml(s: &str) -> Value {
        Format::Yaml.decode(s).unwrap()
    }

    fn expand_with_limit(doc: &str, limit: usize) -> Result<Value> {
        let mut docs = DocumentSet::new();
        let id = docs.add("doc", yaml(doc), []);
        let ids = vec![id];
        let snapshot = docs.clone();
        let resolver = Resolver::new(&snapshot, &ids);
        Expander::new(&resolver, limit).expand(id, docs.get(id).data.clone(), "")
    }

    fn expand(doc: &str) -> Value {
        expand_with_limit(doc, 100).unwrap()
    }

    #[test]
    fn test_merge_map_with_siblings() {
        let result = expand("{foo: {bar: {a: 1}}, zig: {$merge: foo.bar, b: 2}}");
        assert_eq!(result, yaml("{foo: {bar: {a: 1}}, zig: {a: 1, b: 2}}"));
    }

    #[test]
    fn test_merge_string_and_replace_string() {
        let result = expand("{a: [1, 2], b: $merge:a, c: $replace:a}");
        assert_eq!(result, yaml("{a: [1, 2], b: [1, 2], c: [1, 2]}"));
    }

    #[test]
    fn test_replace_map_reference() {
        let result = expand("{a: {x: 1}, b: {$replace: a}}");
        assert_eq!(result, yaml("{a: {x: 1}, b: {x: 1}}"));

        let err = expand_with_limit("{a: {x: 1}, b: {$replace: a, y: 2}}", 100).unwrap_err();
        assert_eq!(err.code, ErrorCode::ExtraKeys);
    }

    #[test]
    fn test_list_splice() {
        let result = expand("{a: [1, 2], b: [0, {$merge: a}, 3]}");
        assert_eq!(result, yaml("{a: [1, 2], b: [0, 1, 2, 3]}"));
    }

    #[test]
    fn test_chained_references() {
        let result = expand("{a: 1, b: $merge:a, c: $merge:b}");
        assert_eq!(result, yaml("{a: 1, b: 1, c: 1}"));
    }

    #[test]
    fn test_merge_scalar_with_siblings_is_invalid() {
        let err = expand_with_limit("{a: 1, b: {$merge: a, c: 2}}", 100).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidType);
        assert_eq!(err.path.as_deref(), Some("b"));
    }

    #[test]
    fn test_self_reference_is_circular() {
        let err = expand_with_limit("{a: $merge:a}", 20).unwrap_err();
        assert_eq!(err.code, ErrorCode::CircularRef);
    }

    #[test]
    fn test_nested_self_reference_is_circular() {
        let err = expand_with_limit("{a: {b: $merge:a}}", 20).unwrap_err();
        assert_eq!(err.code, ErrorCode::CircularRef);
    }

    #[test]
    fn test_missing_reference() {
        let err = expand_with_limit("{a: $merge:nope}", 20).unwrap_err();
        assert_eq!(err.code, ErrorCode::RefNotFound);
        assert_eq!(err.path.as_deref(), Some("a"));
    }
}
