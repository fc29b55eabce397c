//! Merge engine: folds patch documents into the accumulated result set.
//!
//! Every patch is merged into the documents it selects, or appended when it
//! selects none:
//!
//! 1. `$matches: [pattern, ...]` merges into the union of all matches
//! 2. `$match: null` appends, `$match: pattern` merges into every match
//! 3. otherwise the patch merges into every result document that is one of
//!    its ancestors (file layering)
//! 4. otherwise the patch is appended
//!
//! Pattern searches prefer the patch's own ancestors and fall back to every
//! result document.

use crate::document::{DocId, DocumentSet};
use crate::error::{Error, Result};
use crate::merge::{merge, normalize};
use crate::pattern::matches;
use crate::value::{Value, directive};
use tracing::{debug, trace};

/// How a patch selects its merge targets.
enum Selector {
    Patterns(Vec<Value>),
    Append,
    Lineage,
}

/// Merge every document of `order` in turn, returning the result documents.
pub fn merge_documents(docs: &mut DocumentSet, order: &[DocId]) -> Result<Vec<DocId>> {
    let mut result = Vec::new();
    for &patch in order {
        merge_document(docs, &mut result, patch)?;
    }
    Ok(result)
}

/// Merge one patch document into `result`.
///
/// Merged targets record the patch in their `parents`. An appended patch is
/// itself pushed onto `result` with its data normalized.
pub fn merge_document(docs: &mut DocumentSet, result: &mut Vec<DocId>, patch: DocId) -> Result<()> {
    let label = docs.label(patch).to_string();
    let (data, selector) = take_selector(std::mem::take(&mut docs.get_mut(patch).data))
        .map_err(|e| e.in_document(&label))?;

    let targets = match selector {
        Selector::Append => Vec::new(),
        Selector::Patterns(patterns) => {
            let mut targets: Vec<DocId> = Vec::new();
            for pattern in &patterns {
                let found = search(docs, result, patch, pattern);
                if found.is_empty() {
                    return Err(Error::no_match(pattern).in_document(&label));
                }
                for id in found {
                    if !targets.contains(&id) {
                        targets.push(id);
                    }
                }
            }
            targets
        }
        Selector::Lineage => {
            let ancestors = docs.ancestors(patch);
            result
                .iter()
                .copied()
                .filter(|id| ancestors.contains(id))
                .collect()
        }
    };

    if targets.is_empty() {
        debug!(document = %label, "appending new document");
        docs.get_mut(patch).data = normalize(data, "").map_err(|e| e.in_document(&label))?;
        result.push(patch);
        return Ok(());
    }

    for target in targets {
        trace!(document = %label, into = docs.label(target), "merging patch");
        let existing = std::mem::take(&mut docs.get_mut(target).data);
        let merged = merge(existing, data.clone(), "").map_err(|e| e.in_document(&label))?;
        let doc = docs.get_mut(target);
        doc.data = merged;
        doc.parents.insert(patch);
    }
    docs.get_mut(patch).data = data;
    Ok(())
}

/// Strip the root selection directives from a patch.
fn take_selector(data: Value) -> Result<(Value, Selector)> {
    let Value::Map(mut map) = data else {
        return Ok((data, Selector::Lineage));
    };
    map.remove(directive::PARENT);
    let match_all = map.remove(directive::MATCHES);
    let match_one = map.remove(directive::MATCH);

    let selector = match (match_all, match_one) {
        (Some(Value::List(patterns)), None) => Selector::Patterns(patterns),
        (Some(other), None) => {
            return Err(Error::invalid_type(
                directive::MATCHES,
                "a list of patterns",
                other.type_name(),
            ));
        }
        (Some(_), Some(_)) => {
            return Err(Error::extra_keys(directive::MATCHES, &[directive::MATCH]));
        }
        (None, Some(Value::Null)) => Selector::Append,
        (None, Some(pattern)) => Selector::Patterns(vec![pattern]),
        (None, None) => Selector::Lineage,
    };
    Ok((Value::Map(map), selector))
}

/// Result documents matching `pattern`, ancestors of `patch` first.
fn search(docs: &DocumentSet, result: &[DocId], patch: DocId, pattern: &Value) -> Vec<DocId> {
    let ancestors = docs.ancestors(patch);
    let matching: Vec<DocId> = result
        .iter()
        .copied()
        .filter(|id| matches(&docs.get(*id).data, pattern))
        .collect();
    let near: Vec<DocId> = matching
        .iter()
        .copied()
        .filter(|id| ancestors.contains(id))
        .collect();
    if near.is_empty() { matching } else { near }
}
