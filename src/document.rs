//! Documents and their merge lineage.
//!
//! Documents live in an arena ([`DocumentSet`]); lineage links are arena
//! indices ([`DocId`]) so that the parent/child graph never holds live
//! references into document data.

use crate::value::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Index of a document inside a [`DocumentSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(usize);

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One logical unit of configuration data plus its lineage.
#[derive(Debug, Clone)]
pub struct Document {
    /// Diagnostic label: file path, index and transform lineage.
    pub label: String,
    pub data: Value,
    /// Documents this one inherits from or absorbed as patches. Never cleared.
    pub parents: BTreeSet<DocId>,
}

/// Arena owning every document of one evaluation.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    docs: Vec<Document>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document and return its id.
    pub fn add(
        &mut self,
        label: impl Into<String>,
        data: Value,
        parents: impl IntoIterator<Item = DocId>,
    ) -> DocId {
        let id = DocId(self.docs.len());
        self.docs.push(Document {
            label: label.into(),
            data,
            parents: parents.into_iter().collect(),
        });
        id
    }

    pub fn get(&self, id: DocId) -> &Document {
        &self.docs[id.0]
    }

    pub fn get_mut(&mut self, id: DocId) -> &mut Document {
        &mut self.docs[id.0]
    }

    pub fn label(&self, id: DocId) -> &str {
        &self.docs[id.0].label
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Transitive closure of `parents`, excluding the document itself.
    ///
    /// Lineage may contain cycles (a target records the patch merged into it
    /// while the patch names the target as its file parent).
    pub fn ancestors(&self, id: DocId) -> BTreeSet<DocId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<DocId> = self.get(id).parents.iter().copied().collect();
        while let Some(next) = stack.pop() {
            if next == id || !seen.insert(next) {
                continue;
            }
            stack.extend(self.get(next).parents.iter().copied());
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestors_transitive() {
        let mut set = DocumentSet::new();
        let a = set.add("a", Value::map(), []);
        let b = set.add("b", Value::map(), [a]);
        let c = set.add("c", Value::map(), [b]);

        let ancestors = set.ancestors(c);
        assert!(ancestors.contains(&a));
        assert!(ancestors.contains(&b));
        assert!(!ancestors.contains(&c));
        assert!(set.ancestors(a).is_empty());
    }

    #[test]
    fn test_ancestors_tolerate_cycles() {
        let mut set = DocumentSet::new();
        let a = set.add("a", Value::map(), []);
        let b = set.add("b", Value::map(), [a]);
        set.get_mut(a).parents.insert(b);

        assert_eq!(set.ancestors(a), BTreeSet::from([b]));
        assert_eq!(set.ancestors(b), BTreeSet::from([a]));
    }
}
