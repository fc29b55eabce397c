//! File resolver: discovers a file's ancestor layers and loads them.
//!
//! A file's parents come from, in order of precedence:
//!
//! 1. an explicit `$parent` key in its documents (`false`/`null` = none)
//! 2. the target name, when the path is a symlink
//! 3. the naming convention `base.layer.ext` -> `base.<ext>`
//!
//! Parents are loaded before their children, so the load order is ready to be
//! folded by the merge engine.

use crate::document::{DocId, DocumentSet};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::settings::Settings;
use crate::value::{Value, directive};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Symlinks followed when resolving a conventional parent.
const MAX_SYMLINK_HOPS: usize = 40;

/// Loads files and their ancestors into a [`DocumentSet`].
#[derive(Debug)]
pub struct Loader {
    extensions: Vec<String>,
    docs: DocumentSet,
    order: Vec<DocId>,
    loaded: HashMap<PathBuf, Vec<DocId>>,
    stack: Vec<PathBuf>,
}

/// What a file's documents say about its parents.
#[derive(Debug, Clone, PartialEq)]
enum ParentDecl {
    None,
    Paths(Vec<String>),
}

impl Loader {
    pub fn new(settings: &Settings) -> Self {
        Self {
            extensions: settings.extensions.clone(),
            docs: DocumentSet::new(),
            order: Vec::new(),
            loaded: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Load `path` and its ancestors, returning the documents of `path` itself.
    ///
    /// A file reached a second time (diamond inheritance) is not reloaded.
    pub fn load(&mut self, path: &Path) -> Result<Vec<DocId>> {
        let key = identity(path);
        if self.stack.contains(&key) {
            return Err(Error::circular_file(&self.stack, path));
        }
        if let Some(ids) = self.loaded.get(&key) {
            trace!(path = %path.display(), "file already loaded");
            return Ok(ids.clone());
        }

        let format = Format::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let values = format.decode_stream(&content).map_err(|e| e.in_file(path))?;

        let parents = self.parent_paths(path, &values).map_err(|e| e.in_file(path))?;

        self.stack.push(key.clone());
        let mut parent_ids = Vec::new();
        for parent in &parents {
            match self.load(parent) {
                Ok(ids) => parent_ids.extend(ids),
                Err(e) => {
                    self.stack.pop();
                    return Err(e);
                }
            }
        }
        self.stack.pop();

        debug!(
            path = %path.display(),
            documents = values.len(),
            parents = parents.len(),
            "loaded file"
        );

        let mut ids = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            let label = format!("{}#{}", path.display(), i);
            let id = self.docs.add(label, value, parent_ids.iter().copied());
            self.order.push(id);
            ids.push(id);
        }
        self.loaded.insert(key, ids.clone());
        Ok(ids)
    }

    /// Consume the loader, returning the arena and the merge order.
    pub fn finish(self) -> (DocumentSet, Vec<DocId>) {
        (self.docs, self.order)
    }

    fn parent_paths(&self, path: &Path, values: &[Value]) -> Result<Vec<PathBuf>> {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        match declared_parents(values)? {
            Some(ParentDecl::None) => Ok(Vec::new()),
            Some(ParentDecl::Paths(names)) => names
                .iter()
                .map(|name| self.resolve(dir, name))
                .collect(),
            None => self.conventional_parent(path, 0),
        }
    }

    /// Parent by naming convention, following symlinks to their target name.
    fn conventional_parent(&self, path: &Path, hops: usize) -> Result<Vec<PathBuf>> {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let is_link = std::fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_link {
            if hops >= MAX_SYMLINK_HOPS {
                return Err(Error::circular_file(&[], path));
            }
            let target = std::fs::read_link(path).map_err(|e| Error::io(path, e))?;
            trace!(link = %path.display(), target = %target.display(), "following symlink");
            return self.conventional_parent(&dir.join(target), hops + 1);
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::invalid_filename(path, "file name is not valid UTF-8"))?;
        let segments: Vec<&str> = name.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::invalid_filename(path, "empty dot-separated segment"));
        }
        if segments.len() < 3 {
            return Ok(Vec::new());
        }
        let stem = segments[..segments.len() - 2].join(".");
        Ok(vec![self.resolve(dir, &stem)?])
    }

    /// Resolve a parent name relative to `dir`.
    ///
    /// An existing file is used as is. Otherwise exactly one of
    /// `<name>.<ext>` must exist for the configured extensions.
    fn resolve(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let direct = dir.join(name);
        if direct.is_file() {
            return Ok(direct);
        }

        let mut found: Vec<PathBuf> = self
            .extensions
            .iter()
            .map(|ext| dir.join(format!("{}.{}", name, ext)))
            .filter(|candidate| candidate.is_file())
            .collect();
        match found.len() {
            0 => Err(Error::missing_file(&direct)),
            1 => Ok(found.remove(0)),
            n => Err(Error::multi_match(direct.display(), n).with_file(direct)),
        }
    }
}

/// Parent declaration shared by every document of a file, if any declares one.
fn declared_parents(values: &[Value]) -> Result<Option<ParentDecl>> {
    let mut declared: Option<ParentDecl> = None;
    for value in values {
        let Some(raw) = value.as_map().and_then(|m| m.get(directive::PARENT)) else {
            continue;
        };
        let decl = parse_parent(raw)?;
        if let Some(existing) = &declared
            && *existing != decl
        {
            return Err(Error::conflicting_parent(format!(
                "documents declare different parents: {:?} and {:?}",
                existing, decl
            )));
        }
        declared = Some(decl);
    }
    Ok(declared)
}

fn parse_parent(raw: &Value) -> Result<ParentDecl> {
    match raw {
        Value::Null | Value::Bool(false) => Ok(ParentDecl::None),
        Value::String(name) => Ok(ParentDecl::Paths(vec![name.clone()])),
        Value::List(items) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(name) => names.push(name.clone()),
                    Value::Null | Value::Bool(false) => {
                        return Err(Error::conflicting_parent(
                            "parent list mixes paths with 'no parent'",
                        ));
                    }
                    other => {
                        return Err(Error::invalid_type(
                            directive::PARENT,
                            "a path",
                            other.type_name(),
                        ));
                    }
                }
            }
            Ok(ParentDecl::Paths(names))
        }
        other => Err(Error::invalid_type(
            directive::PARENT,
            "a path, a list of paths, false or null",
            other.type_name(),
        )),
    }
}

/// Stable identity for cycle and diamond detection.
///
/// The directory is canonicalized but the file name is not, so a symlink and
/// its target stay distinct files.
fn identity(path: &Path) -> PathBuf {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    match (std::fs::canonicalize(dir), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}
