//! Format adapters: decode and encode values in the supported syntaxes.
//!
//! Multi-document streams are separated by a line containing only `---`,
//! except `jsonl` where every non-empty line is one document.

use crate::error::{Error, Result};
use crate::value::{Map, Value};
use std::path::Path;

/// Stream separator line.
pub const DOCUMENT_SEPARATOR: &str = "---";

/// A supported serialization syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    JsonPretty,
    Jsonl,
    Toml,
    Properties,
}

/// File extensions searched when a parent layer is named without one.
pub const DEFAULT_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "jsonl", "toml", "properties"];

impl Format {
    /// Look up a format by name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            "json-pretty" => Ok(Format::JsonPretty),
            "jsonl" => Ok(Format::Jsonl),
            "toml" => Ok(Format::Toml),
            "properties" => Ok(Format::Properties),
            _ => Err(Error::unknown_format(name)),
        }
    }

    /// Select a format from a file's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::invalid_filename(path, "missing file extension"))?;
        Self::from_name(ext).map_err(|e| e.in_file(path))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::JsonPretty => "json-pretty",
            Format::Jsonl => "jsonl",
            Format::Toml => "toml",
            Format::Properties => "properties",
        }
    }

    /// Decode a single document.
    pub fn decode(&self, input: &str) -> Result<Value> {
        match self {
            Format::Yaml => serde_yaml::from_str(input).map_err(Error::unmarshal),
            Format::Json | Format::JsonPretty | Format::Jsonl => {
                serde_json::from_str(input).map_err(Error::unmarshal)
            }
            Format::Toml => toml::from_str(input).map_err(Error::unmarshal),
            Format::Properties => Ok(decode_properties(input)),
        }
    }

    /// Encode a single document. The result always ends with a newline.
    pub fn encode(&self, value: &Value) -> Result<String> {
        let mut out = match self {
            Format::Yaml => serde_yaml::to_string(value).map_err(Error::marshal)?,
            Format::Json | Format::Jsonl => serde_json::to_string(value).map_err(Error::marshal)?,
            Format::JsonPretty => serde_json::to_string_pretty(value).map_err(Error::marshal)?,
            Format::Toml => toml::to_string(value).map_err(Error::marshal)?,
            Format::Properties => encode_properties(value),
        };
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }

    /// Decode a multi-document stream. Empty and `null` documents are skipped.
    pub fn decode_stream(&self, input: &str) -> Result<Vec<Value>> {
        let chunks: Vec<String> = match self {
            Format::Jsonl => input
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
            _ => split_stream(input),
        };

        let mut docs = Vec::new();
        for chunk in chunks {
            if !has_content(&chunk) {
                continue;
            }
            let value = self.decode(&chunk)?;
            if !value.is_null() {
                docs.push(value);
            }
        }
        Ok(docs)
    }

    /// Encode several documents as one stream.
    pub fn encode_stream(&self, docs: &[Value]) -> Result<String> {
        let mut out = String::new();
        for (i, doc) in docs.iter().enumerate() {
            if i > 0 && *self != Format::Jsonl {
                out.push_str(DOCUMENT_SEPARATOR);
                out.push('\n');
            }
            out.push_str(&self.encode(doc)?);
        }
        Ok(out)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Format::from_name(s)
    }
}

/// Split text on separator lines.
fn split_stream(input: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in input.lines() {
        if line.trim_end() == DOCUMENT_SEPARATOR {
            chunks.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    chunks.push(current);
    chunks
}

/// Whether a chunk holds anything besides blank lines and comments.
fn has_content(chunk: &str) -> bool {
    chunk.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    })
}

/// Parse `key=value` / `key: value` lines into a nested map on dotted keys.
fn decode_properties(input: &str) -> Value {
    let mut root = Map::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(['=', ':']) {
            Some(idx) => (line[..idx].trim(), line[idx + 1..].trim()),
            None => (line, ""),
        };
        insert_dotted(&mut root, key, Value::String(value.to_string()));
    }
    Value::Map(root)
}

fn insert_dotted(map: &mut Map, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            map.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(Value::map);
            if !matches!(entry, Value::Map(_)) {
                *entry = Value::map();
            }
            if let Value::Map(child) = entry {
                insert_dotted(child, rest, value);
            }
        }
    }
}

/// Flatten a value into sorted `dotted.key=value` lines.
fn encode_properties(value: &Value) -> String {
    let mut lines = Vec::new();
    flatten_properties("", value, &mut lines);
    lines.join("\n")
}

fn flatten_properties(prefix: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Map(map) => {
            for (k, v) in map {
                flatten_properties(&crate::value::join_path(prefix, k), v, out);
            }
        }
        Value::List(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_properties(&crate::value::join_path(prefix, i), v, out);
            }
        }
        scalar => out.push(format!("{}={}", prefix, scalar.to_plain_string())),
    }
}
