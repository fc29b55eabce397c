//! Structured error types for evaluation failures.
//!
//! Every failure is fatal to the evaluation that raised it. Errors carry a
//! machine-readable [`ErrorCode`] plus enough context (file, document label,
//! key path) to locate the offending directive.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // File layering
    MissingFile,
    InvalidFilename,
    CircularRef,
    ConflictingParent,

    // Pattern selection
    NoMatchFound,
    MultiMatch,
    MissingMatch,

    // Directive misuse
    UselessOverride,
    ExtraKeys,
    InvalidDirective,
    InvalidType,
    InvalidArguments,
    InvalidRepeat,

    // Resolution
    VariableNotFound,
    RefNotFound,
    RequiredField,

    // Formats and I/O
    UnknownFormat,
    Marshal,
    Unmarshal,
    Io,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingFile => "MISSING_FILE",
            ErrorCode::InvalidFilename => "INVALID_FILENAME",
            ErrorCode::CircularRef => "CIRCULAR_REF",
            ErrorCode::ConflictingParent => "CONFLICTING_PARENT",
            ErrorCode::NoMatchFound => "NO_MATCH_FOUND",
            ErrorCode::MultiMatch => "MULTI_MATCH",
            ErrorCode::MissingMatch => "MISSING_MATCH",
            ErrorCode::UselessOverride => "USELESS_OVERRIDE",
            ErrorCode::ExtraKeys => "EXTRA_KEYS",
            ErrorCode::InvalidDirective => "INVALID_DIRECTIVE",
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::InvalidArguments => "INVALID_ARGUMENTS",
            ErrorCode::InvalidRepeat => "INVALID_REPEAT",
            ErrorCode::VariableNotFound => "VARIABLE_NOT_FOUND",
            ErrorCode::RefNotFound => "REF_NOT_FOUND",
            ErrorCode::RequiredField => "REQUIRED_FIELD",
            ErrorCode::UnknownFormat => "UNKNOWN_FORMAT",
            ErrorCode::Marshal => "MARSHAL",
            ErrorCode::Unmarshal => "UNMARSHAL",
            ErrorCode::Io => "IO",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured evaluation error.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{code}: {message}{}", location(.file, .document, .path))]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn location(file: &Option<PathBuf>, document: &Option<String>, path: &Option<String>) -> String {
    let mut parts = Vec::new();
    if let Some(file) = file {
        parts.push(format!("file {}", file.display()));
    }
    if let Some(document) = document {
        parts.push(format!("document {}", document));
    }
    if let Some(path) = path
        && !path.is_empty()
    {
        parts.push(format!("key {}", path));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" (at {})", parts.join(", "))
    }
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: None,
            document: None,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach a document label unless a more specific one is already set.
    pub fn in_document(mut self, document: &str) -> Self {
        if self.document.is_none() {
            self.document = Some(document.to_string());
        }
        self
    }

    /// Attach a file unless one is already set.
    pub fn in_file(mut self, file: &Path) -> Self {
        if self.file.is_none() {
            self.file = Some(file.to_path_buf());
        }
        self
    }

    // Convenience constructors

    pub fn missing_file(path: &Path) -> Self {
        Self::new(
            ErrorCode::MissingFile,
            format!("File not found: {}", path.display()),
        )
        .with_file(path)
    }

    pub fn invalid_filename(path: &Path, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFilename,
            format!("Invalid filename '{}': {}", path.display(), reason),
        )
        .with_file(path)
    }

    pub fn circular_file(chain: &[PathBuf], repeated: &Path) -> Self {
        let mut names: Vec<String> = chain.iter().map(|p| p.display().to_string()).collect();
        names.push(repeated.display().to_string());
        Self::new(
            ErrorCode::CircularRef,
            format!("Circular parent reference: {}", names.join(" -> ")),
        )
        .with_file(repeated)
    }

    pub fn recursion_limit(limit: usize) -> Self {
        Self::new(
            ErrorCode::CircularRef,
            format!("Reference expansion exceeded the recursion limit of {}", limit),
        )
    }

    pub fn conflicting_parent(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConflictingParent, reason)
    }

    pub fn no_match(pattern: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::NoMatchFound,
            format!("No match found for pattern {}", pattern),
        )
    }

    pub fn multi_match(pattern: impl fmt::Display, count: usize) -> Self {
        Self::new(
            ErrorCode::MultiMatch,
            format!("Pattern {} matched {} documents, expected exactly one", pattern, count),
        )
    }

    pub fn missing_match(pattern: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MissingMatch,
            format!("No document matches reference pattern {}", pattern),
        )
    }

    pub fn useless_override(path: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::UselessOverride,
            format!("Useless override: {}", reason),
        )
        .with_path(path)
    }

    pub fn extra_keys(directive: &str, keys: &[&str]) -> Self {
        Self::new(
            ErrorCode::ExtraKeys,
            format!(
                "Directive {} does not allow sibling keys (found: {})",
                directive,
                keys.join(", ")
            ),
        )
    }

    pub fn invalid_directive(key: &str) -> Self {
        Self::new(
            ErrorCode::InvalidDirective,
            format!("Unknown directive {}", key),
        )
    }

    pub fn invalid_type(what: &str, expected: &str, found: &str) -> Self {
        Self::new(
            ErrorCode::InvalidType,
            format!("{} expects {}, found {}", what, expected, found),
        )
    }

    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArguments, reason)
    }

    pub fn invalid_repeat(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRepeat, reason)
    }

    pub fn variable_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::VariableNotFound,
            format!("Variable not found: {}", name),
        )
    }

    pub fn ref_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::RefNotFound,
            format!("Reference not found: {}", reference),
        )
    }

    pub fn required_field(path: &str) -> Self {
        Self::new(
            ErrorCode::RequiredField,
            "Required field was never provided".to_string(),
        )
        .with_path(path)
    }

    pub fn unknown_format(name: &str) -> Self {
        Self::new(ErrorCode::UnknownFormat, format!("Unknown format: {}", name))
    }

    pub fn marshal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Marshal, err.to_string())
    }

    pub fn unmarshal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Unmarshal, err.to_string())
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return Self::missing_file(path);
        }
        Self::new(ErrorCode::Io, err.to_string()).with_file(path)
    }
}

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_context() {
        let err = Error::unknown_format("xml");
        assert_eq!(err.to_string(), "UNKNOWN_FORMAT: Unknown format: xml");
    }

    #[test]
    fn test_display_with_context() {
        let err = Error::useless_override("spec.replicas", "value is unchanged")
            .in_document("app.yaml#0")
            .in_file(Path::new("app.yaml"));
        assert_eq!(
            err.to_string(),
            "USELESS_OVERRIDE: Useless override: value is unchanged \
             (at file app.yaml, document app.yaml#0, key spec.replicas)"
        );
    }

    #[test]
    fn test_in_document_keeps_inner_label() {
        let err = Error::ref_not_found("a.b")
            .in_document("inner")
            .in_document("outer");
        assert_eq!(err.document.as_deref(), Some("inner"));
    }

    #[test]
    fn test_io_not_found_maps_to_missing_file() {
        let err = Error::io(
            Path::new("nope.yaml"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert_eq!(err.code, ErrorCode::MissingFile);
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::NoMatchFound).unwrap();
        assert_eq!(json, "\"NO_MATCH_FOUND\"");
    }
}
