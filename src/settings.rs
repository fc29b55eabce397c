//! Evaluator settings.
//!
//! Settings are read from a YAML file and then overridden by environment
//! variables. Lookup order for the file:
//!
//! 1. `STRATA_SETTINGS`
//! 2. `<user config dir>/strata/settings.yaml`
//! 3. built-in defaults

use crate::error::{Error, ErrorCode, Result};
use crate::format::{DEFAULT_EXTENSIONS, Format};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default phase-A recursion budget.
pub const DEFAULT_RECURSION_LIMIT: usize = 1000;

/// Evaluator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum nested reference substitutions before reporting a cycle (default: 1000).
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,

    /// Default output format name for the CLI.
    #[serde(default)]
    pub output_format: Option<String>,

    /// Extensions tried, in order, for a parent named without one.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Seed `$env:` variables from the process environment (default: true).
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
            output_format: None,
            extensions: default_extensions(),
            inherit_env: default_inherit_env(),
        }
    }
}

fn default_recursion_limit() -> usize {
    DEFAULT_RECURSION_LIMIT
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_inherit_env() -> bool {
    true
}

impl Settings {
    /// Load settings from a YAML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut settings = Self::parse(&content).map_err(|e| e.in_file(path))?;
        settings.apply_env_overrides();
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load from `STRATA_SETTINGS` or the user config directory, falling back to defaults.
    pub fn load_or_default() -> Result<Self> {
        if let Ok(explicit) = std::env::var("STRATA_SETTINGS") {
            return Self::load(Path::new(&explicit));
        }
        if let Some(path) = Self::user_path()
            && path.exists()
        {
            return Self::load(&path);
        }
        let mut settings = Self::default();
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// `<user config dir>/strata/settings.yaml`, when a config dir is known.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("strata").join("settings.yaml"))
    }

    /// Parse settings from YAML text. An empty document yields defaults.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(Error::unmarshal)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `STRATA_RECURSION_LIMIT` and `STRATA_FORMAT` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(limit) = lookup("STRATA_RECURSION_LIMIT") {
            match limit.trim().parse() {
                Ok(limit) => self.recursion_limit = limit,
                Err(_) => warn!(value = %limit, "ignoring invalid STRATA_RECURSION_LIMIT"),
            }
        }
        if let Some(format) = lookup("STRATA_FORMAT") {
            self.output_format = Some(format);
        }
    }

    /// The configured output format, if any.
    pub fn output_format(&self) -> Result<Option<Format>> {
        self.output_format
            .as_deref()
            .map(Format::from_name)
            .transpose()
    }

    /// Check settings for values the evaluator cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(Error::new(
                ErrorCode::InvalidArguments,
                "settings.extensions must name at least one extension",
            ));
        }
        self.output_format()?;
        Ok(())
    }
}
