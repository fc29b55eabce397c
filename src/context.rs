//! Evaluation context: the variables visible to phase-B directives.

use crate::value::{Value, directive};
use std::collections::BTreeMap;

/// Variables available while processing one document copy.
///
/// Keys are full symbols: `$env:NAME`, `$repeat`, `$repeat:NAME`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalContext {
    vars: BTreeMap<String, Value>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with the given environment variables.
    pub fn with_env<K, V>(env: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut ctx = Self::new();
        for (name, value) in env {
            ctx.set_env(name.as_ref(), value);
        }
        ctx
    }

    /// Context seeded with the current process environment.
    pub fn from_process_env() -> Self {
        Self::with_env(std::env::vars())
    }

    pub fn set_env(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(
            format!("{}{}", directive::ENV_PREFIX, name),
            Value::String(value.into()),
        );
    }

    /// Bind a variable by its full symbol.
    pub fn bind(&mut self, symbol: impl Into<String>, value: Value) {
        self.vars.insert(symbol.into(), value);
    }

    pub fn get(&self, symbol: &str) -> Option<&Value> {
        self.vars.get(symbol)
    }
}

/// Symbol under which a `$repeat` dimension is bound.
pub fn repeat_symbol(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{}{}", directive::REPEAT_PREFIX, name),
        None => directive::REPEAT.to_string(),
    }
}
