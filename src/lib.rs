//! strata: layered configuration evaluation
//!
//! This module exports the evaluation engine for the CLI, tests and embedders.

pub mod cli;
pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod eval;
pub mod format;
pub mod loader;
pub mod merge;
pub mod ops;
pub mod pattern;
pub mod settings;
pub mod value;

pub use context::EvalContext;
pub use error::{Error, ErrorCode, Result};
pub use eval::Evaluator;
pub use format::Format;
pub use settings::Settings;
pub use value::Value;
