//! Diff subcommand for strata CLI
//!
//! Computes, per output pair, the patch that turns the source into the target.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the diff subcommand
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Source file (the layer the patch applies on top of)
    #[arg(value_name = "SRC")]
    pub source: PathBuf,

    /// Target file (what the patched source should become)
    #[arg(value_name = "DST")]
    pub target: PathBuf,

    /// Output format: yaml, json, json-pretty, jsonl, toml or properties
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Diff the decoded documents as written, without layering or evaluation
    #[arg(long)]
    pub raw: bool,
}
