//! Eval subcommand for strata CLI

use clap::Args;
use std::path::PathBuf;

/// Arguments for the eval subcommand
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Files to evaluate, each together with its ancestor layers
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Output format: yaml, json, json-pretty, jsonl, toml or properties
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Write outputs to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Do not fail on fields still marked $required
    #[arg(long)]
    pub no_validate: bool,
}
