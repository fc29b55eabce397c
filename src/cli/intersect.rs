//! Intersect subcommand for strata CLI

use clap::Args;
use std::path::PathBuf;

/// Arguments for the intersect subcommand
#[derive(Args, Debug)]
pub struct IntersectArgs {
    /// Files to intersect; outputs are paired by index
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Output format: yaml, json, json-pretty, jsonl, toml or properties
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Intersect the decoded documents as written, without layering or evaluation
    #[arg(long)]
    pub raw: bool,
}
