//! Required subcommand for strata CLI

use clap::Args;
use std::path::PathBuf;

/// Arguments for the required subcommand
#[derive(Args, Debug)]
pub struct RequiredArgs {
    /// File to inspect
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output format: yaml, json, json-pretty, jsonl, toml or properties
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Inspect the decoded documents as written, without layering
    #[arg(long)]
    pub raw: bool,
}
