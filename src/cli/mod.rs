//! CLI command definitions for strata
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod diff;
pub mod eval;
pub mod intersect;
pub mod required;

use crate::error::{Error, Result};
use crate::eval::Evaluator;
use crate::format::Format;
use crate::settings::Settings;
use crate::value::Value;
use clap::{Parser, Subcommand};
use diff::DiffArgs;
use eval::EvalArgs;
use intersect::IntersectArgs;
use required::RequiredArgs;
use std::path::{Path, PathBuf};

/// Layered configuration evaluator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to settings file (overrides STRATA_SETTINGS and the user config dir)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate layered files and print every output document
    Eval(EvalArgs),
    /// Print the patch that turns one file's outputs into another's
    Diff(DiffArgs),
    /// Print the structure common to several files
    Intersect(IntersectArgs),
    /// Print the skeleton of fields still marked $required
    Required(RequiredArgs),
}

/// Pick the output format: explicit flag, then settings, then the first input.
pub fn resolve_format(
    explicit: Option<&str>,
    settings: &Settings,
    first_input: Option<&Path>,
) -> Result<Format> {
    if let Some(name) = explicit {
        return Format::from_name(name);
    }
    if let Some(format) = settings.output_format()? {
        return Ok(format);
    }
    match first_input {
        Some(path) => Format::from_path(path),
        None => Ok(Format::Yaml),
    }
}

/// Outputs of one input file: fully evaluated, or just decoded when `raw`.
pub fn read_outputs(evaluator: &Evaluator, path: &Path, raw: bool) -> Result<Vec<Value>> {
    if !raw {
        return evaluator.evaluate_file(path);
    }
    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    format.decode_stream(&content).map_err(|e| e.in_file(path))
}

/// Write rendered text to `output`, or stdout when absent.
pub fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text).map_err(|e| Error::io(path, e)),
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .map_err(|e| Error::io(Path::new("<stdout>"), e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_eval_with_globals() {
        let cli = Cli::try_parse_from([
            "strata", "-v", "eval", "a.yaml", "b.yaml", "--format", "json", "--log", "off",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log, "off");
        match cli.command {
            Command::Eval(args) => {
                assert_eq!(args.files, vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]);
                assert_eq!(args.format.as_deref(), Some("json"));
                assert!(!args.no_validate);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_format_order() {
        let mut settings = Settings::default();
        let input = Path::new("conf/app.toml");

        assert_eq!(
            resolve_format(Some("json"), &settings, Some(input)).unwrap(),
            Format::Json
        );
        assert_eq!(resolve_format(None, &settings, Some(input)).unwrap(), Format::Toml);
        assert_eq!(resolve_format(None, &settings, None).unwrap(), Format::Yaml);

        settings.output_format = Some("jsonl".to_string());
        assert_eq!(resolve_format(None, &settings, Some(input)).unwrap(), Format::Jsonl);

        let err = resolve_format(Some("xml"), &settings, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownFormat);
    }

    #[test]
    fn test_read_outputs_raw_skips_layering() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.yaml"), "a: 1\n").unwrap();
        let child = temp.path().join("app.prod.yaml");
        std::fs::write(&child, "b: $required\n").unwrap();

        let evaluator = Evaluator::new(Settings {
            inherit_env: false,
            ..Settings::default()
        });
        let raw = read_outputs(&evaluator, &child, true).unwrap();
        assert_eq!(raw, vec![Format::Yaml.decode("b: $required").unwrap()]);

        let err = read_outputs(&evaluator, &child, false).unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredField);
    }

    #[test]
    fn test_write_output_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.yaml");
        write_output("a: 1\n", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a: 1\n");
    }
}
