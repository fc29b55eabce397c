//! strata
//!
//! Evaluates layered YAML/JSON/TOML configuration and prints the outputs.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use strata::cli::diff::DiffArgs;
use strata::cli::eval::EvalArgs;
use strata::cli::intersect::IntersectArgs;
use strata::cli::required::RequiredArgs;
use strata::cli::{Cli, Command, read_outputs, resolve_format, write_output};
use strata::ops::{diff_document, intersect_all, required};
use strata::{Evaluator, Settings, Value};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let settings = match &cli.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::load_or_default()?,
    };
    settings.validate()?;
    debug!(?settings, "settings loaded");

    match cli.command {
        Command::Eval(args) => run_eval(settings, args)?,
        Command::Diff(args) => run_diff(settings, args)?,
        Command::Intersect(args) => run_intersect(settings, args)?,
        Command::Required(args) => run_required(settings, args)?,
    }
    Ok(())
}

/// Initialize logging based on --log and --verbose; RUST_LOG takes over when set.
fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(|_| EnvFilter::from_default_env());

    macro_rules! install {
        ($builder:expr) => {
            match filter {
                Some(filter) => {
                    tracing::subscriber::set_global_default($builder.with_env_filter(filter).finish())?
                }
                None => tracing::subscriber::set_global_default($builder.with_max_level(level).finish())?,
            }
        };
    }

    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => install!(FmtSubscriber::builder().with_writer(std::io::stdout)),
        "2" | "stderr" => install!(FmtSubscriber::builder().with_writer(std::io::stderr)),
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)
                .with_context(|| format!("failed to open log file {}", filename))?;
            install!(FmtSubscriber::builder().with_writer(file).with_ansi(false))
        }
    }
    Ok(())
}

fn run_eval(settings: Settings, args: EvalArgs) -> Result<()> {
    let format = resolve_format(
        args.format.as_deref(),
        &settings,
        args.files.first().map(|p| p.as_path()),
    )?;
    let mut evaluator = Evaluator::new(settings);
    if args.no_validate {
        evaluator = evaluator.without_validation();
    }

    let mut outputs = Vec::new();
    for file in &args.files {
        let produced = evaluator.evaluate_file(file)?;
        info!(file = %file.display(), outputs = produced.len(), "evaluated");
        outputs.extend(produced);
    }

    let text = format.encode_stream(&outputs)?;
    write_output(&text, args.output.as_deref())?;
    Ok(())
}

fn run_diff(settings: Settings, args: DiffArgs) -> Result<()> {
    let format = resolve_format(args.format.as_deref(), &settings, Some(args.source.as_path()))?;
    let evaluator = Evaluator::new(settings).without_validation();
    let source = read_outputs(&evaluator, &args.source, args.raw)?;
    let target = read_outputs(&evaluator, &args.target, args.raw)?;

    if source.len() != target.len() {
        warn!(
            source = source.len(),
            target = target.len(),
            "output counts differ, unpaired outputs are ignored"
        );
    }
    let patches: Vec<Value> = source
        .iter()
        .zip(&target)
        .map(|(src, dst)| diff_document(src, dst))
        .collect();

    write_output(&format.encode_stream(&patches)?, None)?;
    Ok(())
}

fn run_intersect(settings: Settings, args: IntersectArgs) -> Result<()> {
    let format = resolve_format(
        args.format.as_deref(),
        &settings,
        args.files.first().map(|p| p.as_path()),
    )?;
    let evaluator = Evaluator::new(settings).without_validation();
    let inputs = args
        .files
        .iter()
        .map(|file| read_outputs(&evaluator, file, args.raw))
        .collect::<strata::Result<Vec<_>>>()?;

    let paired = inputs.iter().map(Vec::len).min().unwrap_or(0);
    if inputs.iter().any(|outputs| outputs.len() != paired) {
        warn!(paired, "output counts differ, unpaired outputs are ignored");
    }
    let common: Vec<Value> = (0..paired)
        .map(|i| {
            let column: Vec<Value> = inputs.iter().map(|outputs| outputs[i].clone()).collect();
            intersect_all(&column)
        })
        .collect();

    write_output(&format.encode_stream(&common)?, None)?;
    Ok(())
}

fn run_required(settings: Settings, args: RequiredArgs) -> Result<()> {
    let format = resolve_format(args.format.as_deref(), &settings, Some(args.file.as_path()))?;
    let evaluator = Evaluator::new(settings).without_validation();
    let skeletons: Vec<Value> = read_outputs(&evaluator, &args.file, args.raw)?
        .iter()
        .filter_map(required)
        .collect();
    if skeletons.is_empty() {
        info!(file = %args.file.display(), "no required fields");
        return Ok(());
    }

    write_output(&format.encode_stream(&skeletons)?, None)?;
    Ok(())
}
