// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for chat2tana.
//!
//! This binary provides the `chat2tana` command for converting ChatGPT
//! exports into Tana input events, written as JSON Lines.

use chat2tana::config::{self, Config, ConfigError};
use chat2tana::converter::{self, Conversion, ConvertOptions};
use chat2tana::parser;
use lexopt::prelude::*;
use snafu::{ensure, prelude::*};
use std::path::{Path, PathBuf};
use tracing::Level;
use walkdir::WalkDir;

/// Where to write the events.
#[derive(Clone)]
enum OutputTarget {
    /// Write one `.jsonl` file per input to the specified directory.
    Directory(PathBuf),
    /// Write to stdout.
    Stdout,
}

#[allow(clippy::struct_excessive_bools)]
struct Cli {
    input: Vec<PathBuf>,
    output: OutputTarget,
    destination: Option<String>,
    timezone: Option<String>,
    budget: Option<String>,
    quiet: bool,
    verbose: bool,
    dry_run: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("at least one input file or directory is required"))]
    NoInputFiles,

    #[snafu(display("{source}"))]
    Config { source: ConfigError },

    #[snafu(display("failed to create output directory: {source}"))]
    CreateOutputDir { source: std::io::Error },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse {}: {source}", path.display()))]
    ParseFile {
        path: PathBuf,
        source: parser::ParseError,
    },

    #[snafu(display("failed to serialize events for {}: {source}", path.display()))]
    SerializeEvents {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("invalid input filename: no file stem"))]
    InvalidFilename,

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert ChatGPT exports to Tana input events

Usage: {name} [OPTIONS] -o <OUTPUT> <INPUT>...

Arguments:
  <INPUT>...  Export JSON files or directories containing them

Options:
  -o, --output <OUTPUT>       Output directory for .jsonl files (or - for stdout)
      --destination <ID>      Tana node receiving the conversations
                              (default: ${destination_var})
      --timezone <TZ>         Time zone for conversation titles, e.g. Europe/Berlin
                              (default: ${timezone_var}, else local time)
      --budget <BYTES>        Maximum serialized size of one event's node
                              (default: ${budget_var}, else 4800)

Other options:
  -q, --quiet                 Suppress progress messages
  -v, --verbose               Log skipped turns and batching decisions
  -n, --dry-run               Show what would be written without writing
  -f, --force                 Overwrite existing output files
  -h, --help                  Print help
  -V, --version               Print version",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        destination_var = config::DESTINATION_VAR,
        timezone_var = config::TIMEZONE_VAR,
        budget_var = config::BUDGET_VAR,
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input = Vec::new();
    let mut output: Option<OutputTarget> = None;
    let mut destination = None;
    let mut timezone = None;
    let mut budget = None;
    let mut quiet = false;
    let mut verbose = false;
    let mut dry_run = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = Some(if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::Directory(val)
                });
            }
            Long("destination") => destination = Some(parser.value()?.string()?),
            Long("timezone") => timezone = Some(parser.value()?.string()?),
            Long("budget") => budget = Some(parser.value()?.string()?),
            Short('q') | Long("quiet") => quiet = true,
            Short('v') | Long("verbose") => verbose = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        output: output.ok_or("missing required option: --output")?,
        destination,
        timezone,
        budget,
        quiet,
        verbose,
        dry_run,
        force,
    })
}

/// Installs the stderr log subscriber.
fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Combines environment settings with command-line overrides.
fn resolve_options(cli: &Cli) -> Result<ConvertOptions, ConfigError> {
    let env = Config::from_env();
    Config {
        destination: cli.destination.clone().or(env.destination),
        timezone: cli.timezone.clone().or(env.timezone),
        budget: cli.budget.clone().or(env.budget),
    }
    .into_options()
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;
    init_logging(&cli);

    ensure!(!cli.input.is_empty(), NoInputFilesSnafu);
    let options = resolve_options(&cli).context(ConfigSnafu)?;

    // Collect all input files first
    let files = collect_input_files(&cli.input);

    match &cli.output {
        OutputTarget::Stdout => {
            for file in &files {
                process_to_stdout(file, &options, &cli)?;
            }
        }
        OutputTarget::Directory(dir) => {
            if !cli.dry_run {
                std::fs::create_dir_all(dir).context(CreateOutputDirSnafu)?;
            }
            for file in &files {
                process_file(file, dir, &options, &cli)?;
            }
        }
    }

    Ok(())
}

/// Collects all JSON files from the given inputs (files and directories).
fn collect_input_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// Reads, parses and converts one export file.
fn convert_file(input: &Path, options: &ConvertOptions) -> Result<Conversion, Error> {
    let json = std::fs::read_to_string(input).context(ReadFileSnafu { path: input })?;
    let conversations = parser::parse_export(&json).context(ParseFileSnafu { path: input })?;
    Ok(converter::create_events(&conversations, options))
}

/// Serializes events as JSON Lines, one event per line.
fn to_json_lines(conversion: &Conversion, input: &Path) -> Result<String, Error> {
    let mut out = String::new();
    for event in &conversion.events {
        let line = serde_json::to_string(event).context(SerializeEventsSnafu { path: input })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Describes a conversion for progress messages.
fn summarize(conversion: &Conversion) -> String {
    match conversion.reductions.len() {
        0 => format!("{} events", conversion.events.len()),
        n => format!(
            "{} events, {n} reductions to fit the payload budget",
            conversion.events.len()
        ),
    }
}

/// Converts a single file and writes its events to stdout.
fn process_to_stdout(input: &Path, options: &ConvertOptions, cli: &Cli) -> Result<(), Error> {
    let conversion = convert_file(input, options)?;

    if cli.dry_run {
        eprintln!("Would output {} ({})", input.display(), summarize(&conversion));
        return Ok(());
    }

    print!("{}", to_json_lines(&conversion, input)?);
    Ok(())
}

/// Converts a single file and writes its events to the output directory.
fn process_file(
    input: &Path,
    out_dir: &Path,
    options: &ConvertOptions,
    cli: &Cli,
) -> Result<(), Error> {
    let out_name = input.file_stem().context(InvalidFilenameSnafu)?;
    let out_path = out_dir.join(format!("{}.jsonl", out_name.to_string_lossy()));

    // Check if output exists and handle overwrite
    if out_path.exists() && !cli.force && !cli.dry_run {
        eprintln!(
            "Skipping {} (already exists, use --force to overwrite)",
            out_path.display()
        );
        return Ok(());
    }

    let conversion = convert_file(input, options)?;

    // Handle dry-run mode
    if cli.dry_run {
        eprintln!("Would write {} ({})", out_path.display(), summarize(&conversion));
        return Ok(());
    }

    let lines = to_json_lines(&conversion, input)?;
    std::fs::write(&out_path, lines).context(WriteFileSnafu { path: &out_path })?;

    if !cli.quiet {
        eprintln!("Wrote {} ({})", out_path.display(), summarize(&conversion));
    }
    Ok(())
}
