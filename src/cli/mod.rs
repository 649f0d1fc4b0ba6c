//! CLI module for the fixture harness
//!
//! ## Commands
//!
//! - `run --manifest <file> -- <program> [args...]` - Run a whole suite (coverage checks plus every fixture)
//! - `run-one <fixture> -- <program> [args...]` - Run a single fixture through the same isolation boundary
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::error::HarnessError;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// The suite ran and something failed
    pub const FAILURE: ExitCode = ExitCode(1);
    /// The suite could not be set up (bad arguments, unreadable manifest)
    pub const USAGE: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a usage error (exit code 2).
    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::USAGE)
    }
}

impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        let rendered = format!("{:?}", miette::Report::new(err));
        Self::usage(rendered)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Fixture conformance harness
#[derive(Parser, Debug)]
#[command(name = "fixture-harness")]
#[command(version = VERSION)]
#[command(about = "Check fixture directories against their manifest and run every fixture", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Output format of a suite run
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a whole suite
    Run {
        /// Manifest file declaring the suite
        #[arg(short, long, value_name = "FILE")]
        manifest: PathBuf,
        /// Override the fixture root declared in the manifest
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Target backend used to evaluate in-file backend directives
        #[arg(long, value_name = "BACKEND")]
        backend: Option<String>,
        /// Only run fixtures whose name contains this keyword
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        fail_fast: bool,
        /// Number of fixtures to run at once
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,
        /// Per-fixture time limit in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<f64>,
        /// Report format
        #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
        format: OutputFormat,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Disable ANSI colors in console output
        #[arg(long)]
        no_color: bool,
        /// Program (and leading arguments) invoked once per fixture with the fixture path appended
        #[arg(last = true, required = true, value_name = "PROGRAM")]
        command: Vec<String>,
    },

    /// Run a single fixture
    RunOne {
        /// Fixture file to run
        #[arg(value_name = "FIXTURE")]
        fixture: PathBuf,
        /// Target backend used to evaluate in-file backend directives
        #[arg(long, value_name = "BACKEND")]
        backend: Option<String>,
        /// Time limit in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<f64>,
        /// Program (and leading arguments) invoked with the fixture path appended
        #[arg(last = true, required = true, value_name = "PROGRAM")]
        command: Vec<String>,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Run {
            manifest,
            root,
            backend,
            filter,
            fail_fast,
            jobs,
            timeout,
            format,
            verbose,
            no_color,
            command,
        } => commands::run_suite(commands::SuiteArgs {
            manifest,
            root,
            backend,
            filter,
            fail_fast,
            jobs,
            timeout: commands::parse_timeout(timeout)?,
            format,
            verbose,
            color: !no_color,
            command,
        }),
        Command::RunOne {
            fixture,
            backend,
            timeout,
            command,
        } => commands::run_one(&fixture, backend.as_deref(), commands::parse_timeout(timeout)?, &command),
    }
}
