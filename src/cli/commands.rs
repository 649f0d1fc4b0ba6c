//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RunOptions;
use crate::error::HarnessError;
use crate::manifest::Manifest;
use crate::reporter::{ConsoleReporter, JsonReporter, SuiteReporter};
use crate::runner::{CommandRunner, FixtureRunner};
use crate::suite;

use super::{CliError, CliResult, ExitCode, OutputFormat};

/// Arguments of the `run` subcommand after parsing
#[derive(Debug)]
pub struct SuiteArgs {
    pub manifest: PathBuf,
    pub root: Option<PathBuf>,
    pub backend: Option<String>,
    pub filter: Option<String>,
    pub fail_fast: bool,
    pub jobs: Option<usize>,
    pub timeout: Option<Duration>,
    pub format: OutputFormat,
    pub verbose: bool,
    pub color: bool,
    pub command: Vec<String>,
}

/// Convert a `--timeout` value in seconds.
pub fn parse_timeout(secs: Option<f64>) -> CliResult<Option<Duration>> {
    let Some(secs) = secs else {
        return Ok(None);
    };
    match Duration::try_from_secs_f64(secs) {
        Ok(limit) if !limit.is_zero() => Ok(Some(limit)),
        _ => Err(CliError::usage(format!(
            "Error: --timeout must be a positive number of seconds, got {secs}"
        ))),
    }
}

fn command_runner(command: &[String]) -> CliResult<Arc<dyn FixtureRunner>> {
    let runner = CommandRunner::from_command_line(command)
        .ok_or_else(|| CliError::usage("Error: a program to run each fixture is required after `--`"))?;
    Ok(Arc::new(runner))
}

/// `run`: coverage checks plus every fixture of a manifest.
pub fn run_suite(args: SuiteArgs) -> CliResult<ExitCode> {
    let mut manifest = Manifest::load(&args.manifest).map_err(HarnessError::from)?;
    if let Some(root) = args.root {
        manifest.config.root = root;
    }
    if let Some(backend) = args.backend {
        manifest.config.target_backend = Some(backend);
    }

    let mut options = RunOptions::new().with_fail_fast(args.fail_fast);
    if let Some(jobs) = args.jobs {
        options = options.with_jobs(jobs);
    }
    if let Some(timeout) = args.timeout {
        options = options.with_timeout(timeout);
    }
    if let Some(filter) = args.filter {
        options = options.with_filter(filter);
    }

    let runner = command_runner(&args.command)?;
    let mut reporter: Box<dyn SuiteReporter> = match args.format {
        OutputFormat::Console => {
            let color = args.color && io::stdout().is_terminal();
            Box::new(ConsoleReporter::new(io::stdout(), args.verbose).with_color(color))
        }
        OutputFormat::Json => Box::new(JsonReporter::new(io::stdout())),
    };

    let report = suite::run_suite_blocking(&manifest, runner, &options, reporter.as_mut())?;
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        // The reporter already printed the failures
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

/// `run-one`: a single fixture, outside any manifest.
pub fn run_one(fixture: &Path, backend: Option<&str>, timeout: Option<Duration>, command: &[String]) -> CliResult<ExitCode> {
    let runner = command_runner(command)?;
    let report = suite::run_one(fixture, runner, backend, timeout)?;

    println!("{}::{} {}", report.path.display(), report.name, report.outcome.label());
    if let Some(detail) = report.outcome.detail() {
        for line in detail.lines() {
            println!("    {line}");
        }
    }

    if report.outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(None).unwrap(), None);
        assert_eq!(parse_timeout(Some(1.5)).unwrap(), Some(Duration::from_millis(1500)));
        assert_eq!(parse_timeout(Some(0.0)).unwrap_err().exit_code, ExitCode::USAGE);
        assert_eq!(parse_timeout(Some(-1.0)).unwrap_err().exit_code, ExitCode::USAGE);
    }

    #[test]
    fn test_missing_manifest_is_usage_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = run_suite(SuiteArgs {
            manifest: dir.path().join("absent.json"),
            root: None,
            backend: None,
            filter: None,
            fail_fast: false,
            jobs: None,
            timeout: None,
            format: OutputFormat::Json,
            verbose: false,
            color: false,
            command: vec!["true".into()],
        })
        .unwrap_err();
        assert_eq!(err.exit_code, ExitCode::USAGE);
        assert!(err.message.contains("absent.json"));
    }

    #[test]
    fn test_empty_command_is_usage_error() {
        let err = command_runner(&[]).err().unwrap();
        assert_eq!(err.exit_code, ExitCode::USAGE);
    }
}
