//! Fixture execution
//!
//! The system under test is anything implementing [`FixtureRunner`]: it receives one fixture path and either returns
//! normally (pass) or signals a failure. [`run_fixture`] wraps a single invocation in the isolation boundary every
//! fixture gets: missing files never reach the runner, backend directives decide the expectation, and panics are
//! caught and turned into an outcome. A time limit is handed to the runner as a deadline; [`CommandRunner`] kills its
//! child process when the deadline passes.

use std::any::Any;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fixture_harness_core::directives::{BackendApplicability, applicability};
use thiserror::Error;

use crate::report::FixtureOutcome;

/// Number of trailing output lines kept in a command failure message.
const FAILURE_TAIL_LINES: usize = 20;

/// How often a running child is checked against its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A failure signalled by the system under test.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FixtureFailure {
    pub message: String,
    /// The run was stopped because it passed its deadline
    pub timed_out: bool,
}

impl FixtureFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

/// The system under test.
///
/// Implementations must be hermetic: a run may not depend on, or leave behind, state another run observes. Runs of
/// different fixtures may happen concurrently.
pub trait FixtureRunner: Send + Sync {
    fn run(&self, fixture: &Path) -> Result<(), FixtureFailure>;

    /// Run with an optional deadline.
    ///
    /// Runners that can stop early should do so once `deadline` passes and return
    /// [`FixtureFailure::deadline_exceeded`]. The default ignores the deadline; the caller still reports the run as
    /// timed out, but cannot stop it.
    fn run_until(&self, fixture: &Path, deadline: Option<Instant>) -> Result<(), FixtureFailure> {
        let _ = deadline;
        self.run(fixture)
    }
}

impl<F, E> FixtureRunner for F
where
    F: Fn(&Path) -> Result<(), E> + Send + Sync,
    E: fmt::Display,
{
    fn run(&self, fixture: &Path) -> Result<(), FixtureFailure> {
        self(fixture).map_err(|e| FixtureFailure::new(e.to_string()))
    }
}

/// Runs an external program once per fixture, with the fixture path as last argument.
///
/// Each run gets a fresh temporary working directory (also exported as `FIXTURE_WORK_DIR`), removed afterwards.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build a runner from `program arg...`; `None` if `command` is empty.
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone()).with_args(args.iter().cloned()))
    }
}

impl FixtureRunner for CommandRunner {
    fn run(&self, fixture: &Path) -> Result<(), FixtureFailure> {
        self.run_until(fixture, None)
    }

    fn run_until(&self, fixture: &Path, deadline: Option<Instant>) -> Result<(), FixtureFailure> {
        let work_dir = tempfile::Builder::new()
            .prefix("fixture-")
            .tempdir()
            .map_err(|e| FixtureFailure::new(format!("failed to create working directory: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(fixture)
            .current_dir(work_dir.path())
            .env("FIXTURE_WORK_DIR", work_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FixtureFailure::new(format!("failed to run `{}`: {e}", self.program)))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_until(&mut child, deadline)
            .map_err(|e| FixtureFailure::new(format!("failed to wait for `{}`: {e}", self.program)))?;
        let Some(status) = status else {
            // Grandchildren may still hold the pipes open, so the readers are left to finish on their own.
            tracing::debug!(program = %self.program, fixture = %fixture.display(), "killed fixture process");
            return Err(FixtureFailure::deadline_exceeded(format!(
                "`{}` was killed after passing its time limit",
                self.program
            )));
        };

        let output = Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        };
        if output.status.success() {
            Ok(())
        } else {
            Err(FixtureFailure::new(describe_failure(&output)))
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                tracing::debug!(error = %e, "failed to read fixture output");
            }
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|r| r.join().ok()).unwrap_or_default()
}

/// Wait for `child` to exit. Past `deadline` the child is killed and reaped, and `None` is returned.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let body = if stderr.trim().is_empty() { stdout } else { stderr };
    let tail = tail_lines(&body, FAILURE_TAIL_LINES);
    if tail.is_empty() {
        output.status.to_string()
    } else {
        format!("{}\n{}", output.status, tail)
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

/// A manifest entry resolved against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFixture {
    pub name: String,
    /// Absolute path handed to the runner
    pub path: PathBuf,
    /// Path relative to the suite root, for reporting
    pub display_path: PathBuf,
}

impl ResolvedFixture {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, display_path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: name.into(),
            path: std::path::absolute(&path).unwrap_or(path),
            display_path: display_path.into(),
        }
    }
}

/// Run one fixture through `runner`.
///
/// Never panics and never propagates the runner's failure: every path ends in a [`FixtureOutcome`]. With a
/// `timeout`, the runner gets a deadline and a run that reports passing it becomes [`FixtureOutcome::TimedOut`].
pub fn run_fixture(
    fixture: &ResolvedFixture,
    runner: &dyn FixtureRunner,
    backend: Option<&str>,
    timeout: Option<Duration>,
) -> FixtureOutcome {
    if !fixture.path.is_file() {
        tracing::warn!(fixture = %fixture.name, path = %fixture.path.display(), "stale manifest entry");
        return FixtureOutcome::Missing {
            path: fixture.display_path.clone(),
        };
    }

    let start = Instant::now();
    let expect_failure = match backend {
        None => false,
        Some(backend) => {
            let text = match fs::read_to_string(&fixture.path) {
                Ok(text) => text,
                Err(e) => {
                    return FixtureOutcome::Failed {
                        duration: start.elapsed(),
                        reason: format!("failed to read fixture: {e}"),
                    };
                }
            };
            match applicability(&text, backend) {
                BackendApplicability::NotApplicable => {
                    return FixtureOutcome::Skipped {
                        reason: format!("not targeted at backend {backend}"),
                    };
                }
                BackendApplicability::ExpectedFailure => true,
                BackendApplicability::Applies => false,
            }
        }
    };

    tracing::debug!(fixture = %fixture.name, "running fixture");
    let deadline = timeout.and_then(|limit| start.checked_add(limit));
    let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run_until(&fixture.path, deadline)));
    let duration = start.elapsed();

    match (result, expect_failure) {
        (Ok(Err(failure)), _) if failure.timed_out => FixtureOutcome::TimedOut {
            limit: timeout.unwrap_or(duration),
        },
        (Ok(Ok(())), false) => FixtureOutcome::Passed { duration },
        (Ok(Err(failure)), false) => FixtureOutcome::Failed {
            duration,
            reason: failure.message,
        },
        (Err(payload), false) => FixtureOutcome::Errored {
            duration,
            reason: panic_message(payload.as_ref()),
        },
        (Ok(Ok(())), true) => FixtureOutcome::XPassed { duration },
        (Ok(Err(failure)), true) => FixtureOutcome::XFailed {
            duration,
            reason: failure.message,
        },
        (Err(payload), true) => FixtureOutcome::XFailed {
            duration,
            reason: panic_message(payload.as_ref()),
        },
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("runner panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("runner panicked: {s}")
    } else {
        "runner panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir, name: &str, content: &str) -> ResolvedFixture {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        ResolvedFixture::new(format!("test_{name}"), path, name)
    }

    fn ok(_: &Path) -> Result<(), String> {
        Ok(())
    }

    fn fail(_: &Path) -> Result<(), String> {
        Err("diagnostics differ".to_string())
    }

    #[test]
    fn test_closure_runner_pass() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "");
        assert!(matches!(run_fixture(&f, &ok, None, None), FixtureOutcome::Passed { .. }));
    }

    #[test]
    fn test_runner_receives_absolute_path() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "");
        let check = |p: &Path| if p.is_absolute() { Ok(()) } else { Err("relative path") };
        assert!(matches!(run_fixture(&f, &check, None, None), FixtureOutcome::Passed { .. }));
    }

    #[test]
    fn test_failure_carries_reason() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "");
        match run_fixture(&f, &fail, None, None) {
            FixtureOutcome::Failed { reason, .. } => assert_eq!(reason, "diagnostics differ"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_panic_is_caught() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "");
        let boom = |_: &Path| -> Result<(), String> { panic!("compiler crashed") };
        match run_fixture(&f, &boom, None, None) {
            FixtureOutcome::Errored { reason, .. } => assert!(reason.contains("compiler crashed")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_never_reaches_runner() {
        let dir = TempDir::new().unwrap();
        let f = ResolvedFixture::new("testGone", dir.path().join("gone.kt"), "gone.kt");
        let unreachable = |_: &Path| -> Result<(), String> { panic!("runner must not be called") };
        assert_eq!(
            run_fixture(&f, &unreachable, None, None),
            FixtureOutcome::Missing {
                path: PathBuf::from("gone.kt")
            }
        );
    }

    #[test]
    fn test_untargeted_backend_is_skipped() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "// TARGET_BACKEND: JVM_IR\n");
        assert!(matches!(run_fixture(&f, &ok, Some("JS"), None), FixtureOutcome::Skipped { .. }));
        assert!(matches!(run_fixture(&f, &ok, Some("JVM_IR"), None), FixtureOutcome::Passed { .. }));
    }

    #[test]
    fn test_ignored_backend_inverts_expectation() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "// IGNORE_BACKEND: JS\n");
        assert!(matches!(run_fixture(&f, &fail, Some("JS"), None), FixtureOutcome::XFailed { .. }));
        assert!(matches!(run_fixture(&f, &ok, Some("JS"), None), FixtureOutcome::XPassed { .. }));
        assert!(matches!(run_fixture(&f, &fail, None, None), FixtureOutcome::Failed { .. }));
    }

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("", 2), "");
    }

    #[test]
    fn test_command_runner_from_command_line() {
        assert!(CommandRunner::from_command_line(&[]).is_none());
        let runner = CommandRunner::from_command_line(&["kotlinc".to_string(), "-Werror".to_string()]).unwrap();
        assert_eq!(runner.program, "kotlinc");
        assert_eq!(runner.args, vec!["-Werror"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runner_exit_status() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "");

        let pass = CommandRunner::new("true");
        assert!(matches!(run_fixture(&f, &pass, None, None), FixtureOutcome::Passed { .. }));

        let failing = CommandRunner::new("sh").with_args(["-c", "echo broken >&2; exit 3"]);
        match run_fixture(&f, &failing, None, None) {
            FixtureOutcome::Failed { reason, .. } => {
                assert!(reason.contains("broken"), "{reason}");
                assert!(reason.contains('3'), "{reason}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runner_runs_in_scratch_dir() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "");
        // The working directory is fresh and empty for every run.
        let runner = CommandRunner::new("sh").with_args(["-c", "test -z \"$(ls -A)\" && touch marker"]);
        assert!(matches!(run_fixture(&f, &runner, None, None), FixtureOutcome::Passed { .. }));
        assert!(matches!(run_fixture(&f, &runner, None, None), FixtureOutcome::Passed { .. }));
    }

    struct StopsAtDeadline;

    impl FixtureRunner for StopsAtDeadline {
        fn run(&self, _: &Path) -> Result<(), FixtureFailure> {
            Ok(())
        }

        fn run_until(&self, fixture: &Path, deadline: Option<Instant>) -> Result<(), FixtureFailure> {
            match deadline {
                Some(_) => Err(FixtureFailure::deadline_exceeded("stopped")),
                None => self.run(fixture),
            }
        }
    }

    #[test]
    fn test_deadline_failure_becomes_timeout() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "");
        let limit = Duration::from_millis(5);
        assert_eq!(run_fixture(&f, &StopsAtDeadline, None, Some(limit)), FixtureOutcome::TimedOut { limit });
        assert!(matches!(run_fixture(&f, &StopsAtDeadline, None, None), FixtureOutcome::Passed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runner_kills_child_at_deadline() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "slow.kt", "");
        let marker = dir.path().join("slow.kt.marker");
        let runner = CommandRunner::new("sh").with_args(["-c", "sleep 1; touch \"$1.marker\"", "sh"]);

        let limit = Duration::from_millis(100);
        let start = Instant::now();
        assert_eq!(run_fixture(&f, &runner, None, Some(limit)), FixtureOutcome::TimedOut { limit });
        assert!(start.elapsed() < Duration::from_millis(900), "run was not stopped at its deadline");

        // A surviving child would create the marker once its sleep ends.
        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runner_within_deadline_passes() {
        let dir = TempDir::new().unwrap();
        let f = fixture(&dir, "a.kt", "");
        let runner = CommandRunner::new("true");
        assert!(matches!(
            run_fixture(&f, &runner, None, Some(Duration::from_secs(10))),
            FixtureOutcome::Passed { .. }
        ));
    }
}
