//! Suite reporters (pytest-style console output and JSON)
//!
//! ## SuiteReporter Trait
//!
//! The executor calls a [`SuiteReporter`] as the run progresses. Reporting is kept out of execution so other output
//! formats only need a new implementation of the trait.

use std::io::Write;

use crate::report::{FixtureOutcome, FixtureReport, SuiteReport};

// ============================================================================
// Suite Reporter Trait
// ============================================================================

/// Trait for reporting suite progress and results.
pub trait SuiteReporter {
    /// Called once the manifest has been planned, with the number of fixtures about to run
    fn on_collection_complete(&mut self, fixture_count: usize);

    /// Called for each coverage check and each fixture as it finishes (completion order)
    fn on_fixture_complete(&mut self, fixture: &FixtureReport);

    /// Called once with the complete report
    fn on_run_complete(&mut self, report: &SuiteReport);
}

/// Reporter that prints nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl SuiteReporter for SilentReporter {
    fn on_collection_complete(&mut self, _fixture_count: usize) {}
    fn on_fixture_complete(&mut self, _fixture: &FixtureReport) {}
    fn on_run_complete(&mut self, _report: &SuiteReport) {}
}

// ============================================================================
// Console
// ============================================================================

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";

/// Default console reporter (pytest-style)
pub struct ConsoleReporter<W: Write> {
    out: W,
    pub verbose: bool,
    pub color: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out,
            verbose,
            color: true,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn emit(&mut self, line: &str) {
        // Best-effort: write errors are logged, never raised
        if let Err(e) = writeln!(self.out, "{line}") {
            tracing::debug!(error = %e, "console write failed");
        }
    }

    fn status(&self, outcome: &FixtureOutcome) -> String {
        let color = match outcome {
            FixtureOutcome::Passed { .. } => GREEN,
            FixtureOutcome::Skipped { .. } | FixtureOutcome::XFailed { .. } => YELLOW,
            _ => RED,
        };
        let mut status = self.paint(color, outcome.label());
        match outcome {
            FixtureOutcome::Skipped { reason } | FixtureOutcome::XFailed { reason, .. } => {
                status.push_str(&format!(" ({reason})"));
            }
            other => {
                if let Some(d) = other.duration() {
                    status.push_str(&format!(" ({}ms)", d.as_millis()));
                }
            }
        }
        status
    }

    fn location(fixture: &FixtureReport) -> String {
        if fixture.path.as_os_str().is_empty() {
            format!(".::{}", fixture.name)
        } else {
            format!("{}::{}", fixture.path.display(), fixture.name)
        }
    }

    fn progress_char(outcome: &FixtureOutcome) -> &'static str {
        match outcome {
            FixtureOutcome::Passed { .. } => ".",
            FixtureOutcome::Failed { .. } => "F",
            FixtureOutcome::Errored { .. } => "E",
            FixtureOutcome::TimedOut { .. } => "T",
            FixtureOutcome::Missing { .. } => "M",
            FixtureOutcome::Skipped { .. } => "s",
            FixtureOutcome::XFailed { .. } => "x",
            FixtureOutcome::XPassed { .. } => "X",
        }
    }
}

impl<W: Write> SuiteReporter for ConsoleReporter<W> {
    fn on_collection_complete(&mut self, fixture_count: usize) {
        let banner = self.paint("1", "=================== fixture session starts ===================");
        self.emit(&banner);
        self.emit(&format!("collected {fixture_count} fixture(s)"));
        self.emit("");
    }

    fn on_fixture_complete(&mut self, fixture: &FixtureReport) {
        if self.verbose {
            let line = format!("{} {}", Self::location(fixture), self.status(&fixture.outcome));
            self.emit(&line);
        } else {
            let ch = Self::progress_char(&fixture.outcome);
            let color = if fixture.outcome.is_success() { GREEN } else { RED };
            let ch = self.paint(color, ch);
            if let Err(e) = write!(self.out, "{ch}").and_then(|()| self.out.flush()) {
                tracing::debug!(error = %e, "console write failed");
            }
        }
    }

    fn on_run_complete(&mut self, report: &SuiteReport) {
        if !self.verbose {
            self.emit("");
        }

        let failures = report.failures();
        if !failures.is_empty() {
            self.emit("");
            let banner = self.paint("1;31", "=================== FAILURES ===================");
            self.emit(&banner);
            for fixture in failures {
                self.emit("");
                let title = self.paint("1", &format!("___________ {} ___________", fixture.name));
                self.emit(&title);
                if let Some(detail) = fixture.outcome.detail() {
                    self.emit("");
                    for line in detail.lines() {
                        self.emit(&format!("    {line}"));
                    }
                }
                self.emit("");
                self.emit(&format!("    {}", Self::location(fixture)));
            }
        }

        let summary = &report.summary;
        let counts = [
            (summary.passed, "passed"),
            (summary.failed, "failed"),
            (summary.errored, "errors"),
            (summary.timed_out, "timed out"),
            (summary.missing, "missing"),
            (summary.skipped, "skipped"),
            (summary.xfailed, "xfailed"),
            (summary.xpassed, "xpassed"),
            (summary.deselected, "deselected"),
        ];
        let parts: Vec<String> = counts
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| format!("{count} {label}"))
            .collect();
        let parts = if parts.is_empty() {
            "no fixtures ran".to_string()
        } else {
            parts.join(", ")
        };

        let color = if report.is_success() { "1;32" } else { "1;31" };
        let line = self.paint(
            color,
            &format!(
                "=================== {} in {:.2}s ===================",
                parts,
                summary.duration.as_secs_f64()
            ),
        );
        self.emit("");
        self.emit(&line);
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Writes the complete report as one pretty-printed JSON document at the end of the run
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SuiteReporter for JsonReporter<W> {
    fn on_collection_complete(&mut self, _fixture_count: usize) {}

    fn on_fixture_complete(&mut self, _fixture: &FixtureReport) {}

    fn on_run_complete(&mut self, report: &SuiteReport) {
        let written = serde_json::to_writer_pretty(&mut self.out, report)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.out));
        if let Err(e) = written {
            tracing::error!(error = %e, "failed to write JSON report");
        }
    }
}
