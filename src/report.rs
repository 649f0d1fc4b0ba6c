//! Suite results
//!
//! A [`SuiteReport`] mirrors the manifest's scope tree. Every scope carries its coverage status and one
//! [`FixtureReport`] per executed fixture, preceded by the synthetic `testAllFilesPresentIn<Scope>` fixture that
//! stands for the coverage check.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::coverage::CoverageResult;

/// Result of running a single fixture
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FixtureOutcome {
    Passed { duration: Duration },
    /// The runner signalled failure
    Failed { duration: Duration, reason: String },
    /// The runner panicked
    Errored { duration: Duration, reason: String },
    TimedOut { limit: Duration },
    /// The declared file does not exist
    Missing { path: PathBuf },
    Skipped { reason: String },
    /// Failed on a backend where failure is expected
    XFailed { duration: Duration, reason: String },
    /// Passed on a backend where failure is expected
    XPassed { duration: Duration },
}

impl FixtureOutcome {
    /// True for outcomes that do not fail the suite
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FixtureOutcome::Passed { .. } | FixtureOutcome::Skipped { .. } | FixtureOutcome::XFailed { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            FixtureOutcome::Passed { .. } => "PASSED",
            FixtureOutcome::Failed { .. } => "FAILED",
            FixtureOutcome::Errored { .. } => "ERROR",
            FixtureOutcome::TimedOut { .. } => "TIMEOUT",
            FixtureOutcome::Missing { .. } => "MISSING",
            FixtureOutcome::Skipped { .. } => "SKIPPED",
            FixtureOutcome::XFailed { .. } => "XFAIL",
            FixtureOutcome::XPassed { .. } => "XPASS",
        }
    }

    /// Human-readable failure detail, if any
    pub fn detail(&self) -> Option<String> {
        match self {
            FixtureOutcome::Failed { reason, .. } | FixtureOutcome::Errored { reason, .. } => Some(reason.clone()),
            FixtureOutcome::TimedOut { limit } => Some(format!("exceeded the {:.2}s limit", limit.as_secs_f64())),
            FixtureOutcome::Missing { path } => Some(format!("fixture file not found: {}", path.display())),
            FixtureOutcome::XPassed { .. } => {
                Some("fixture passed but is expected to fail on this backend; remove it from IGNORE_BACKEND".into())
            }
            _ => None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            FixtureOutcome::Passed { duration }
            | FixtureOutcome::Failed { duration, .. }
            | FixtureOutcome::Errored { duration, .. }
            | FixtureOutcome::XFailed { duration, .. }
            | FixtureOutcome::XPassed { duration } => Some(*duration),
            FixtureOutcome::TimedOut { limit } => Some(*limit),
            FixtureOutcome::Missing { .. } | FixtureOutcome::Skipped { .. } => None,
        }
    }
}

/// One fixture's entry in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureReport {
    pub name: String,
    /// Path relative to the suite root; the scope directory for the synthetic coverage fixture
    pub path: PathBuf,
    pub outcome: FixtureOutcome,
    /// True for the per-scope coverage fixture
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

/// Coverage state of one scope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CoverageStatus {
    Verified { result: CoverageResult },
    DiscoveryFailed { reason: String },
}

impl CoverageStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, CoverageStatus::Verified { result } if result.is_empty())
    }

    /// Outcome of the synthetic coverage fixture
    pub fn as_outcome(&self, duration: Duration) -> FixtureOutcome {
        match self {
            CoverageStatus::Verified { result } if result.is_empty() => FixtureOutcome::Passed { duration },
            CoverageStatus::Verified { result } => FixtureOutcome::Failed {
                duration,
                reason: result.to_string(),
            },
            CoverageStatus::DiscoveryFailed { reason } => FixtureOutcome::Failed {
                duration,
                reason: reason.clone(),
            },
        }
    }
}

/// Report of one scope and its nested scopes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeReport {
    pub name: String,
    /// Directory relative to the suite root
    pub dir: PathBuf,
    pub coverage: CoverageStatus,
    pub fixtures: Vec<FixtureReport>,
    pub scopes: Vec<ScopeReport>,
}

impl ScopeReport {
    /// Every fixture report in this scope and below, depth-first in declaration order
    pub fn all_fixtures(&self) -> Vec<&FixtureReport> {
        let mut out: Vec<&FixtureReport> = self.fixtures.iter().collect();
        for child in &self.scopes {
            out.extend(child.all_fixtures());
        }
        out
    }

    /// Every scope in this tree, depth-first
    pub fn all_scopes(&self) -> Vec<&ScopeReport> {
        let mut out = vec![self];
        for child in &self.scopes {
            out.extend(child.all_scopes());
        }
        out
    }

    /// Find a fixture report by name anywhere in the tree
    pub fn find(&self, name: &str) -> Option<&FixtureReport> {
        self.all_fixtures().into_iter().find(|f| f.name == name)
    }
}

/// Summary of a suite run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub timed_out: usize,
    pub missing: usize,
    pub skipped: usize,
    pub xfailed: usize,
    pub xpassed: usize,
    /// Scopes whose coverage check did not come back clean
    pub coverage_failures: usize,
    /// Declared fixtures left out by the keyword filter
    pub deselected: usize,
    pub duration: Duration,
}

impl SuiteSummary {
    pub fn from_scope(root: &ScopeReport, deselected: usize, duration: Duration) -> Self {
        let mut summary = SuiteSummary {
            deselected,
            duration,
            ..SuiteSummary::default()
        };
        for fixture in root.all_fixtures() {
            summary.total += 1;
            match fixture.outcome {
                FixtureOutcome::Passed { .. } => summary.passed += 1,
                FixtureOutcome::Failed { .. } => summary.failed += 1,
                FixtureOutcome::Errored { .. } => summary.errored += 1,
                FixtureOutcome::TimedOut { .. } => summary.timed_out += 1,
                FixtureOutcome::Missing { .. } => summary.missing += 1,
                FixtureOutcome::Skipped { .. } => summary.skipped += 1,
                FixtureOutcome::XFailed { .. } => summary.xfailed += 1,
                FixtureOutcome::XPassed { .. } => summary.xpassed += 1,
            }
        }
        summary.coverage_failures = root.all_scopes().iter().filter(|s| !s.coverage.is_clean()).count();
        summary
    }

    /// True iff every outcome is a success and every coverage check is clean
    pub fn is_success(&self) -> bool {
        self.failed == 0
            && self.errored == 0
            && self.timed_out == 0
            && self.missing == 0
            && self.xpassed == 0
            && self.coverage_failures == 0
    }
}

/// Complete result of a suite run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    pub suite: ScopeReport,
    pub summary: SuiteSummary,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }

    /// Failing fixture reports, depth-first in declaration order
    pub fn failures(&self) -> Vec<&FixtureReport> {
        self.suite
            .all_fixtures()
            .into_iter()
            .filter(|f| !f.outcome.is_success())
            .collect()
    }
}
