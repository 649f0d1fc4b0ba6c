//! Suite aggregation
//!
//! Runs a whole [`Manifest`]: every scope's coverage check plus every declared fixture, and folds the results into a
//! [`SuiteReport`].
//!
//! ## Execution model
//!
//! - The fixture root is walked once per invocation and every scope's coverage check reads that walk. Nothing is
//!   cached across invocations.
//! - Fixtures run on a tokio runtime as `spawn_blocking` tasks, at most `jobs` at a time. A `jobs` slot is held until
//!   the runner has actually returned, so a timed-out run still occupies its slot.
//! - Each fixture is isolated: runner failures, panics and timeouts become that fixture's outcome and never stop the
//!   siblings. Runners receive the time limit as a deadline; [`crate::runner::CommandRunner`] kills its process there.
//! - Reports keep declaration order regardless of completion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use fixture_harness_core::naming;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::config::RunOptions;
use crate::coverage::check_scope_in_tree;
use crate::discovery::{DiscoveryError, FixtureMatcher, FixtureTree};
use crate::error::{HarnessError, HarnessResult};
use crate::manifest::{Manifest, Scope};
use crate::report::{CoverageStatus, FixtureOutcome, FixtureReport, ScopeReport, SuiteReport, SuiteSummary};
use crate::reporter::SuiteReporter;
use crate::runner::{FixtureRunner, ResolvedFixture, panic_message, run_fixture};

/// Scope with its coverage already checked and its fixtures resolved, waiting for outcomes
struct PlannedScope {
    name: String,
    dir: PathBuf,
    coverage: CoverageStatus,
    coverage_duration: Duration,
    fixtures: Vec<usize>,
    scopes: Vec<PlannedScope>,
}

struct Planner<'a> {
    /// The single walk of the suite root
    tree: Result<FixtureTree, DiscoveryError>,
    recursive: bool,
    options: &'a RunOptions,
    fixtures: Vec<ResolvedFixture>,
    deselected: usize,
}

impl Planner<'_> {
    fn plan(&mut self, scope: &Scope, abs_dir: &Path, rel_dir: &Path) -> PlannedScope {
        let start = Instant::now();
        let checked = match &self.tree {
            Ok(tree) => check_scope_in_tree(tree, rel_dir, scope, self.recursive).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let coverage = match checked {
            Ok(result) => CoverageStatus::Verified { result },
            Err(reason) => {
                tracing::warn!(scope = %scope.name, error = %reason, "fixture discovery failed");
                CoverageStatus::DiscoveryFailed { reason }
            }
        };
        let coverage_duration = start.elapsed();

        let mut indices = Vec::new();
        for entry in &scope.fixtures {
            if !self.options.selects(&entry.name) {
                self.deselected += 1;
                continue;
            }
            indices.push(self.fixtures.len());
            self.fixtures.push(ResolvedFixture::new(
                entry.name.clone(),
                abs_dir.join(&entry.path),
                rel_dir.join(&entry.path),
            ));
        }

        let mut scopes = Vec::new();
        for child in &scope.scopes {
            scopes.push(self.plan(child, &abs_dir.join(&child.dir), &rel_dir.join(&child.dir)));
        }

        PlannedScope {
            name: scope.name.clone(),
            dir: rel_dir.to_path_buf(),
            coverage,
            coverage_duration,
            fixtures: indices,
            scopes,
        }
    }
}

fn coverage_fixture(scope: &PlannedScope) -> FixtureReport {
    FixtureReport {
        name: naming::all_files_present_name(&scope.name),
        path: scope.dir.clone(),
        outcome: scope.coverage.as_outcome(scope.coverage_duration),
        synthetic: true,
    }
}

fn report_coverage(scope: &PlannedScope, reporter: &mut dyn SuiteReporter) {
    reporter.on_fixture_complete(&coverage_fixture(scope));
    for child in &scope.scopes {
        report_coverage(child, reporter);
    }
}

fn assemble(
    scope: PlannedScope,
    fixtures: &[ResolvedFixture],
    outcomes: &mut [Option<FixtureOutcome>],
) -> ScopeReport {
    let mut reports = vec![coverage_fixture(&scope)];
    for index in scope.fixtures {
        let fixture = &fixtures[index];
        let outcome = outcomes[index].take().unwrap_or_else(|| FixtureOutcome::Errored {
            duration: Duration::ZERO,
            reason: "fixture task was aborted".to_string(),
        });
        reports.push(FixtureReport {
            name: fixture.name.clone(),
            path: fixture.display_path.clone(),
            outcome,
            synthetic: false,
        });
    }

    let scopes = scope
        .scopes
        .into_iter()
        .map(|child| assemble(child, fixtures, outcomes))
        .collect();

    ScopeReport {
        name: scope.name,
        dir: scope.dir,
        coverage: scope.coverage,
        fixtures: reports,
        scopes,
    }
}

/// Run one fixture on the blocking pool, applying the optional time limit.
pub async fn execute_isolated(
    fixture: ResolvedFixture,
    runner: Arc<dyn FixtureRunner>,
    backend: Option<String>,
    timeout: Option<Duration>,
) -> FixtureOutcome {
    execute_holding(fixture, runner, backend, timeout, None).await
}

/// [`execute_isolated`], keeping `permit` until the blocking run returns even when the time limit fires first.
async fn execute_holding(
    fixture: ResolvedFixture,
    runner: Arc<dyn FixtureRunner>,
    backend: Option<String>,
    timeout: Option<Duration>,
    permit: Option<OwnedSemaphorePermit>,
) -> FixtureOutcome {
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        run_fixture(&fixture, runner.as_ref(), backend.as_deref(), timeout)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => return FixtureOutcome::TimedOut { limit },
        },
        None => task.await,
    };

    joined.unwrap_or_else(|e| {
        let reason = if e.is_panic() {
            panic_message(e.into_panic().as_ref())
        } else {
            e.to_string()
        };
        FixtureOutcome::Errored {
            duration: Duration::ZERO,
            reason,
        }
    })
}

/// Run every scope and fixture of `manifest` through `runner`.
///
/// ## Errors
/// Only set-up problems (an invalid include pattern) are errors. Fixture failures, missing roots and coverage drift
/// are recorded in the returned report.
#[tracing::instrument(skip_all, fields(suite = %manifest.suite.name, jobs = options.jobs))]
pub async fn run_suite(
    manifest: &Manifest,
    runner: Arc<dyn FixtureRunner>,
    options: &RunOptions,
    reporter: &mut dyn SuiteReporter,
) -> HarnessResult<SuiteReport> {
    let start = Instant::now();
    let backend = manifest.config.target_backend.clone();
    let matcher = FixtureMatcher::new(&manifest.config.patterns, backend.as_deref())?;

    let mut planner = Planner {
        tree: FixtureTree::scan(&manifest.config.root, &matcher),
        recursive: manifest.config.patterns.recursive,
        options,
        fixtures: Vec::new(),
        deselected: 0,
    };
    let plan = planner.plan(&manifest.suite, &manifest.config.root, Path::new(""));
    let Planner {
        fixtures, deselected, ..
    } = planner;

    tracing::info!(fixtures = fixtures.len(), deselected, "collected fixtures");
    reporter.on_collection_complete(fixtures.len());
    report_coverage(&plan, reporter);

    let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
    let halted = Arc::new(AtomicBool::new(false));
    let mut tasks = JoinSet::new();

    for (index, fixture) in fixtures.iter().cloned().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let halted = Arc::clone(&halted);
        let runner = Arc::clone(&runner);
        let backend = backend.clone();
        let timeout = options.timeout;
        let fail_fast = options.fail_fast;

        tasks.spawn(async move {
            let Ok(permit) = semaphore.acquire_owned().await else {
                return (
                    index,
                    FixtureOutcome::Skipped {
                        reason: "runner pool closed".to_string(),
                    },
                );
            };
            if fail_fast && halted.load(Ordering::SeqCst) {
                return (
                    index,
                    FixtureOutcome::Skipped {
                        reason: "an earlier fixture failed (fail-fast)".to_string(),
                    },
                );
            }
            let outcome = execute_holding(fixture, runner, backend, timeout, Some(permit)).await;
            if !outcome.is_success() {
                halted.store(true, Ordering::SeqCst);
            }
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<FixtureOutcome>> = vec![None; fixtures.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                let fixture = &fixtures[index];
                tracing::debug!(fixture = %fixture.name, status = outcome.label(), "fixture finished");
                reporter.on_fixture_complete(&FixtureReport {
                    name: fixture.name.clone(),
                    path: fixture.display_path.clone(),
                    outcome: outcome.clone(),
                    synthetic: false,
                });
                outcomes[index] = Some(outcome);
            }
            Err(e) => tracing::error!(error = %e, "fixture task aborted"),
        }
    }

    let suite = assemble(plan, &fixtures, &mut outcomes);
    let summary = SuiteSummary::from_scope(&suite, deselected, start.elapsed());
    let report = SuiteReport { suite, summary };

    reporter.on_run_complete(&report);
    Ok(report)
}

fn build_runtime() -> HarnessResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(HarnessError::Runtime)
}

/// Blocking wrapper around [`run_suite`] that owns its runtime.
pub fn run_suite_blocking(
    manifest: &Manifest,
    runner: Arc<dyn FixtureRunner>,
    options: &RunOptions,
    reporter: &mut dyn SuiteReporter,
) -> HarnessResult<SuiteReport> {
    let runtime = build_runtime()?;
    let report = runtime.block_on(run_suite(manifest, runner, options, reporter));
    // Runners that ignore their deadline must not hold the process open.
    runtime.shutdown_background();
    report
}

/// Run a single fixture file through the same isolation boundary as a suite run.
pub fn run_one(
    fixture: &Path,
    runner: Arc<dyn FixtureRunner>,
    backend: Option<&str>,
    timeout: Option<Duration>,
) -> HarnessResult<FixtureReport> {
    let name = fixture
        .file_name()
        .map_or_else(|| fixture.display().to_string(), |n| n.to_string_lossy().into_owned());
    let resolved = ResolvedFixture::new(name.clone(), fixture, fixture);

    let runtime = build_runtime()?;
    let outcome = runtime.block_on(execute_isolated(
        resolved,
        runner,
        backend.map(str::to_string),
        timeout,
    ));
    runtime.shutdown_background();

    Ok(FixtureReport {
        name,
        path: fixture.to_path_buf(),
        outcome,
        synthetic: false,
    })
}
