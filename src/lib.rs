#![forbid(unsafe_code)]
//! Fixture conformance harness
//!
//! Keeps a directory of fixture files and the manifest that declares them in sync, and runs every declared fixture
//! through an external system under test:
//!
//! - [`discovery`] finds fixture files by include pattern, excluding generated variants.
//! - [`coverage`] reports drift between disk and manifest, per scope.
//! - [`runner`] runs one fixture inside an isolation boundary.
//! - [`suite`] runs a whole manifest in parallel and aggregates a [`report::SuiteReport`].
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Runner code**: panics raised by a [`runner::FixtureRunner`] are caught at the fixture boundary and reported as
//!   that fixture's outcome.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod config;
pub mod coverage;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod suite;

pub use config::{FixturePatterns, RunOptions, SuiteConfig};
pub use coverage::{CoverageResult, CoverageViolation, check_scope, check_scope_in_tree, verify_coverage};
pub use discovery::{DiscoveryError, FixtureMatcher, FixtureTree, ScopeListing, discover};
pub use error::{HarnessError, HarnessResult};
pub use manifest::{FixtureManifestEntry, Manifest, ManifestError, Scope};
pub use report::{CoverageStatus, FixtureOutcome, FixtureReport, ScopeReport, SuiteReport, SuiteSummary};
pub use reporter::{ConsoleReporter, JsonReporter, SilentReporter, SuiteReporter};
pub use runner::{CommandRunner, FixtureFailure, FixtureRunner, ResolvedFixture, run_fixture};
pub use suite::{execute_isolated, run_one, run_suite, run_suite_blocking};
