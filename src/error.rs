//! Harness-level error type
//!
//! Fixture failures and coverage drift are *results*, recorded in the suite report. Errors here are the conditions
//! that prevent a suite from being set up at all: an unreadable manifest, an invalid pattern, a runtime that cannot
//! start.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::PatternError;
use crate::discovery::DiscoveryError;
use crate::manifest::ManifestError;

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("failed to start the async runtime")]
    #[diagnostic(code(fixture_harness::runtime))]
    Runtime(#[source] std::io::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
