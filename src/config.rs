//! Harness configuration
//!
//! Two layers:
//! - [`SuiteConfig`] is part of the manifest: where the fixtures live and which files count as fixtures.
//! - [`RunOptions`] belong to one invocation: parallelism, timeouts, filtering.

use std::path::PathBuf;
use std::time::Duration;

use fixture_harness_core::variants;
use miette::Diagnostic;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Include pattern used when a manifest does not specify one: `.kt` and `.kts` files.
pub const DEFAULT_INCLUDE: &str = r"^(.+)\.kts?$";

/// A fixture pattern that failed to compile.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid fixture pattern `{pattern}`")]
#[diagnostic(
    code(fixture_harness::config::pattern),
    help("patterns use the `regex` crate syntax and are matched against file names, not paths")
)]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Which files under a scope directory count as fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixturePatterns {
    /// Regex matched against file names. Its first capture group, if any, is the fixture stem.
    pub include: String,
    /// Generated-variant tags (`foo.<tag>.kt`) excluded from coverage counting.
    pub variants: Vec<String>,
    /// Whether sub-directories holding fixtures must be mirrored by sub-scopes.
    pub recursive: bool,
}

impl Default for FixturePatterns {
    fn default() -> Self {
        Self {
            include: DEFAULT_INCLUDE.to_string(),
            variants: variants::default_tags().map(str::to_string).collect(),
            recursive: true,
        }
    }
}

impl FixturePatterns {
    /// Create patterns with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the include regex
    pub fn with_include(mut self, include: impl Into<String>) -> Self {
        self.include = include.into();
        self
    }

    /// Replace the variant tag list (empty disables exclusion)
    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether sub-directories are checked for mirroring sub-scopes
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Compile the include and exclusion regexes.
    pub fn compile(&self) -> Result<CompiledPatterns, PatternError> {
        let include = compile_regex(&self.include)?;
        let exclude = exclusion_source(&self.variants)
            .map(|source| compile_regex(&source))
            .transpose()?;
        Ok(CompiledPatterns { include, exclude })
    }
}

/// Regex source matching any file carrying one of `tags` between stem and extension: `^(.+)\.(t1|t2)\.[^.]+$`.
///
/// `None` for an empty tag list.
fn exclusion_source(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    let alternation = tags.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    Some(format!(r"^(.+)\.({alternation})\.[^.]+$"))
}

fn compile_regex(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError {
        pattern: pattern.to_string(),
        source,
    })
}

/// Compiled form of [`FixturePatterns`].
///
/// A missing exclusion regex never matches; there is no separate "no exclusions" state.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    include: Regex,
    exclude: Option<Regex>,
}

impl CompiledPatterns {
    /// True if `file_name` is included and not a generated variant.
    pub fn is_fixture(&self, file_name: &str) -> bool {
        self.include.is_match(file_name) && !self.is_excluded(file_name)
    }

    /// True if `file_name` is a generated variant.
    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(file_name))
    }

    /// Stem used for naming: first capture group of the include regex, falling back to the text before the last `.`.
    pub fn stem<'a>(&self, file_name: &'a str) -> &'a str {
        self.include
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or_else(|| file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem))
    }
}

/// Suite-level configuration, stored in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Fixture root directory. Relative roots are resolved against the manifest's directory.
    pub root: PathBuf,
    #[serde(default)]
    pub patterns: FixturePatterns,
    /// Backend whose `TARGET_BACKEND` / `IGNORE_BACKEND` directives are honoured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_backend: Option<String>,
}

impl SuiteConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: FixturePatterns::default(),
            target_backend: None,
        }
    }

    pub fn with_patterns(mut self, patterns: FixturePatterns) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_target_backend(mut self, backend: impl Into<String>) -> Self {
        self.target_backend = Some(backend.into());
        self
    }
}

/// Options for one suite invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of fixtures running at once
    pub jobs: usize,
    /// Per-fixture time limit
    pub timeout: Option<Duration>,
    /// Only run fixtures whose name contains this keyword
    pub filter: Option<String>,
    /// Stop starting fixtures after the first failure
    pub fail_fast: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: std::thread::available_parallelism().map_or(1, |n| n.get()),
            timeout: None,
            filter: None,
            fail_fast: false,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parallelism (clamped to at least one)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_filter(mut self, keyword: impl Into<String>) -> Self {
        self.filter = Some(keyword.into());
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// True if a fixture called `name` passes the keyword filter.
    pub fn selects(&self, name: &str) -> bool {
        self.filter.as_deref().is_none_or(|keyword| name.contains(keyword))
    }
}
