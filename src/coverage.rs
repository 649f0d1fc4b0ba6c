//! Coverage verification
//!
//! Cross-checks what is on disk against what a scope declares. The check is per scope: a scope only looks at the
//! files directly inside its own directory, and at whether each fixture-holding sub-directory has a sub-scope of its
//! own. The sub-scope then runs its own check.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::discovery::{DiscoveryError, FixtureMatcher, FixtureTree};
use crate::manifest::Scope;

/// One reason a scope's declaration and the filesystem disagree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum CoverageViolation {
    /// A fixture exists on disk but the scope does not declare it.
    MissingManifestEntry(PathBuf),
    /// The scope declares a fixture that does not exist on disk.
    StaleManifestEntry(PathBuf),
    /// A sub-directory holds fixtures but no sub-scope mirrors it.
    MissingScope(PathBuf),
}

impl fmt::Display for CoverageViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageViolation::MissingManifestEntry(p) => {
                write!(f, "fixture missing from the manifest: {}", p.display())
            }
            CoverageViolation::StaleManifestEntry(p) => {
                write!(f, "manifest entry without a fixture on disk: {}", p.display())
            }
            CoverageViolation::MissingScope(p) => {
                write!(f, "fixture directory missing from the manifest: {}", p.display())
            }
        }
    }
}

/// Outcome of one scope's coverage check. Empty means no drift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageResult {
    /// Discovered fixtures that are not declared
    pub uncovered: BTreeSet<PathBuf>,
    /// Declared fixtures that do not exist
    pub stale: BTreeSet<PathBuf>,
    /// Fixture-holding sub-directories without a sub-scope
    pub missing_scopes: BTreeSet<PathBuf>,
}

impl CoverageResult {
    pub fn is_empty(&self) -> bool {
        self.uncovered.is_empty() && self.stale.is_empty() && self.missing_scopes.is_empty()
    }

    /// Every violation, grouped by kind and sorted by path within each kind.
    pub fn violations(&self) -> Vec<CoverageViolation> {
        let missing = self.uncovered.iter().cloned().map(CoverageViolation::MissingManifestEntry);
        let stale = self.stale.iter().cloned().map(CoverageViolation::StaleManifestEntry);
        let scopes = self.missing_scopes.iter().cloned().map(CoverageViolation::MissingScope);
        missing.chain(stale).chain(scopes).collect()
    }
}

impl fmt::Display for CoverageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "all fixtures are declared");
        }
        let violations = self.violations();
        for (i, violation) in violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// Compute `discovered - declared`.
///
/// Both sets hold paths relative to the same directory. The result's `stale` and `missing_scopes` are left empty;
/// [`check_scope`] fills them.
pub fn verify_coverage(discovered: &BTreeSet<PathBuf>, declared: &BTreeSet<PathBuf>) -> CoverageResult {
    CoverageResult {
        uncovered: discovered.difference(declared).cloned().collect(),
        ..CoverageResult::default()
    }
}

/// Run the full coverage check of `scope`, whose directory is `dir`.
///
/// - Direct fixtures of `dir` not declared by the scope are uncovered.
/// - Declared fixtures whose file is absent are stale. A declared file that exists but does not count as a fixture
///   (a generated variant, or a fixture for another backend) is neither.
/// - With `recursive`, fixture-holding sub-directories without a matching sub-scope are reported too.
pub fn check_scope(
    dir: &Path,
    scope: &Scope,
    matcher: &FixtureMatcher,
    recursive: bool,
) -> Result<CoverageResult, DiscoveryError> {
    let tree = FixtureTree::scan(dir, matcher)?;
    check_scope_in_tree(&tree, Path::new(""), scope, recursive)
}

/// [`check_scope`] against an existing walk; `rel_dir` is the scope's directory relative to the tree root.
///
/// An unreadable sub-directory fails only the check of the scope that owns it. Here it is listed as a sub-directory
/// like any other.
pub fn check_scope_in_tree(
    tree: &FixtureTree,
    rel_dir: &Path,
    scope: &Scope,
    recursive: bool,
) -> Result<CoverageResult, DiscoveryError> {
    let listing = tree.listing(rel_dir)?;
    let dir = tree.root().join(rel_dir);

    let mut result = verify_coverage(&listing.fixtures, &scope.fixture_paths());
    result.stale = scope
        .fixtures
        .iter()
        .filter(|entry| !dir.join(&entry.path).is_file())
        .map(|entry| entry.path.clone())
        .collect();

    if recursive {
        let declared_dirs: BTreeSet<PathBuf> = scope.scopes.iter().map(|s| s.dir.clone()).collect();
        result.missing_scopes = listing.subdirs.difference(&declared_dirs).cloned().collect();
    }

    if !result.is_empty() {
        tracing::warn!(scope = %scope.name, violations = result.violations().len(), "coverage drift");
    }
    Ok(result)
}
