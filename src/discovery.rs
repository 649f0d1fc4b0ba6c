//! Fixture discovery
//!
//! Read-only traversal of a fixture directory. A [`FixtureTree`] is one walk of a root; everything else is a view
//! over it:
//! - [`discover`]: every fixture below a root, recursively.
//! - [`FixtureTree::listing`]: the direct fixtures of one directory plus the sub-directories that
//!   contain fixtures, which is what a single scope's coverage check needs.
//!
//! All returned paths are relative to the directory that was scanned and come back sorted. Hidden entries (names
//! starting with `.`) are never visited. Each file is matched (and, with a backend configured, read) once per walk.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use fixture_harness_core::directives::{BackendApplicability, applicability};
use miette::Diagnostic;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::config::{CompiledPatterns, FixturePatterns, PatternError};

/// A directory that could not be scanned.
#[derive(Debug, Error, Diagnostic)]
pub enum DiscoveryError {
    #[error("fixture root `{}` does not exist", .0.display())]
    #[diagnostic(code(fixture_harness::discovery::root_missing))]
    RootMissing(PathBuf),

    #[error("fixture root `{}` is not a directory", .0.display())]
    #[diagnostic(code(fixture_harness::discovery::not_a_directory))]
    NotADirectory(PathBuf),

    #[error("failed to read `{}`: {reason}", .path.display())]
    #[diagnostic(code(fixture_harness::discovery::unreadable))]
    Unreadable { path: PathBuf, reason: String },
}

/// Decides which files are fixtures: name patterns plus, optionally, backend directives.
#[derive(Debug, Clone)]
pub struct FixtureMatcher {
    patterns: CompiledPatterns,
    backend: Option<String>,
}

impl FixtureMatcher {
    pub fn new(patterns: &FixturePatterns, backend: Option<&str>) -> Result<Self, PatternError> {
        Ok(Self {
            patterns: patterns.compile()?,
            backend: backend.map(str::to_string),
        })
    }

    pub fn patterns(&self) -> &CompiledPatterns {
        &self.patterns
    }

    pub fn backend(&self) -> Option<&str> {
        self.backend.as_deref()
    }

    /// True if the file at `path` counts as a fixture.
    ///
    /// Name patterns are checked first; the file is only read when a backend is configured. An unreadable file
    /// still counts: its content problem surfaces when it runs, not as silent drift.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !self.patterns.is_fixture(name) {
            return false;
        }
        match (&self.backend, fs::read_to_string(path)) {
            (Some(backend), Ok(text)) => applicability(&text, backend) != BackendApplicability::NotApplicable,
            _ => true,
        }
    }
}

/// Direct content of one scope directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeListing {
    /// Fixture file names directly inside the directory
    pub fixtures: BTreeSet<PathBuf>,
    /// Sub-directory names that contain at least one fixture at any depth, or could not be read
    pub subdirs: BTreeSet<PathBuf>,
}

/// One walk of a fixture root.
///
/// Directories that cannot be read are recorded rather than aborting the walk, so a failure only affects the scopes
/// that own the unreadable part of the tree.
#[derive(Debug, Clone)]
pub struct FixtureTree {
    root: PathBuf,
    matcher: FixtureMatcher,
    /// Every visited directory (relative to `root`, empty for `root` itself) with the fixtures directly inside it
    dirs: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    unreadable: BTreeMap<PathBuf, String>,
}

impl FixtureTree {
    /// Walk `root` once.
    ///
    /// ## Errors
    /// - [`DiscoveryError::RootMissing`] / [`DiscoveryError::NotADirectory`] if `root` itself is unusable. Problems
    ///   further down are kept in the tree and reported by [`FixtureTree::listing`].
    #[tracing::instrument(skip_all, fields(root = %root.display()))]
    pub fn scan(root: &Path, matcher: &FixtureMatcher) -> Result<Self, DiscoveryError> {
        ensure_dir(root)?;

        let mut tree = Self {
            root: root.to_path_buf(),
            matcher: matcher.clone(),
            dirs: BTreeMap::from([(PathBuf::new(), BTreeSet::new())]),
            unreadable: BTreeMap::new(),
        };
        for entry in walk(root) {
            match entry {
                Ok(entry) => {
                    let rel = relative(root, entry.path());
                    if entry.file_type().is_dir() {
                        tree.dirs.entry(rel).or_default();
                    } else if entry.file_type().is_file() && matcher.accepts(entry.path()) {
                        let parent = rel.parent().map(Path::to_path_buf).unwrap_or_default();
                        if let Some(name) = rel.file_name() {
                            tree.dirs.entry(parent).or_default().insert(PathBuf::from(name));
                        }
                    }
                }
                Err(e) => {
                    let rel = e.path().map_or_else(PathBuf::new, |p| relative(root, p));
                    tracing::warn!(path = %rel.display(), error = %e, "unreadable fixture directory");
                    tree.unreadable.insert(rel, e.to_string());
                }
            }
        }

        tracing::debug!(dirs = tree.dirs.len(), unreadable = tree.unreadable.len(), "scanned fixture tree");
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every fixture in the tree, relative to the root.
    pub fn fixtures(&self) -> BTreeSet<PathBuf> {
        self.dirs
            .iter()
            .flat_map(|(dir, files)| files.iter().map(move |f| dir.join(f)))
            .collect()
    }

    /// Direct content of `rel_dir`, a directory relative to the root.
    ///
    /// ## Errors
    /// - [`DiscoveryError::Unreadable`] if `rel_dir` or one of its ancestors could not be read.
    /// - [`DiscoveryError::RootMissing`] / [`DiscoveryError::NotADirectory`] if `rel_dir` is not a directory.
    pub fn listing(&self, rel_dir: &Path) -> Result<ScopeListing, DiscoveryError> {
        if let Some((failed, reason)) = self.unreadable.iter().find(|(failed, _)| rel_dir.starts_with(failed)) {
            return Err(DiscoveryError::Unreadable {
                path: self.root.join(failed),
                reason: reason.clone(),
            });
        }

        let Some(files) = self.dirs.get(rel_dir) else {
            let abs = self.root.join(rel_dir);
            ensure_dir(&abs)?;
            // Present but never visited: a hidden directory declared explicitly.
            return Self::scan(&abs, &self.matcher)?.listing(Path::new(""));
        };

        let subdirs = self
            .dirs
            .keys()
            .filter(|dir| dir.parent() == Some(rel_dir))
            .filter(|dir| self.holds_fixtures(dir))
            .filter_map(|dir| dir.file_name().map(PathBuf::from))
            .collect();

        Ok(ScopeListing {
            fixtures: files.clone(),
            subdirs,
        })
    }

    /// True if `dir` holds a fixture at any depth, or if part of it could not be read.
    fn holds_fixtures(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|(d, files)| d.starts_with(dir) && !files.is_empty())
            || self.unreadable.keys().any(|u| u.starts_with(dir))
    }

    #[cfg(test)]
    pub(crate) fn mark_unreadable(&mut self, rel_dir: impl Into<PathBuf>, reason: &str) {
        self.unreadable.insert(rel_dir.into(), reason.to_string());
    }
}

/// Discover every fixture below `root`.
///
/// ## Errors
/// - [`DiscoveryError::RootMissing`] if `root` does not exist. The caller decides whether that is fatal; the suite
///   runner records it against the affected scope only.
/// - [`DiscoveryError::Unreadable`] if any directory below `root` could not be read.
pub fn discover(root: &Path, matcher: &FixtureMatcher) -> Result<BTreeSet<PathBuf>, DiscoveryError> {
    let tree = FixtureTree::scan(root, matcher)?;
    if let Some((failed, reason)) = tree.unreadable.iter().next() {
        return Err(DiscoveryError::Unreadable {
            path: root.join(failed),
            reason: reason.clone(),
        });
    }

    let fixtures = tree.fixtures();
    tracing::debug!(count = fixtures.len(), "discovered fixtures");
    Ok(fixtures)
}

fn ensure_dir(dir: &Path) -> Result<(), DiscoveryError> {
    if !dir.exists() {
        return Err(DiscoveryError::RootMissing(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(DiscoveryError::NotADirectory(dir.to_path_buf()));
    }
    Ok(())
}

fn walk(dir: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn relative(base: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn matcher() -> FixtureMatcher {
        FixtureMatcher::new(&FixturePatterns::default(), None).unwrap()
    }

    fn paths(items: &[&str]) -> BTreeSet<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_discover_recursive_and_filtered() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.kt", "");
        write(dir.path(), "b.fir.kt", "");
        write(dir.path(), "notes.txt", "");
        write(dir.path(), "sub/c.kts", "");
        write(dir.path(), "sub/deeper/d.kt", "");

        let found = discover(dir.path(), &matcher()).unwrap();
        assert_eq!(found, paths(&["a.kt", "sub/c.kts", "sub/deeper/d.kt"]));
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = discover(&missing, &matcher()).unwrap_err();
        assert!(matches!(err, DiscoveryError::RootMissing(p) if p == missing));
    }

    #[test]
    fn test_discover_file_root_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.kt", "");
        let err = discover(&dir.path().join("a.kt"), &matcher()).unwrap_err();
        assert!(matches!(err, DiscoveryError::NotADirectory(_)));
    }

    #[test]
    fn test_discover_skips_hidden_entries() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".hidden.kt", "");
        write(dir.path(), ".cache/x.kt", "");
        write(dir.path(), "shown.kt", "");
        assert_eq!(discover(dir.path(), &matcher()).unwrap(), paths(&["shown.kt"]));
    }

    #[test]
    fn test_listing_is_not_recursive() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.kt", "");
        write(dir.path(), "sub/c.kt", "");
        write(dir.path(), "empty/readme.md", "");
        write(dir.path(), "variants/x.fir.kt", "");

        let tree = FixtureTree::scan(dir.path(), &matcher()).unwrap();
        let listing = tree.listing(Path::new("")).unwrap();
        assert_eq!(listing.fixtures, paths(&["a.kt"]));
        assert_eq!(listing.subdirs, paths(&["sub"]));
    }

    #[test]
    fn test_listing_nested_directories_from_one_walk() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.kt", "");
        write(dir.path(), "sub/c.kt", "");
        write(dir.path(), "sub/deeper/d.kt", "");
        write(dir.path(), "sub/empty/readme.md", "");

        let tree = FixtureTree::scan(dir.path(), &matcher()).unwrap();
        let sub = tree.listing(Path::new("sub")).unwrap();
        assert_eq!(sub.fixtures, paths(&["c.kt"]));
        assert_eq!(sub.subdirs, paths(&["deeper"]));
        assert_eq!(tree.listing(Path::new("sub/deeper")).unwrap().fixtures, paths(&["d.kt"]));
        assert_eq!(tree.fixtures(), paths(&["a.kt", "sub/c.kt", "sub/deeper/d.kt"]));
    }

    #[test]
    fn test_listing_missing_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.kt", "");
        let tree = FixtureTree::scan(dir.path(), &matcher()).unwrap();
        let err = tree.listing(Path::new("gone")).unwrap_err();
        assert!(matches!(err, DiscoveryError::RootMissing(p) if p == dir.path().join("gone")));
    }

    #[test]
    fn test_listing_hidden_directory_when_asked_for() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".generated/x.kt", "");
        let tree = FixtureTree::scan(dir.path(), &matcher()).unwrap();
        assert!(tree.listing(Path::new("")).unwrap().subdirs.is_empty());
        assert_eq!(tree.listing(Path::new(".generated")).unwrap().fixtures, paths(&["x.kt"]));
    }

    #[test]
    fn test_unreadable_subdirectory_only_fails_itself() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.kt", "");
        write(dir.path(), "locked/deep/b.kt", "");
        let mut tree = FixtureTree::scan(dir.path(), &matcher()).unwrap();
        tree.mark_unreadable("locked", "Permission denied");

        let root = tree.listing(Path::new("")).unwrap();
        assert_eq!(root.fixtures, paths(&["a.kt"]));
        assert_eq!(root.subdirs, paths(&["locked"]));

        for rel in ["locked", "locked/deep"] {
            let err = tree.listing(Path::new(rel)).unwrap_err();
            assert!(matches!(&err, DiscoveryError::Unreadable { path, .. } if *path == dir.path().join("locked")));
        }
    }

    #[test]
    fn test_unreadable_empty_subdirectory_is_still_listed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.kt", "");
        fs::create_dir_all(dir.path().join("locked")).unwrap();
        let mut tree = FixtureTree::scan(dir.path(), &matcher()).unwrap();
        assert!(tree.listing(Path::new("")).unwrap().subdirs.is_empty());

        tree.mark_unreadable("locked", "Permission denied");
        assert_eq!(tree.listing(Path::new("")).unwrap().subdirs, paths(&["locked"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_directory_is_recorded() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.kt", "");
        write(dir.path(), "locked/b.kt", "");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let readable = fs::read_dir(&locked).is_ok();

        let tree = FixtureTree::scan(dir.path(), &matcher());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            // Permission bits are not enforced for this user.
            return;
        }

        let tree = tree.unwrap();
        assert_eq!(tree.listing(Path::new("")).unwrap().subdirs, paths(&["locked"]));
        assert!(matches!(
            tree.listing(Path::new("locked")),
            Err(DiscoveryError::Unreadable { .. })
        ));
        assert!(matches!(discover(dir.path(), &matcher()), Ok(found) if found.len() == 2));
    }

    #[test]
    fn test_backend_filter_drops_untargeted_fixtures() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "jvm_only.kt", "// TARGET_BACKEND: JVM_IR\n");
        write(dir.path(), "everywhere.kt", "fun box() = \"OK\"\n");
        write(dir.path(), "muted.kt", "// IGNORE_BACKEND: JS\n");

        let js = FixtureMatcher::new(&FixturePatterns::default(), Some("JS")).unwrap();
        assert_eq!(discover(dir.path(), &js).unwrap(), paths(&["everywhere.kt", "muted.kt"]));

        let any = matcher();
        assert_eq!(discover(dir.path(), &any).unwrap().len(), 3);
    }
}
