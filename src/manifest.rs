//! Suite manifest
//!
//! The manifest is the declared, authoritative list of fixtures: a tree of named [`Scope`]s mirroring the fixture
//! directory, each owning its [`FixtureManifestEntry`]s. It is authored by hand or produced by
//! [`Manifest::scaffold`], and stored as JSON.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use fixture_harness_core::naming;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SuiteConfig;
use crate::discovery::{FixtureMatcher, FixtureTree};
use crate::error::HarnessResult;

/// Errors that occur while loading or validating a manifest
#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    #[error("failed to read manifest `{}`", .path.display())]
    #[diagnostic(code(fixture_harness::manifest::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest `{}`", .path.display())]
    #[diagnostic(code(fixture_harness::manifest::parse))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize manifest")]
    #[diagnostic(code(fixture_harness::manifest::serialize))]
    Serialize(#[source] serde_json::Error),

    #[error("scope `{scope}` declares fixture `{name}` twice")]
    #[diagnostic(code(fixture_harness::manifest::duplicate_name))]
    DuplicateFixtureName { scope: String, name: String },

    #[error("scope `{scope}` declares path `{}` twice", .path.display())]
    #[diagnostic(
        code(fixture_harness::manifest::duplicate_path),
        help("every fixture must be declared, and therefore run, exactly once")
    )]
    DuplicateFixturePath { scope: String, path: PathBuf },

    #[error("scope `{scope}` declares sub-directory `{}` twice", .dir.display())]
    #[diagnostic(code(fixture_harness::manifest::duplicate_scope))]
    DuplicateScopeDir { scope: String, dir: PathBuf },

    #[error("scope `{scope}` uses invalid path `{}`", .path.display())]
    #[diagnostic(
        code(fixture_harness::manifest::invalid_path),
        help("fixture paths and scope directories are single relative names such as `foo.kt` or `inline`")
    )]
    InvalidPath { scope: String, path: PathBuf },

    #[error("root scope `{scope}` declares directory `{}`", .dir.display())]
    #[diagnostic(
        code(fixture_harness::manifest::root_scope_dir),
        help("the root scope mirrors `root` itself; omit its `dir` or move it into `root`")
    )]
    RootScopeDir { scope: String, dir: PathBuf },
}

/// A declared fixture: test name plus file name relative to its scope's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureManifestEntry {
    pub name: String,
    pub path: PathBuf,
}

impl FixtureManifestEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// A named group of fixtures mirroring one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    /// Directory relative to the parent scope; empty for the root scope
    #[serde(default, skip_serializing_if = "is_empty_path")]
    pub dir: PathBuf,
    #[serde(default)]
    pub fixtures: Vec<FixtureManifestEntry>,
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

fn is_empty_path(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

impl Scope {
    /// Create the root scope of a suite
    pub fn root(name: impl Into<String>) -> Self {
        Self::nested(name, PathBuf::new())
    }

    /// Create a scope mirroring sub-directory `dir` of its parent
    pub fn nested(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            fixtures: Vec::new(),
            scopes: Vec::new(),
        }
    }

    pub fn with_fixture(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.fixtures.push(FixtureManifestEntry::new(name, path));
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }

    /// Paths declared directly by this scope
    pub fn fixture_paths(&self) -> BTreeSet<PathBuf> {
        self.fixtures.iter().map(|e| e.path.clone()).collect()
    }

    /// Number of fixtures declared by this scope and all nested scopes
    pub fn fixture_count(&self) -> usize {
        self.fixtures.len() + self.scopes.iter().map(Scope::fixture_count).sum::<usize>()
    }

    fn validate(&self, is_root: bool) -> Result<(), ManifestError> {
        if is_root && !is_empty_path(&self.dir) {
            return Err(ManifestError::RootScopeDir {
                scope: self.name.clone(),
                dir: self.dir.clone(),
            });
        }
        if !is_root && !is_single_name(&self.dir) {
            return Err(ManifestError::InvalidPath {
                scope: self.name.clone(),
                path: self.dir.clone(),
            });
        }

        let mut names = HashSet::new();
        let mut paths = HashSet::new();
        for entry in &self.fixtures {
            if !is_single_name(&entry.path) {
                return Err(ManifestError::InvalidPath {
                    scope: self.name.clone(),
                    path: entry.path.clone(),
                });
            }
            if !names.insert(entry.name.as_str()) {
                return Err(ManifestError::DuplicateFixtureName {
                    scope: self.name.clone(),
                    name: entry.name.clone(),
                });
            }
            if !paths.insert(entry.path.as_path()) {
                return Err(ManifestError::DuplicateFixturePath {
                    scope: self.name.clone(),
                    path: entry.path.clone(),
                });
            }
        }

        let mut dirs = HashSet::new();
        for child in &self.scopes {
            if !dirs.insert(child.dir.as_path()) {
                return Err(ManifestError::DuplicateScopeDir {
                    scope: self.name.clone(),
                    dir: child.dir.clone(),
                });
            }
            child.validate(false)?;
        }
        Ok(())
    }
}

fn is_single_name(path: &Path) -> bool {
    let mut components = path.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// A complete suite declaration: where fixtures live plus the scope tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub config: SuiteConfig,
    pub suite: Scope,
}

impl Manifest {
    /// Build and validate a manifest in code.
    pub fn new(config: SuiteConfig, suite: Scope) -> Result<Self, ManifestError> {
        let manifest = Self { config, suite };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest file. A relative `root` is resolved against the file's directory.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest: Manifest = serde_json::from_str(&text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if manifest.config.root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            manifest.config.root = base.join(&manifest.config.root);
        }
        manifest.validate()?;

        tracing::debug!(fixtures = manifest.suite.fixture_count(), "loaded manifest");
        Ok(manifest)
    }

    /// Parse a manifest from JSON text. `root` is kept as written.
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(text).map_err(|source| ManifestError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(ManifestError::Serialize)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        self.suite.validate(true)
    }

    /// Build the manifest that exactly matches the filesystem under `config.root`.
    ///
    /// One entry per fixture, named with [`naming::test_name`], and one sub-scope per fixture-holding
    /// sub-directory (only when `patterns.recursive` is set). The root scope is named after the root directory.
    pub fn scaffold(config: SuiteConfig) -> HarnessResult<Self> {
        let matcher = FixtureMatcher::new(&config.patterns, config.target_backend.as_deref())?;
        let root_name = config
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .map_or_else(|| "Root".to_string(), naming::scope_name);
        let mut suite = Scope::root(root_name);
        let tree = FixtureTree::scan(&config.root, &matcher)?;
        scaffold_scope(&tree, Path::new(""), &mut suite, &matcher, config.patterns.recursive)?;
        Ok(Self::new(config, suite)?)
    }
}

fn scaffold_scope(
    tree: &FixtureTree,
    rel_dir: &Path,
    scope: &mut Scope,
    matcher: &FixtureMatcher,
    recursive: bool,
) -> HarnessResult<()> {
    let listing = tree.listing(rel_dir)?;

    let stems: Vec<(&PathBuf, String)> = listing
        .fixtures
        .iter()
        .map(|file| (file, matcher.patterns().stem(&file.to_string_lossy()).to_string()))
        .collect();
    let mut base_counts: HashMap<String, usize> = HashMap::new();
    for (_, stem) in &stems {
        *base_counts.entry(naming::test_name(stem)).or_default() += 1;
    }

    let mut used = HashSet::from([naming::all_files_present_name(&scope.name)]);
    for (file, stem) in &stems {
        let base = naming::test_name(stem);
        let base = if base_counts.get(&base).copied().unwrap_or(0) > 1 {
            let extension = file.extension().map(|e| e.to_string_lossy()).unwrap_or_default();
            naming::disambiguated_test_name(stem, &extension)
        } else {
            base
        };
        let mut name = base.clone();
        let mut n = 2;
        while used.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        used.insert(name.clone());
        scope.fixtures.push(FixtureManifestEntry::new(name, (*file).clone()));
    }

    if recursive {
        for sub in &listing.subdirs {
            let mut child = Scope::nested(naming::scope_name(&sub.to_string_lossy()), sub.clone());
            scaffold_scope(tree, &rel_dir.join(sub), &mut child, matcher, recursive)?;
            scope.scopes.push(child);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "root": "testData/evolution",
        "patterns": { "include": "^(.+)\\.kt$", "variants": ["fir"] },
        "target_backend": "JS",
        "suite": {
            "name": "Evolution",
            "fixtures": [
                { "name": "testAddOverloads", "path": "addOverloads.kt" }
            ],
            "scopes": [
                { "name": "Inline", "dir": "inline", "fixtures": [
                    { "name": "testBody", "path": "body.kt" }
                ] }
            ]
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.config.root, PathBuf::from("testData/evolution"));
        assert_eq!(manifest.config.target_backend.as_deref(), Some("JS"));
        assert_eq!(manifest.config.patterns.variants, vec!["fir"]);
        assert!(manifest.config.patterns.recursive);
        assert_eq!(manifest.suite.fixture_count(), 2);
        assert_eq!(manifest.suite.scopes[0].dir, PathBuf::from("inline"));
    }

    #[test]
    fn test_json_roundtrip_preserves_structure() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        let text = manifest.to_json_pretty().unwrap();
        assert_eq!(Manifest::from_json(&text).unwrap(), manifest);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let suite = Scope::root("S").with_fixture("testA", "a.kt").with_fixture("testA", "b.kt");
        let err = Manifest::new(SuiteConfig::new("r"), suite).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateFixtureName { name, .. } if name == "testA"));
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let suite = Scope::root("S").with_fixture("testA", "a.kt").with_fixture("testB", "a.kt");
        let err = Manifest::new(SuiteConfig::new("r"), suite).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateFixturePath { .. }));
    }

    #[test]
    fn test_duplicate_scope_dir_rejected() {
        let suite = Scope::root("S")
            .with_scope(Scope::nested("A", "sub"))
            .with_scope(Scope::nested("B", "sub"));
        let err = Manifest::new(SuiteConfig::new("r"), suite).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateScopeDir { .. }));
    }

    #[test]
    fn test_nested_paths_rejected() {
        for bad in ["sub/a.kt", "../a.kt", "/abs.kt", ""] {
            let suite = Scope::root("S").with_fixture("testA", bad);
            let err = Manifest::new(SuiteConfig::new("r"), suite).unwrap_err();
            assert!(matches!(err, ManifestError::InvalidPath { .. }), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_nested_scope_needs_dir() {
        let suite = Scope::root("S").with_scope(Scope::nested("Sub", ""));
        assert!(Manifest::new(SuiteConfig::new("r"), suite).is_err());
    }

    #[test]
    fn test_load_resolves_root_against_manifest_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("suite.json");
        fs::write(&path, SAMPLE).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.config.root, dir.path().join("testData/evolution"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Manifest::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn test_scaffold_mirrors_tree() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("evolution");
        fs::create_dir_all(root.join("jsCode")).unwrap();
        fs::write(root.join("addOverloads.kt"), "").unwrap();
        fs::write(root.join("addOverloads.fir.kt"), "").unwrap();
        fs::write(root.join("jsCode/inline.kt"), "").unwrap();

        let manifest = Manifest::scaffold(SuiteConfig::new(&root)).unwrap();
        assert_eq!(manifest.suite.name, "Evolution");
        assert_eq!(
            manifest.suite.fixtures,
            vec![FixtureManifestEntry::new("testAddOverloads", "addOverloads.kt")]
        );
        assert_eq!(manifest.suite.scopes.len(), 1);
        assert_eq!(manifest.suite.scopes[0].name, "JsCode");
        assert_eq!(manifest.suite.scopes[0].fixtures[0].name, "testInline");
    }

    #[test]
    fn test_root_scope_dir_rejected() {
        let suite = Scope::nested("S", "sub").with_fixture("testA", "a.kt");
        let err = Manifest::new(SuiteConfig::new("r"), suite).unwrap_err();
        assert!(matches!(err, ManifestError::RootScopeDir { dir, .. } if dir == Path::new("sub")));

        let json = r#"{ "root": "r", "suite": { "name": "S", "dir": "sub", "fixtures": [] } }"#;
        assert!(matches!(Manifest::from_json(json), Err(ManifestError::RootScopeDir { .. })));
    }

    #[test]
    fn test_scaffold_disambiguates_extension_collisions() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("a.kt"), "").unwrap();
        fs::write(dir.path().join("a.kts"), "").unwrap();
        fs::write(dir.path().join("b.kt"), "").unwrap();

        let manifest = Manifest::scaffold(SuiteConfig::new(dir.path())).unwrap();
        assert_eq!(
            manifest.suite.fixtures,
            vec![
                FixtureManifestEntry::new("testA_kt", "a.kt"),
                FixtureManifestEntry::new("testA_kts", "a.kts"),
                FixtureManifestEntry::new("testB", "b.kt"),
            ]
        );
    }

    #[test]
    fn test_scaffold_disambiguates_sanitized_collisions() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("a-b.kt"), "").unwrap();
        fs::write(dir.path().join("a_b.kt"), "").unwrap();

        let manifest = Manifest::scaffold(SuiteConfig::new(dir.path())).unwrap();
        let names: Vec<&str> = manifest.suite.fixtures.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["testA_b_kt", "testA_b_kt_2"]);
    }

    #[test]
    fn test_scaffold_avoids_coverage_fixture_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("allFilesPresentInRoot.kt"), "").unwrap();

        let manifest = Manifest::scaffold(SuiteConfig::new(&root)).unwrap();
        assert_eq!(manifest.suite.fixtures[0].name, "testAllFilesPresentInRoot_2");
    }
}
