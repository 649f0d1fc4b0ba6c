//! Naming conventions for declared fixtures and scopes.
//!
//! Names are derived, never chosen: a manifest scaffolded from disk and one written by hand agree as long as both go
//! through these helpers.

/// Prefix shared by every fixture test name.
pub const TEST_PREFIX: &str = "test";

/// Prefix of the synthetic per-scope coverage fixture.
pub const ALL_FILES_PRESENT_PREFIX: &str = "testAllFilesPresentIn";

/// Derive the test name of a fixture from its stem.
///
/// `stem` is the first capture group of the include pattern (or the file stem when the pattern has no group).
///
/// ## Examples
/// ```rust
/// use fixture_harness_core::naming::test_name;
///
/// assert_eq!(test_name("addOverloads"), "testAddOverloads");
/// assert_eq!(test_name("simple.test"), "testSimple_test");
/// ```
pub fn test_name(stem: &str) -> String {
    format!("{TEST_PREFIX}{}", capitalized_identifier(stem))
}

/// Test name of a fixture whose stem collides with a sibling's, suffixed with its sanitized file extension.
///
/// ## Examples
/// ```rust
/// use fixture_harness_core::naming::disambiguated_test_name;
///
/// assert_eq!(disambiguated_test_name("a", "kts"), "testA_kts");
/// assert_eq!(disambiguated_test_name("a", ""), "testA_");
/// ```
pub fn disambiguated_test_name(stem: &str, extension: &str) -> String {
    format!("{}_{}", test_name(stem), identifier(extension))
}

/// Derive the name of the scope mirroring directory `dir_name`.
pub fn scope_name(dir_name: &str) -> String {
    capitalized_identifier(dir_name)
}

/// Name of the synthetic coverage fixture of a scope.
pub fn all_files_present_name(scope: &str) -> String {
    format!("{ALL_FILES_PRESENT_PREFIX}{scope}")
}

fn identifier(raw: &str) -> String {
    raw.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect()
}

fn capitalized_identifier(raw: &str) -> String {
    let mut out = identifier(raw);
    if let Some(first) = out.get_mut(..1) {
        first.make_ascii_uppercase();
    }
    out
}
