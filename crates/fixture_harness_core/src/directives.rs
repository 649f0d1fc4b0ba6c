//! In-file fixture directives.
//!
//! A fixture may restrict or annotate the backends it applies to with line comments:
//!
//! ```text
//! // TARGET_BACKEND: JVM_IR
//! // IGNORE_BACKEND: JS, JS_ES6
//! ```
//!
//! Only the backend-related directives are interpreted here; everything else in the file belongs to the system under
//! test.

use crate::registry::{ItemInfo, entry};

/// Backend spelling that matches every backend in `TARGET_BACKEND` / `IGNORE_BACKEND` lists.
pub const ANY_BACKEND: &str = "ANY";

/// Stable identifier for a backend directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// The fixture only applies to the listed backends.
    TargetBackend,
    /// The fixture never applies to the listed backends.
    DontTargetExactBackend,
    /// The fixture applies but is expected to fail on the listed backends.
    IgnoreBackend,
}

/// Metadata for a directive.
pub type DirectiveInfo = ItemInfo<Directive>;

/// Registry of all interpreted directives.
pub const DIRECTIVES: &[DirectiveInfo] = &[
    entry(
        Directive::TargetBackend,
        "TARGET_BACKEND",
        "Restrict the fixture to the listed backends.",
    ),
    entry(
        Directive::DontTargetExactBackend,
        "DONT_TARGET_EXACT_BACKEND",
        "Exclude the fixture from the listed backends.",
    ),
    entry(
        Directive::IgnoreBackend,
        "IGNORE_BACKEND",
        "Expect the fixture to fail on the listed backends.",
    ),
];

/// Return the canonical spelling for a directive.
pub fn as_str(directive: Directive) -> &'static str {
    match directive {
        Directive::TargetBackend => "TARGET_BACKEND",
        Directive::DontTargetExactBackend => "DONT_TARGET_EXACT_BACKEND",
        Directive::IgnoreBackend => "IGNORE_BACKEND",
    }
}

/// Resolve a spelling to a [`Directive`].
pub fn from_str(name: &str) -> Option<Directive> {
    DIRECTIVES.iter().find(|d| d.canonical == name).map(|d| d.id)
}

/// How a fixture relates to one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendApplicability {
    /// The fixture runs and is expected to pass.
    Applies,
    /// The fixture runs and is expected to fail.
    ExpectedFailure,
    /// The fixture does not apply to this backend at all.
    NotApplicable,
}

/// Collect every value listed by `directive` in `text`, in order of appearance.
///
/// Values are comma-separated and trimmed; a directive may appear on several lines.
///
/// ## Examples
/// ```rust
/// use fixture_harness_core::directives::{Directive, values};
///
/// let text = "// IGNORE_BACKEND: JS, JS_ES6\n// IGNORE_BACKEND: WASM\nfun box() = \"OK\"\n";
/// assert_eq!(values(text, Directive::IgnoreBackend), vec!["JS", "JS_ES6", "WASM"]);
/// ```
pub fn values(text: &str, directive: Directive) -> Vec<&str> {
    let name = as_str(directive);
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix("//"))
        .filter_map(|rest| rest.trim_start().strip_prefix(name))
        // `IGNORE_BACKEND_K1:` must not be read as `IGNORE_BACKEND`.
        .filter_map(|rest| rest.trim_start().strip_prefix(':'))
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

/// Decide how the fixture whose content is `text` relates to `backend`.
///
/// ## Notes
/// - No `TARGET_BACKEND` directive means the fixture targets every backend.
/// - `DONT_TARGET_EXACT_BACKEND` wins over `TARGET_BACKEND`.
/// - `IGNORE_BACKEND` only matters for fixtures that apply.
pub fn applicability(text: &str, backend: &str) -> BackendApplicability {
    let targets = values(text, Directive::TargetBackend);
    let targeted = targets.is_empty() || targets.iter().any(|t| *t == backend || *t == ANY_BACKEND);
    let excluded = values(text, Directive::DontTargetExactBackend).contains(&backend);
    if !targeted || excluded {
        return BackendApplicability::NotApplicable;
    }

    let ignored = values(text, Directive::IgnoreBackend)
        .iter()
        .any(|b| *b == backend || *b == ANY_BACKEND);
    if ignored {
        BackendApplicability::ExpectedFailure
    } else {
        BackendApplicability::Applies
    }
}
