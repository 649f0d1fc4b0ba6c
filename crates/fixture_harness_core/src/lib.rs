//! Provide the shared, pure vocabulary of the fixture harness.
//!
//! This crate is intentionally small and dependency-free. It contains deterministic helpers that both:
//! - the harness uses to decide which files count as fixtures and how they behave on a backend, and
//! - suite authors can use to declare manifests whose names match what the harness derives.
//!
//! ## Notes
//!
//! - This is a "vocabulary" crate: **no IO**, no global state, and no harness-specific types.
//! - Current scope: the generated-variant suffix registry ([`variants`]), in-file directives ([`directives`]), and
//!   fixture/scope naming conventions ([`naming`]).

pub mod directives;
pub mod naming;
pub mod registry;
pub mod variants;

pub use directives::{BackendApplicability, Directive, applicability};
pub use naming::{all_files_present_name, scope_name, test_name};
pub use variants::{VariantId, default_tags};
