//! Shareable metadata for `fixture_harness_core` registries.
//!
//! The vocabularies in this crate (variant suffixes, directives) are **registry-first**: every accepted spelling
//! lives in a `const` table with a stable identity and a description. This submodule provides the small metadata
//! type reused by all of them.
//!
//! ## See also
//! - [`crate::variants`]
//! - [`crate::directives`]

/// Shared metadata shape for registry items.
///
/// ## Notes
/// - `description` is mandatory to keep docs/tooling consistent.
/// - This type is `Copy` so it can live in `const` tables.
#[derive(Debug, Clone, Copy)]
pub struct ItemInfo<Id> {
    pub id: Id,
    pub canonical: &'static str,
    pub description: &'static str,
}

/// Build a registry entry.
pub(crate) const fn entry<Id>(id: Id, canonical: &'static str, description: &'static str) -> ItemInfo<Id> {
    ItemInfo {
        id,
        canonical,
        description,
    }
}
