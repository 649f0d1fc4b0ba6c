//! Generated-variant suffix vocabulary.
//!
//! Fixture files may carry a tag between their stem and extension (`foo.fir.kt`, `bar.reversed.kts`). Such files
//! are generated or alternative expectations of another fixture and never require a manifest entry of their own.
//!
//! ## Notes
//! - Matching is **case-sensitive** (`latestLV` is not `latestlv`).
//! - Adding a new variant kind is a one-line change to [`VARIANTS`]; [`default_tags`] follows it.

use crate::registry::{ItemInfo, entry};

/// Stable identifier for a generated-variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantId {
    Reversed,
    Fir,
    Ll,
    LatestLv,
}

/// Metadata for a variant tag.
pub type VariantInfo = ItemInfo<VariantId>;

/// Registry of all known generated-variant tags.
pub const VARIANTS: &[VariantInfo] = &[
    entry(
        VariantId::Reversed,
        "reversed",
        "Expectations produced by resolving declarations in reversed order.",
    ),
    entry(VariantId::Fir, "fir", "Expectations specific to the new frontend."),
    entry(VariantId::Ll, "ll", "Expectations specific to the low-level analysis API."),
    entry(
        VariantId::LatestLv,
        "latestLV",
        "Expectations for the latest language version.",
    ),
];

/// Resolve a spelling to a [`VariantId`].
pub fn from_str(tag: &str) -> Option<VariantId> {
    VARIANTS.iter().find(|v| v.canonical == tag).map(|v| v.id)
}

/// Return the canonical spelling for a variant.
pub fn as_str(id: VariantId) -> &'static str {
    match VARIANTS.iter().find(|v| v.id == id) {
        Some(info) => info.canonical,
        None => "",
    }
}

/// Canonical spellings of every registered variant, in registry order.
///
/// This is the default tag set excluded from coverage counting.
///
/// ## Examples
/// ```rust
/// use fixture_harness_core::variants::default_tags;
///
/// assert_eq!(default_tags().collect::<Vec<_>>(), vec!["reversed", "fir", "ll", "latestLV"]);
/// ```
pub fn default_tags() -> impl Iterator<Item = &'static str> {
    VARIANTS.iter().map(|v| v.canonical)
}
