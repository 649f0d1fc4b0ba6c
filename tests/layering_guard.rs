//! Layering guardrails for the vocabulary crate.
//!
//! `fixture_harness_core` holds the IO-free naming and directive vocabulary that suite authors share with the
//! harness. It must stay dependency-free, so this test scans its `Cargo.toml` and fails if `[dependencies]` gains an
//! entry.

#[test]
fn core_crate_has_no_dependencies() {
    let manifest = include_str!("../crates/fixture_harness_core/Cargo.toml");
    let mut in_dependencies = false;

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        panic!("`fixture_harness_core` must not depend on other crates, found: {line}");
    }
}

#[test]
fn harness_does_not_use_core_as_dev_dependency_only() {
    let manifest = include_str!("../Cargo.toml");
    let mut in_dependencies = false;

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        // Strip inline comments for robustness.
        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        if in_dependencies && line_no_comment.starts_with("fixture_harness_core") {
            return;
        }
    }
    panic!("`fixture_harness_core` must appear in [dependencies]");
}
