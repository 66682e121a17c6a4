// crates/protoctl-cli/src/tests/i18n.rs
// ============================================================================
// Module: CLI i18n Tests
// Description: Unit tests for the message catalog.
// Purpose: Keep catalog keys, placeholders, and call sites consistent.
// Dependencies: protoctl-cli i18n module
// ============================================================================

//! ## Overview
//! Verifies catalog keys are unique, placeholders are well formed, every
//! key used by a `t!` call site exists, and no catalog entry is unused.

use std::collections::BTreeSet;

use crate::i18n::CATALOG_ITEMS;
use crate::i18n::MessageArg;
use crate::i18n::translate;

/// Sources whose `t!` call sites are checked against the catalog.
const SOURCES: &[&str] = &[
    include_str!("../app.rs"),
    include_str!("../args.rs"),
    include_str!("../complete.rs"),
    include_str!("../config_cmd.rs"),
    include_str!("../context.rs"),
    include_str!("../error.rs"),
    include_str!("../input.rs"),
    include_str!("../tree.rs"),
];

/// Placeholder names used by a catalog template.
fn parse_placeholder_names(template: &str) -> Result<BTreeSet<String>, String> {
    let mut placeholders = BTreeSet::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| format!("unclosed '{{' in '{template}'"))?;
        let name = &after[..end];
        if name.is_empty() || !name.chars().all(|ch| ch.is_ascii_lowercase() || ch == '_') {
            return Err(format!("placeholder '{name}' must use [a-z_]"));
        }
        placeholders.insert(name.to_string());
        rest = &after[end + 1..];
    }
    if rest.contains('}') {
        return Err(format!("unmatched '}}' in '{template}'"));
    }
    Ok(placeholders)
}

/// Message keys referenced by `t!` in the scanned sources.
fn used_keys() -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for source in SOURCES {
        let mut rest = *source;
        while let Some(start) = rest.find("t!(") {
            rest = rest[start + 3..].trim_start();
            if let Some(quoted) = rest.strip_prefix('"') {
                if let Some(end) = quoted.find('"') {
                    keys.insert(quoted[..end].to_string());
                }
            }
        }
    }
    keys
}

#[test]
fn catalog_has_unique_keys() {
    let mut seen = BTreeSet::new();
    for (key, _) in CATALOG_ITEMS {
        assert!(seen.insert(*key), "duplicate catalog key '{key}'");
    }
}

#[test]
fn catalog_templates_have_valid_placeholder_syntax() {
    for (key, template) in CATALOG_ITEMS {
        parse_placeholder_names(template)
            .unwrap_or_else(|error| panic!("invalid placeholder syntax for '{key}': {error}"));
    }
}

#[test]
fn every_used_key_is_in_the_catalog() {
    let catalog: BTreeSet<&str> = CATALOG_ITEMS.iter().map(|(key, _)| *key).collect();
    let used = used_keys();
    assert!(!used.is_empty());
    for key in &used {
        assert!(catalog.contains(key.as_str()), "missing catalog key '{key}'");
    }
    for key in catalog {
        assert!(used.contains(key), "unused catalog key '{key}'");
    }
}

#[test]
fn translate_substitutes_placeholders() {
    let output = translate(
        "discovery.failed",
        vec![MessageArg::new("address", "localhost:1"), MessageArg::new("error", "refused")],
    );
    assert_eq!(output, "Failed to discover services at localhost:1: refused");
}

#[test]
fn translate_falls_back_to_the_key() {
    assert_eq!(translate("no.such.key", Vec::new()), "no.such.key");
}

#[test]
fn service_about_matches_completion_format() {
    let output = crate::t!("tree.service.about", name = "FooAPI", file = "api.proto");
    assert_eq!(output, "FooAPI as defined in api.proto");
}
