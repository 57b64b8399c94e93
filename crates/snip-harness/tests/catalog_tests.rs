//! Catalog loading tests.
//!
//! Tests verify:
//! - malformed entries are rejected individually and excluded from the count
//! - duplicate ids keep the first entry
//! - unknown error kinds are rejected with a reason
//! - a document that is not TOML is fatal
//! - the built-in catalog covers every lesson section

use snip_harness::{Catalog, CatalogError, MalformedExampleError, RejectReason};
use snip_types::ErrorKind;

// ══════════════════════════════════════════════════════════════════════════════
// Rejection
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn empty_source_is_rejected_and_not_counted() {
    let text = r#"
[[example]]
id = "ok"
source = "console.log(1);"
expected_output = ["1"]

[[example]]
id = "empty"
source = ""
expected_output = ["1"]
"#;
    let catalog = Catalog::load(text).expect("valid TOML");
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.examples[0].id(), "ok");
    assert_eq!(catalog.rejected.len(), 1);
    assert_eq!(catalog.rejected[0].id, "empty");
    assert_eq!(
        catalog.rejected[0].reason,
        RejectReason::Malformed(MalformedExampleError::EmptySource)
    );
}

#[test]
fn expectation_rules_are_enforced() {
    let text = r#"
[[example]]
id = "both"
source = "x;"
expected_output = ["1"]
expected_error = "ReferenceError"

[[example]]
id = "neither"
source = "x;"

[[example]]
source = "x;"
expected_error = "ReferenceError"
"#;
    let catalog = Catalog::load(text).expect("valid TOML");
    assert!(catalog.is_empty());
    let reasons: Vec<_> = catalog
        .rejected
        .iter()
        .map(|r| (r.id.as_str(), r.reason.to_string()))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("both", "both expected_output and expected_error are set".to_string()),
            ("neither", "neither expected_output nor expected_error is set".to_string()),
            ("#3", "example id is empty".to_string()),
        ]
    );
}

#[test]
fn duplicate_id_keeps_first() {
    let text = r#"
[[example]]
id = "dup"
source = "console.log('first');"
expected_output = ["first"]

[[example]]
id = "dup"
source = "console.log('second');"
expected_output = ["second"]
"#;
    let catalog = Catalog::load(text).expect("valid TOML");
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.examples[0].expected_output(), ["first"]);
    assert_eq!(
        catalog.rejected[0].reason,
        RejectReason::Malformed(MalformedExampleError::DuplicateId("dup".into()))
    );
}

#[test]
fn unknown_error_kind_is_rejected() {
    let text = r#"
[[example]]
id = "weird"
source = "x;"
expected_error = "OopsError"
"#;
    let catalog = Catalog::load(text).expect("valid TOML");
    assert!(catalog.is_empty());
    assert_eq!(
        catalog.rejected[0].reason.to_string(),
        "expected_error: unknown error kind 'OopsError'"
    );
}

#[test]
fn invalid_toml_is_fatal() {
    let result = Catalog::load("[[example]\nid = ");
    assert!(matches!(result, Err(CatalogError::Toml(_))));
}

#[test]
fn empty_document_has_no_examples() {
    let catalog = Catalog::load("").expect("valid TOML");
    assert!(catalog.is_empty());
    assert!(catalog.rejected.is_empty());
}

// ══════════════════════════════════════════════════════════════════════════════
// Built-in catalog
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn builtin_covers_every_section() {
    let catalog = Catalog::builtin().expect("builtin parses");
    assert!(catalog.rejected.is_empty());
    for prefix in ["scoping/", "arrows/", "this/", "defaults/", "demo/"] {
        assert!(
            !catalog.select(Some(prefix)).is_empty(),
            "no examples under {prefix}"
        );
    }
}

#[test]
fn builtin_has_the_scenario_examples() {
    let catalog = Catalog::builtin().expect("builtin parses");
    let dead_zone = catalog.get("scoping/let-dead-zone").expect("present");
    assert_eq!(dead_zone.expected_error(), Some(ErrorKind::ReferenceError));
    let per_iteration = catalog.get("scoping/let-loop-per-iteration").expect("present");
    assert_eq!(per_iteration.expected_output(), ["0", "1", "2"]);
    let timeout = catalog.get("demo/infinite-loop").expect("present");
    assert_eq!(timeout.expected_error(), Some(ErrorKind::TimeoutError));
}
