//! End-to-end runs over catalogs.
//!
//! Tests verify:
//! - every built-in example passes
//! - report lines and the `N/M passed` summary
//! - rejected entries never reach the run count
//! - the failure cap is checked between examples
//! - runaway recursion at the deepest setting does not end the run
//! - repeated runs produce identical summaries and digests (100-iteration)

use std::time::Duration;

use snip_eval::{ExecutorConfig, MAX_CALL_DEPTH};
use snip_harness::{
    Catalog, JsonReporter, LoadedCatalog, RunConfig, RunSummary, Runner, TextReporter,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn config() -> RunConfig {
    RunConfig {
        executor: ExecutorConfig {
            timeout: Some(Duration::from_millis(250)),
            max_call_depth: 32,
        },
        ..RunConfig::default()
    }
}

/// Run `catalog` and return the text report with its summary.
fn run_text(catalog: &LoadedCatalog, config: RunConfig) -> (String, RunSummary) {
    let mut reporter = TextReporter::new(Vec::new());
    let summary = Runner::new(config)
        .run(catalog, &mut reporter)
        .expect("writing to a Vec cannot fail");
    let text = String::from_utf8(reporter.into_inner()).expect("utf-8 report");
    (text, summary)
}

const MIXED: &str = r#"
[[example]]
id = "pass-one"
source = "console.log(1);"
expected_output = ["1"]

[[example]]
id = "fail-one"
source = "console.log(2);"
expected_output = ["3"]

[[example]]
id = "rejected"
source = "   "
expected_output = ["1"]

[[example]]
id = "fail-two"
source = "let x = 1;"
expected_error = "TypeError"

[[example]]
id = "pass-two"
source = "'use strict';\nnope = 1;"
expected_error = "ReferenceError"
"#;

// ══════════════════════════════════════════════════════════════════════════════
// Built-in catalog
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn builtin_catalog_passes() {
    let catalog = Catalog::builtin().expect("builtin parses");
    let (text, summary) = run_text(&catalog, config());
    assert!(summary.all_passed(), "report:\n{text}");
    assert_eq!(summary.total, catalog.len());
    assert_eq!(summary.failed, 0);
    assert!(text.ends_with(&format!("{0}/{0} passed\n", catalog.len())));
}

#[test]
fn builtin_report_is_in_catalog_order() {
    let catalog = Catalog::builtin().expect("builtin parses");
    let (text, _) = run_text(&catalog, config());
    let ids: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("PASS "))
        .collect();
    let expected: Vec<&str> = catalog.examples.iter().map(|e| e.id()).collect();
    assert_eq!(ids, expected);
}

// ══════════════════════════════════════════════════════════════════════════════
// Reporting
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn mixed_catalog_report() {
    let catalog = Catalog::load(MIXED).expect("valid TOML");
    let (text, summary) = run_text(&catalog, config());
    assert_eq!(
        text,
        "PASS pass-one\n\
         FAIL fail-one: expected output [\"3\"] got output [\"2\"]\n\
         FAIL fail-two: expected TypeError got output []\n\
         PASS pass-two\n\
         2/4 passed\n"
    );
    assert_eq!(summary.total, 4);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.rejected, 1);
    assert!(!summary.all_passed());
}

#[test]
fn rejected_empty_source_is_excluded_from_count() {
    let text = r#"
[[example]]
id = "good"
source = "console.log('ok');"
expected_output = ["ok"]

[[example]]
id = "empty"
source = ""
expected_output = ["ok"]
"#;
    let catalog = Catalog::load(text).expect("valid TOML");
    let (report, summary) = run_text(&catalog, config());
    assert_eq!(report, "PASS good\n1/1 passed\n");
    assert_eq!(summary.rejected, 1);
    assert!(summary.all_passed());
}

#[test]
fn failure_cap_stops_between_examples() {
    let catalog = Catalog::load(MIXED).expect("valid TOML");
    let (text, summary) = run_text(
        &catalog,
        RunConfig {
            max_failures: Some(1),
            ..config()
        },
    );
    assert!(summary.stopped_early);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total, 4);
    assert!(text.starts_with("PASS pass-one\nFAIL fail-one"));
    assert!(text.ends_with("stopped after 1 failures\n1/4 passed\n"));
}

#[test]
fn filter_selects_by_id() {
    let catalog = Catalog::load(MIXED).expect("valid TOML");
    let (text, summary) = run_text(
        &catalog,
        RunConfig {
            filter: Some("pass".into()),
            ..config()
        },
    );
    assert_eq!(text, "PASS pass-one\nPASS pass-two\n2/2 passed\n");
    assert!(summary.all_passed());
}

#[test]
fn json_report_contains_outcomes_and_summary() {
    let catalog = Catalog::load(MIXED).expect("valid TOML");
    let mut reporter = JsonReporter::new(Vec::new());
    Runner::new(config())
        .run(&catalog, &mut reporter)
        .expect("report written");
    let json: serde_json::Value =
        serde_json::from_slice(&reporter.into_inner()).expect("valid JSON");
    assert_eq!(json["outcomes"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["outcomes"][1]["example_id"], "fail-one");
    assert_eq!(json["outcomes"][1]["passed"], false);
    assert_eq!(json["summary"]["rejected"], 1);
    assert_eq!(json["summary"]["passed"], 2);
}

#[test]
fn runaway_recursion_does_not_stop_the_run() {
    let text = r#"
[[example]]
id = "recurse"
source = "function f(n) { return f(n + 1); }\nf(0);"
expected_error = "RangeError"

[[example]]
id = "after"
source = "console.log(1);"
expected_output = ["1"]
"#;
    let catalog = Catalog::load(text).expect("valid TOML");
    let (report, summary) = run_text(
        &catalog,
        RunConfig {
            executor: ExecutorConfig {
                timeout: None,
                max_call_depth: MAX_CALL_DEPTH,
            },
            ..RunConfig::default()
        },
    );
    assert_eq!(report, "PASS recurse\nPASS after\n2/2 passed\n");
    assert!(summary.all_passed());
}

// ══════════════════════════════════════════════════════════════════════════════
// Idempotence
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn repeated_runs_have_identical_summaries() {
    let catalog = Catalog::load(MIXED).expect("valid TOML");
    let (_, reference) = run_text(&catalog, config());
    assert_eq!(reference.digest.len(), 64);
    for _ in 0..100 {
        let (_, again) = run_text(&catalog, config());
        assert_eq!(again, reference);
    }
}

#[test]
fn digest_tracks_verdicts() {
    let catalog = Catalog::load(MIXED).expect("valid TOML");
    let (_, all) = run_text(&catalog, config());
    let (_, filtered) = run_text(
        &catalog,
        RunConfig {
            filter: Some("pass".into()),
            ..config()
        },
    );
    assert_ne!(all.digest, filtered.digest);
}
