//! Executor tests: classification, isolation between runs, determinism.
//!
//! Tests verify:
//! - the lesson scenarios (dead zone, const reassignment, loop counters)
//! - syntax errors are classified before anything runs
//! - one run never observes another run's bindings or listeners
//! - repeated runs produce identical output (100-iteration)
//! - the capture buffer is idle after every kind of completion

use std::time::Duration;

use snip_eval::{ExecutionResult, Executor, ExecutorConfig, MAX_CALL_DEPTH};
use snip_types::ErrorKind;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn executor() -> Executor {
    Executor::new(ExecutorConfig {
        timeout: Some(Duration::from_secs(5)),
        max_call_depth: 16,
    })
}

fn run(source: &str) -> ExecutionResult {
    executor().run("test", source)
}

const LET_COUNTER: &str = r#"
'use strict';
let updateFunctions = [];
for (let i = 0; i < 3; i++) {
  updateFunctions.push(function () { return i; });
}
console.log(updateFunctions[0]());
console.log(updateFunctions[1]());
console.log(updateFunctions[2]());
"#;

const VAR_COUNTER: &str = r#"
'use strict';
let updateFunctions = [];
for (var i = 0; i < 3; i++) {
  updateFunctions.push(function () { return i; });
}
console.log(updateFunctions[0]());
console.log(updateFunctions[1]());
console.log(updateFunctions[2]());
"#;

// ══════════════════════════════════════════════════════════════════════════════
// Scenarios
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn dead_zone_read_is_reference_error_with_no_output() {
    let result = run("'use strict';\nconsole.log(productId);\nlet productId = 12;");
    assert_eq!(result.actual_error, Some(ErrorKind::ReferenceError));
    assert!(result.actual_output.is_empty());
}

#[test]
fn const_reassignment_is_type_error() {
    let result = run("'use strict';\nconst MARKUP_CONST = 100;\nMARKUP_CONST = 10;\nconsole.log(MARKUP_CONST);");
    assert_eq!(result.actual_error, Some(ErrorKind::TypeError));
    assert!(result.actual_output.is_empty());
}

#[test]
fn const_reassignment_inside_block_is_type_error() {
    let source = r#"
'use strict';
const MARKUP_CONST = 100;
if (MARKUP_CONST > 0) {
  MARKUP_CONST = 10;
}
console.log(MARKUP_CONST);
"#;
    assert_eq!(run(source).actual_error, Some(ErrorKind::TypeError));
}

#[test]
fn let_counter_gives_each_iteration_its_value() {
    let result = run(LET_COUNTER);
    assert!(result.completed());
    assert_eq!(result.actual_output, vec!["0", "1", "2"]);
}

#[test]
fn var_counter_shares_final_value() {
    let result = run(VAR_COUNTER);
    assert!(result.completed());
    assert_eq!(result.actual_output, vec!["3", "3", "3"]);
}

#[test]
fn const_without_initializer_is_syntax_error() {
    let result = run("'use strict';\nconst MARKUP_CONST;\nconsole.log(MARKUP_CONST);");
    assert_eq!(result.actual_error, Some(ErrorKind::SyntaxError));
    assert!(result.actual_output.is_empty());
}

#[test]
fn redeclarations_are_syntax_errors_before_anything_runs() {
    let sources = [
        "console.log('early');\nvar x = 1;\nlet x = 2;\nconsole.log(x);",
        "console.log('early');\nfunction f(a) { let a = 2; return a; }\nconsole.log(f(1));",
        "console.log('early');\nlet f = 1;\nfunction f() {}\nconsole.log(f);",
    ];
    for source in sources {
        let result = run(source);
        assert_eq!(result.actual_error, Some(ErrorKind::SyntaxError), "{source}");
        assert!(result.actual_output.is_empty(), "{source}");
        let message = result.error_message.unwrap_or_default();
        assert!(message.ends_with("has already been declared"), "{message}");
    }
}

#[test]
fn strict_directive_with_semicolon_inside_quotes_is_sloppy() {
    // `'use strict;'` is an ordinary string statement, so `this` in a plain
    // call is the global object.
    let source = "'use strict;'\nfunction f() { console.log(this); }\nf();";
    assert_eq!(run(source).actual_output, vec!["Window"]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Isolation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn runs_do_not_share_bindings_or_listeners() {
    let mut executor = executor();
    let first = executor.run(
        "a",
        "var leaked = 1;\nglobalThis.alsoLeaked = 2;\ndocument.addEventListener('click', function () { console.log('stale'); });",
    );
    assert!(first.completed());

    let second = executor.run(
        "b",
        "console.log(typeof leaked, typeof alsoLeaked);\ndocument.dispatchEvent(new Event('click'));",
    );
    assert!(second.completed());
    assert_eq!(second.actual_output, vec!["undefined undefined"]);
}

#[test]
fn output_of_failed_run_does_not_leak_into_next() {
    let mut executor = executor();
    let failed = executor.run("a", "console.log('from a');\nnope();");
    assert_eq!(failed.actual_output, vec!["from a"]);
    assert!(executor.is_idle());

    let next = executor.run("b", "console.log('from b');");
    assert_eq!(next.actual_output, vec!["from b"]);
}

#[test]
fn capture_is_idle_after_syntax_error_and_timeout() {
    let mut executor = Executor::new(ExecutorConfig {
        timeout: Some(Duration::from_millis(20)),
        max_call_depth: 16,
    });
    executor.run("syntax", "let = ;");
    assert!(executor.is_idle());
    executor.run("spin", "console.log('x');\nfor (;;) {}");
    assert!(executor.is_idle());
    assert_eq!(executor.run("after", "console.log(1);").actual_output, vec!["1"]);
}

#[test]
fn runaway_recursion_at_deepest_setting_is_range_error() {
    let mut executor = Executor::new(ExecutorConfig {
        timeout: None,
        max_call_depth: MAX_CALL_DEPTH,
    });
    let result = executor.run(
        "deep",
        "function f(n) { return f(n + 1); }\nconsole.log('start');\nf(0);",
    );
    assert_eq!(result.actual_error, Some(ErrorKind::RangeError));
    assert_eq!(result.actual_output, vec!["start"]);
    assert!(executor.is_idle());

    let nested = executor.run(
        "nested",
        "function depth(n) { return n === 0 ? 0 : 1 + depth(n - 1); }\nconsole.log(depth(1000));",
    );
    assert!(nested.completed(), "{:?}", nested.error_message);
    assert_eq!(nested.actual_output, vec!["1000"]);
}

#[test]
fn oversized_call_depth_is_clamped_not_fatal() {
    let mut executor = Executor::new(ExecutorConfig {
        timeout: None,
        max_call_depth: 1_000_000,
    });
    let result = executor.run("deep", "function f() { return f(); }\nf();");
    assert_eq!(result.actual_error, Some(ErrorKind::RangeError));
    assert_eq!(executor.run("after", "console.log(1);").actual_output, vec!["1"]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn repeated_runs_are_identical() {
    let mut executor = executor();
    let reference = executor.run("let", LET_COUNTER);
    for _ in 0..100 {
        let again = executor.run("let", LET_COUNTER);
        assert_eq!(again.actual_output, reference.actual_output);
        assert_eq!(again.actual_error, reference.actual_error);
        assert_eq!(again.error_message, reference.error_message);
    }
}

#[test]
fn repeated_error_runs_are_identical() {
    let mut executor = executor();
    let source = "function f(a = b, b = 1) {}\nconsole.log('before');\nf();";
    let reference = executor.run("tdz", source);
    assert_eq!(reference.actual_error, Some(ErrorKind::ReferenceError));
    for _ in 0..100 {
        let again = executor.run("tdz", source);
        assert_eq!(again.actual_output, vec!["before"]);
        assert_eq!(again.error_message, reference.error_message);
    }
}
