//! Expected vs actual.

use serde::Serialize;
use snip_eval::ExecutionResult;

use crate::example::{Example, Expectation};

/// The verdict for one example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub example_id: String,
    pub passed: bool,
    /// The expectation, rendered for the report.
    pub expected: String,
    /// What actually happened, rendered the same way.
    pub actual: String,
    /// Message of the raised condition, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Judge one execution against its example.
///
/// An output expectation passes only when the lines match exactly and
/// nothing was raised. An error expectation passes when the raised kind
/// matches, whatever was logged before it.
pub fn compare(example: &Example, result: &ExecutionResult) -> Outcome {
    let passed = match example.expectation() {
        Expectation::Output(lines) => result.completed() && result.actual_output == lines,
        Expectation::Error(kind) => result.actual_error == Some(kind),
    };
    Outcome {
        example_id: example.id().to_string(),
        passed,
        expected: render_expected(example.expectation()),
        actual: render_actual(result),
        error_message: result.error_message.clone(),
    }
}

fn render_lines(lines: &[String]) -> String {
    format!("output {lines:?}")
}

fn render_expected(expectation: Expectation<'_>) -> String {
    match expectation {
        Expectation::Output(lines) => render_lines(lines),
        Expectation::Error(kind) => kind.to_string(),
    }
}

fn render_actual(result: &ExecutionResult) -> String {
    match (&result.actual_error, &result.error_message) {
        (Some(kind), _) if result.actual_output.is_empty() => kind.to_string(),
        (Some(kind), _) => format!("{kind} after {}", render_lines(&result.actual_output)),
        (None, Some(message)) => message.clone(),
        (None, None) => render_lines(&result.actual_output),
    }
}
