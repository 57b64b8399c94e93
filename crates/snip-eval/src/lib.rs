//! snipcheck tree-walking evaluator.
//!
//! Executes snippets directly from the AST with JavaScript scoping rules:
//! `var` hoisting, `let`/`const` dead zones, per-iteration loop bindings,
//! lexical `this` for arrows and left-to-right default parameters.
//! [`Executor`] wraps one evaluation with output capture, a time budget and
//! error classification.

pub mod capture;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod inspect;
pub mod value;

pub use capture::{CaptureGuard, Console, OutputCapture};
pub use error::{EvalError, EvalResult};
pub use evaluator::{EvalConfig, Evaluator};
pub use executor::{ExecutionResult, Executor, ExecutorConfig, MAX_CALL_DEPTH};
pub use value::Value;
