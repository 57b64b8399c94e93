//! Isolated execution of a single snippet.
//!
//! Every [`Executor::run`] parses and evaluates from scratch: a new scope
//! arena, global object and evaluator per call. Only the capture buffer is
//! reused, and it is emptied on install and on release.
//!
//! The evaluator recurses on the native stack, so each run happens on a
//! scoped worker thread whose stack is sized from the call-depth limit.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use snip_parser::parse_source;
use snip_types::{ErrorKind, SourceFile};

use crate::capture::OutputCapture;
use crate::error::EvalError;
use crate::evaluator::{EvalConfig, Evaluator};

/// Highest accepted `max_call_depth`. Larger settings are clamped.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Worker stack: a fixed base for parsing plus a slice per nested call.
const STACK_BASE: usize = 8 * 1024 * 1024;
const STACK_PER_CALL: usize = 512 * 1024;

fn stack_size(max_call_depth: usize) -> usize {
    STACK_BASE + max_call_depth.min(MAX_CALL_DEPTH) * STACK_PER_CALL
}

/// Per-run limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub timeout: Option<Duration>,
    pub max_call_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let eval = EvalConfig::default();
        Self {
            timeout: eval.timeout,
            max_call_depth: eval.max_call_depth,
        }
    }
}

/// What one snippet actually did.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub example_id: String,
    /// Captured `console.log` lines, in order. Lines written before an
    /// error are kept.
    pub actual_output: Vec<String>,
    pub actual_error: Option<ErrorKind>,
    /// Full message of the raised condition, including internal errors
    /// that carry no [`ErrorKind`].
    pub error_message: Option<String>,
    pub duration: Duration,
}

impl ExecutionResult {
    /// The run finished without raising anything.
    pub fn completed(&self) -> bool {
        self.actual_error.is_none() && self.error_message.is_none()
    }
}

/// Runs snippets one at a time, each in a fresh runtime.
#[derive(Debug, Default)]
pub struct Executor {
    config: ExecutorConfig,
    capture: OutputCapture,
}

impl Executor {
    pub fn new(mut config: ExecutorConfig) -> Self {
        if config.max_call_depth > MAX_CALL_DEPTH {
            warn!(
                "max call depth {} clamped to {MAX_CALL_DEPTH}",
                config.max_call_depth
            );
            config.max_call_depth = MAX_CALL_DEPTH;
        }
        Self {
            config,
            capture: OutputCapture::new(),
        }
    }

    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Parse and evaluate `source`. Never fails: every condition the
    /// snippet raises is recorded in the result.
    pub fn run(&mut self, id: &str, source: &str) -> ExecutionResult {
        let started = Instant::now();
        debug!("running example '{id}'");

        let config = EvalConfig {
            timeout: self.config.timeout,
            max_call_depth: self.config.max_call_depth.min(MAX_CALL_DEPTH),
        };
        let capture = &mut self.capture;
        let (actual_output, error) = thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name("snippet".into())
                .stack_size(stack_size(config.max_call_depth))
                .spawn_scoped(scope, move || execute(id, source, config, capture));
            match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|payload| {
                    (
                        Vec::new(),
                        Some(EvalError::Internal(panic_message(payload.as_ref()))),
                    )
                }),
                Err(err) => (
                    Vec::new(),
                    Some(EvalError::Internal(format!("cannot start evaluator thread: {err}"))),
                ),
            }
        });

        if let Some(EvalError::Internal(message)) = &error {
            warn!("example '{id}' hit an internal error: {message}");
        }
        let result = ExecutionResult {
            example_id: id.to_string(),
            actual_output,
            actual_error: error.as_ref().and_then(EvalError::kind),
            error_message: error.as_ref().map(ToString::to_string),
            duration: started.elapsed(),
        };
        debug!(
            "example '{id}' finished in {:?} ({} lines, error: {:?})",
            result.duration,
            result.actual_output.len(),
            result.actual_error
        );
        result
    }

    /// No capture is active and the buffer is empty.
    pub fn is_idle(&self) -> bool {
        self.capture.is_idle()
    }
}

/// Body of one run, on the worker thread. The AST and runtime are built
/// and dropped here; only the captured lines and the error come back.
fn execute(
    id: &str,
    source: &str,
    config: EvalConfig,
    capture: &mut OutputCapture,
) -> (Vec<String>, Option<EvalError>) {
    let file = SourceFile::new(id, source);
    let parsed = parse_source(&file);
    let Some(program) = parsed.program else {
        let message = parsed
            .errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "Invalid or unexpected token".into());
        return (Vec::new(), Some(EvalError::syntax(message)));
    };

    let mut guard = capture.install();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut evaluator = Evaluator::new(&mut guard, config);
        evaluator.run_program(&program)
    }));
    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err),
        Err(payload) => Some(EvalError::Internal(panic_message(payload.as_ref()))),
    };
    (guard.finish(), error)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "evaluator panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_runs_nothing() {
        let mut executor = Executor::default();
        let result = executor.run("bad", "console.log(1);\nconst x;");
        assert_eq!(result.actual_error, Some(ErrorKind::SyntaxError));
        assert!(result.actual_output.is_empty());
        assert_eq!(
            result.error_message.as_deref(),
            Some("SyntaxError: Missing initializer in const declaration")
        );
    }

    #[test]
    fn test_output_before_throw_is_kept() {
        let mut executor = Executor::default();
        let result = executor.run("partial", "console.log('a');\nmissing();");
        assert_eq!(result.actual_output, vec!["a"]);
        assert_eq!(result.actual_error, Some(ErrorKind::ReferenceError));
        assert!(executor.is_idle());
    }

    #[test]
    fn test_call_depth_is_clamped() {
        let executor = Executor::new(ExecutorConfig {
            timeout: None,
            max_call_depth: 1_000_000,
        });
        assert_eq!(executor.config().max_call_depth, MAX_CALL_DEPTH);
    }

    #[test]
    fn test_stack_grows_with_depth() {
        assert!(stack_size(MAX_CALL_DEPTH) > stack_size(64));
        assert_eq!(stack_size(usize::MAX), stack_size(MAX_CALL_DEPTH));
    }

    #[test]
    fn test_clean_run_completes() {
        let mut executor = Executor::default();
        let result = executor.run("ok", "console.log(1 + 1);");
        assert!(result.completed());
        assert_eq!(result.example_id, "ok");
        assert_eq!(result.actual_output, vec!["2"]);
    }
}
