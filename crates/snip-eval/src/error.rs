//! Runtime error types for the snippet evaluator.

use snip_types::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Abrupt completion of a snippet.
///
/// Every condition a snippet can raise is one of these; none of them ever
/// escapes the executor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A JavaScript exception (`ReferenceError`, `TypeError`, ...).
    #[error("{kind}: {message}")]
    Thrown { kind: ErrorKind, message: String },
    /// The wall-clock budget ran out.
    #[error("TimeoutError: execution exceeded {}ms", .0.as_millis())]
    Timeout(Duration),
    /// A bug in the evaluator itself, not in the snippet.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EvalError {
    pub fn reference(message: impl Into<String>) -> Self {
        Self::thrown(ErrorKind::ReferenceError, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::thrown(ErrorKind::TypeError, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::thrown(ErrorKind::RangeError, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::thrown(ErrorKind::SyntaxError, message)
    }

    fn thrown(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Thrown {
            kind,
            message: message.into(),
        }
    }

    /// The classification reported for this error. Internal errors have none.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Thrown { kind, .. } => Some(*kind),
            Self::Timeout(_) => Some(ErrorKind::TimeoutError),
            Self::Internal(_) => None,
        }
    }
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_engine_format() {
        let err = EvalError::reference("productId is not defined");
        assert_eq!(err.to_string(), "ReferenceError: productId is not defined");
        let err = EvalError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "TimeoutError: execution exceeded 250ms");
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            EvalError::type_error("x").kind(),
            Some(ErrorKind::TypeError)
        );
        assert_eq!(
            EvalError::Timeout(Duration::ZERO).kind(),
            Some(ErrorKind::TimeoutError)
        );
        assert_eq!(EvalError::Internal("bug".into()).kind(), None);
    }
}
