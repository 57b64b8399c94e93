use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of syntax errors kept before the rest are only counted.
pub const MAX_ERRORS: usize = 20;

/// Classification of a condition raised while running a snippet.
///
/// The first four mirror the JavaScript error constructors a snippet can
/// trigger; `TimeoutError` is raised by the executor when a snippet exceeds
/// its time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ReferenceError,
    TypeError,
    SyntaxError,
    RangeError,
    TimeoutError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::ReferenceError,
        ErrorKind::TypeError,
        ErrorKind::SyntaxError,
        ErrorKind::RangeError,
        ErrorKind::TimeoutError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReferenceError => "ReferenceError",
            Self::TypeError => "TypeError",
            Self::SyntaxError => "SyntaxError",
            Self::RangeError => "RangeError",
            Self::TimeoutError => "TimeoutError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error kind '{0}'")]
pub struct UnknownErrorKind(pub String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownErrorKind(s.to_string()))
    }
}

/// A syntax diagnostic produced by the lexer or parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxError {
    /// Source name (the example id when run from the harness).
    pub file: String,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The offending source line, for context.
    pub source_line: String,
}

impl SyntaxError {
    pub fn new(
        file: impl Into<String>,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: SyntaxError: {}", self.file, self.span, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Bounded collection of syntax diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyntaxErrors {
    pub errors: Vec<SyntaxError>,
    pub total: usize,
}

impl SyntaxErrors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total > 0
    }

    /// Whether the cap has been reached and scanning should stop.
    pub fn is_full(&self) -> bool {
        self.total >= MAX_ERRORS
    }

    pub fn push(&mut self, error: SyntaxError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total += 1;
    }

    /// Append another collection, keeping the cap.
    pub fn extend(&mut self, other: SyntaxErrors) {
        let extra = other.total.saturating_sub(other.errors.len());
        for error in other.errors {
            self.push(error);
        }
        self.total += extra;
    }

    pub fn first(&self) -> Option<&SyntaxError> {
        self.errors.first()
    }
}
