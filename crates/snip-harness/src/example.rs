//! Validated example records.

use sha2::{Digest, Sha256};
use snip_types::ErrorKind;
use thiserror::Error;

/// Why an example was refused at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedExampleError {
    #[error("example id is empty")]
    EmptyId,
    #[error("source is empty")]
    EmptySource,
    #[error("both expected_output and expected_error are set")]
    ConflictingExpectations,
    #[error("neither expected_output nor expected_error is set")]
    MissingExpectation,
    #[error("duplicate example id '{0}'")]
    DuplicateId(String),
}

/// What an example is expected to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation<'a> {
    /// Complete normally, logging exactly these lines.
    Output(&'a [String]),
    /// Raise this kind of error.
    Error(ErrorKind),
}

/// One catalog entry. Immutable once built; the constructor enforces that
/// the source is non-blank and exactly one expectation is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    id: String,
    title: Option<String>,
    source: String,
    expected_output: Vec<String>,
    expected_error: Option<ErrorKind>,
}

impl Example {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        expected_output: Vec<String>,
        expected_error: Option<ErrorKind>,
    ) -> Result<Self, MalformedExampleError> {
        let id = id.into();
        let source = source.into();
        if id.trim().is_empty() {
            return Err(MalformedExampleError::EmptyId);
        }
        if source.trim().is_empty() {
            return Err(MalformedExampleError::EmptySource);
        }
        match (expected_output.is_empty(), expected_error) {
            (false, Some(_)) => return Err(MalformedExampleError::ConflictingExpectations),
            (true, None) => return Err(MalformedExampleError::MissingExpectation),
            _ => {}
        }
        Ok(Self {
            id,
            title: None,
            source,
            expected_output,
            expected_error,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expected_output(&self) -> &[String] {
        &self.expected_output
    }

    pub fn expected_error(&self) -> Option<ErrorKind> {
        self.expected_error
    }

    pub fn expectation(&self) -> Expectation<'_> {
        match self.expected_error {
            Some(kind) => Expectation::Error(kind),
            None => Expectation::Output(&self.expected_output),
        }
    }

    /// SHA-256 of the source text, hex encoded.
    pub fn source_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_output_example() {
        let example = Example::new("a", "console.log(1);", lines(&["1"]), None)
            .expect("valid")
            .with_title("logs one");
        assert_eq!(example.id(), "a");
        assert_eq!(example.title(), Some("logs one"));
        assert_eq!(example.expectation(), Expectation::Output(&lines(&["1"])));
    }

    #[test]
    fn test_valid_error_example() {
        let example = Example::new("b", "x;", Vec::new(), Some(ErrorKind::ReferenceError))
            .expect("valid");
        assert_eq!(
            example.expectation(),
            Expectation::Error(ErrorKind::ReferenceError)
        );
    }

    #[test]
    fn test_rejects_blank_source() {
        assert_eq!(
            Example::new("c", "  \n", lines(&["1"]), None),
            Err(MalformedExampleError::EmptySource)
        );
    }

    #[test]
    fn test_rejects_bad_expectations() {
        assert_eq!(
            Example::new("d", "1;", lines(&["1"]), Some(ErrorKind::TypeError)),
            Err(MalformedExampleError::ConflictingExpectations)
        );
        assert_eq!(
            Example::new("e", "1;", Vec::new(), None),
            Err(MalformedExampleError::MissingExpectation)
        );
        assert_eq!(
            Example::new("", "1;", lines(&["1"]), None),
            Err(MalformedExampleError::EmptyId)
        );
    }

    #[test]
    fn test_source_digest_is_stable() {
        let a = Example::new("a", "1;", lines(&["1"]), None).expect("valid");
        let b = Example::new("b", "1;", lines(&["2"]), None).expect("valid");
        assert_eq!(a.source_digest(), b.source_digest());
        assert_eq!(a.source_digest().len(), 64);
    }
}
