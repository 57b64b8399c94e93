use serde::{Deserialize, Serialize};
use std::fmt;

/// A 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Source region covered by a token or AST node.
///
/// `end` is inclusive: a one-character token at column 5 spans `5..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    /// A zero-width span at a single position.
    pub fn point(line: u32, col: u32) -> Self {
        let p = Pos::new(line, col);
        Self::new(p, p)
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.col)
    }
}

/// A named piece of snippet source, with line lookup for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// The text of a 1-based line without its terminator.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = line_number.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = match self.line_starts.get(idx + 1) {
            Some(next) => next - 1,
            None => self.source.len(),
        };
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    /// The line a span starts on, or an empty string when out of range.
    pub fn line_of(&self, span: Span) -> &str {
        self.line(span.start.line).unwrap_or("")
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to_covers_both() {
        let a = Span::new(Pos::new(1, 5), Pos::new(1, 10));
        let b = Span::new(Pos::new(2, 3), Pos::new(2, 8));
        let merged = a.to(b);
        assert_eq!(merged.start, Pos::new(1, 5));
        assert_eq!(merged.end, Pos::new(2, 8));
    }

    #[test]
    fn test_span_to_same_line_picks_extremes() {
        let a = Span::new(Pos::new(1, 5), Pos::new(1, 10));
        let b = Span::new(Pos::new(1, 3), Pos::new(1, 8));
        let merged = b.to(a);
        assert_eq!(merged.start.col, 3);
        assert_eq!(merged.end.col, 10);
    }

    #[test]
    fn test_span_display_uses_start() {
        let s = Span::new(Pos::new(3, 7), Pos::new(4, 1));
        assert_eq!(s.to_string(), "3:7");
    }

    #[test]
    fn test_line_lookup() {
        let src = SourceFile::new("t.js", "let a = 1;\nconsole.log(a);\r\n}");
        assert_eq!(src.line(1), Some("let a = 1;"));
        assert_eq!(src.line(2), Some("console.log(a);"));
        assert_eq!(src.line(3), Some("}"));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
        assert_eq!(src.line_count(), 3);
    }

    #[test]
    fn test_line_of_out_of_range_is_empty() {
        let src = SourceFile::new("t.js", "x");
        assert_eq!(src.line_of(Span::point(9, 1)), "");
    }

    #[test]
    fn test_empty_source_has_one_line() {
        let src = SourceFile::new("t.js", "");
        assert_eq!(src.line_count(), 1);
        assert_eq!(src.line(1), Some(""));
    }
}
