//! Core snippet lexer: converts source text to a token stream.
//!
//! Features:
//! - Identifiers, the reserved words in [`crate::ALL_KEYWORDS`], numbers and
//!   single- or double-quoted strings
//! - `//` and `/* */` comments skipped
//! - Line breaks are not tokens; each token records whether one preceded it
//!   so the parser can insert semicolons
//! - Error recovery: collects up to [`snip_types::MAX_ERRORS`] errors

use snip_types::{Pos, SourceFile, Span, SyntaxError, SyntaxErrors};

use crate::token::{Token, TokenKind};

/// The snippet lexer.
pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    /// Current byte offset into `source`.
    pos: usize,
    line: u32,
    col: u32,
    /// A line terminator was skipped since the last token.
    saw_newline: bool,
    errors: SyntaxErrors,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    pub errors: SyntaxErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            pos: 0,
            line: 1,
            col: 1,
            saw_newline: false,
            errors: SyntaxErrors::empty(),
        }
    }

    /// Lex the entire source into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            if self.errors.is_full() {
                break;
            }
            let token = self.scan_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span(), true));
        }
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // UTF-8 continuation bytes do not start a new column
            self.col += 1;
        }
        Some(ch)
    }

    fn eat_byte(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn current_span(&self) -> Span {
        Span::new(self.current_pos(), self.current_pos())
    }

    fn span_from(&self, start: Pos) -> Span {
        let end_col = self.col.saturating_sub(1).max(1);
        Span::new(start, Pos::new(self.line, end_col))
    }

    fn emit_error(&mut self, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line_of(span).to_string();
        self.errors.push(SyntaxError::new(
            &self.source_file.name,
            message,
            span,
            source_line,
        ));
    }

    fn token(&mut self, kind: TokenKind, start: Pos) -> Token {
        let newline_before = std::mem::take(&mut self.saw_newline);
        Token::new(kind, self.span_from(start), newline_before)
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip whitespace and comments, noting any line terminators crossed.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b'\n') => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some(b' ' | b'\t' | b'\r') => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let start = self.current_pos();
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                None => {
                    let span = self.span_from(start);
                    self.emit_error("Unterminated comment", span);
                    return;
                }
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.advance();
                    self.advance();
                    return;
                }
                Some(b'\n') => {
                    // A multi-line comment counts as a line terminator for ASI
                    self.saw_newline = true;
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Token {
        loop {
            self.skip_trivia();
            let start = self.current_pos();
            let Some(ch) = self.advance() else {
                return Token::new(TokenKind::Eof, self.current_span(), true);
            };

            let kind = match ch {
                b'"' | b'\'' => self.scan_string(ch, start),
                b'0'..=b'9' => self.scan_number(start),
                b'.' if matches!(self.peek(), Some(b'0'..=b'9')) => self.scan_number(start),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => self.scan_identifier(),

                b'+' => {
                    if self.eat_byte(b'+') {
                        TokenKind::PlusPlus
                    } else if self.eat_byte(b'=') {
                        TokenKind::PlusEq
                    } else {
                        TokenKind::Plus
                    }
                }
                b'-' => {
                    if self.eat_byte(b'-') {
                        TokenKind::MinusMinus
                    } else if self.eat_byte(b'=') {
                        TokenKind::MinusEq
                    } else {
                        TokenKind::Minus
                    }
                }
                b'*' => {
                    if self.eat_byte(b'=') {
                        TokenKind::StarEq
                    } else {
                        TokenKind::Star
                    }
                }
                // Comments were consumed by skip_trivia, so this is division
                b'/' => {
                    if self.eat_byte(b'=') {
                        TokenKind::SlashEq
                    } else {
                        TokenKind::Slash
                    }
                }
                b'%' => TokenKind::Percent,
                b'=' => {
                    if self.eat_byte(b'>') {
                        TokenKind::Arrow
                    } else if self.eat_byte(b'=') {
                        if self.eat_byte(b'=') {
                            TokenKind::EqEqEq
                        } else {
                            TokenKind::EqEq
                        }
                    } else {
                        TokenKind::Eq
                    }
                }
                b'!' => {
                    if self.eat_byte(b'=') {
                        if self.eat_byte(b'=') {
                            TokenKind::BangEqEq
                        } else {
                            TokenKind::BangEq
                        }
                    } else {
                        TokenKind::Bang
                    }
                }
                b'<' => {
                    if self.eat_byte(b'=') {
                        TokenKind::LessEq
                    } else {
                        TokenKind::Less
                    }
                }
                b'>' => {
                    if self.eat_byte(b'=') {
                        TokenKind::GreaterEq
                    } else {
                        TokenKind::Greater
                    }
                }
                b'&' if self.eat_byte(b'&') => TokenKind::AmpAmp,
                b'|' if self.eat_byte(b'|') => TokenKind::PipePipe,
                b'?' => TokenKind::Question,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b'{' => TokenKind::LBrace,
                b'}' => TokenKind::RBrace,
                b'[' => TokenKind::LBracket,
                b']' => TokenKind::RBracket,
                b',' => TokenKind::Comma,
                b';' => TokenKind::Semicolon,
                b':' => TokenKind::Colon,
                b'.' => TokenKind::Dot,

                _ => {
                    let span = self.span_from(start);
                    let shown = self.char_at(ch);
                    self.emit_error(format!("Invalid or unexpected token '{shown}'"), span);
                    // Skip the rest of a multi-byte character, then rescan
                    while matches!(self.peek(), Some(b) if b & 0xC0 == 0x80) {
                        self.advance();
                    }
                    if self.errors.is_full() {
                        return Token::new(TokenKind::Eof, self.current_span(), true);
                    }
                    continue;
                }
            };
            return self.token(kind, start);
        }
    }

    /// The (possibly multi-byte) character whose first byte was just consumed.
    fn char_at(&self, first: u8) -> String {
        let begin = self.pos - 1;
        let mut end = self.pos;
        while matches!(self.source.get(end), Some(b) if b & 0xC0 == 0x80) {
            end += 1;
        }
        String::from_utf8(self.source[begin..end].to_vec())
            .unwrap_or_else(|_| (first as char).to_string())
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, start: Pos) -> TokenKind {
        let begin = self.pos - 1;
        while let Some(b'0'..=b'9') = self.peek() {
            self.advance();
        }
        if self.source[begin] != b'.'
            && self.peek() == Some(b'.')
            && matches!(self.peek_at(1), Some(b'0'..=b'9'))
        {
            self.advance();
            while let Some(b'0'..=b'9') = self.peek() {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let digit_offset = if matches!(self.peek_at(1), Some(b'+' | b'-')) { 2 } else { 1 };
            if matches!(self.peek_at(digit_offset), Some(b'0'..=b'9')) {
                for _ in 0..digit_offset {
                    self.advance();
                }
                while let Some(b'0'..=b'9') = self.peek() {
                    self.advance();
                }
            }
        }
        if matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$')) {
            let span = self.span_from(start);
            self.emit_error("Invalid or unexpected token", span);
        }

        let text = std::str::from_utf8(&self.source[begin..self.pos]).unwrap_or("0");
        TokenKind::Number(text.parse().unwrap_or(f64::NAN))
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self) -> TokenKind {
        let begin = self.pos - 1;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$' {
                self.advance();
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.source[begin..self.pos]).unwrap_or("");
        TokenKind::from_keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()))
    }

    // ─────────────────────────────────────────────────────────────
    // String literals
    // ─────────────────────────────────────────────────────────────

    /// Scan a string literal after its opening quote.
    fn scan_string(&mut self, quote: u8, start: Pos) -> TokenKind {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(start);
                    self.emit_error("Invalid or unexpected token: unterminated string", span);
                    break;
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    let escape_start = self.current_pos();
                    match self.advance() {
                        Some(b'n') => buf.push(b'\n'),
                        Some(b't') => buf.push(b'\t'),
                        Some(b'r') => buf.push(b'\r'),
                        Some(b'0') => buf.push(0),
                        // Line continuation
                        Some(b'\n') => {}
                        Some(other) => buf.push(other),
                        None => {
                            let span = Span::new(escape_start, escape_start);
                            self.emit_error("Invalid or unexpected token: unterminated string", span);
                            break;
                        }
                    }
                }
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }
        TokenKind::String(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> LexResult {
        let sf = SourceFile::new("t.js", src);
        Lexer::new(&sf).lex()
    }

    #[test]
    fn test_spans_are_one_based_and_inclusive() {
        let result = lex("let  productId");
        let ident = &result.tokens[1];
        assert_eq!(ident.span.start, Pos::new(1, 6));
        assert_eq!(ident.span.end, Pos::new(1, 14));
    }

    #[test]
    fn test_newline_before_flags() {
        let result = lex("a\nb c");
        let flags: Vec<bool> = result.tokens.iter().map(|t| t.newline_before).collect();
        assert_eq!(flags, vec![false, true, false, true]);
    }

    #[test]
    fn test_multiline_block_comment_counts_as_newline() {
        let result = lex("a /* one\ntwo */ b");
        assert!(result.tokens[1].newline_before);
        let result = lex("a /* same line */ b");
        assert!(!result.tokens[1].newline_before);
    }

    #[test]
    fn test_error_cap_stops_lexing() {
        let src = "#".repeat(40);
        let result = lex(&src);
        assert_eq!(result.errors.total, snip_types::MAX_ERRORS);
        assert_eq!(result.tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    }
}
