//! Lexer tests for the snippet subset.
//!
//! Covers: keywords, operators (longest match), number and string
//! literals, comments, newline tracking for semicolon insertion, error
//! recovery, and the 100-iteration determinism test.

use snip_lexer::{Lexer, TokenKind};
use snip_types::SourceFile;

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

/// Lex source text and return just the token kinds (excluding final Eof).
fn kinds(source: &str) -> Vec<TokenKind> {
    let sf = SourceFile::new("test.js", source);
    Lexer::new(&sf)
        .lex()
        .tokens
        .into_iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.kind)
        .collect()
}

fn error_count(source: &str) -> usize {
    let sf = SourceFile::new("test.js", source);
    Lexer::new(&sf).lex().errors.total
}

fn first_error(source: &str) -> String {
    let sf = SourceFile::new("test.js", source);
    Lexer::new(&sf)
        .lex()
        .errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_default()
}

fn ident(name: &str) -> TokenKind {
    TokenKind::Identifier(name.to_string())
}

// ─────────────────────────────────────────────────────────────────────
// Keywords & identifiers
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_declaration_keywords() {
    assert_eq!(
        kinds("var let const function"),
        vec![
            TokenKind::Var,
            TokenKind::Let,
            TokenKind::Const,
            TokenKind::Function
        ]
    );
}

#[test]
fn test_identifiers_allow_dollar_and_underscore() {
    assert_eq!(
        kinds("$el _private MARKUP_CONST productId2"),
        vec![
            ident("$el"),
            ident("_private"),
            ident("MARKUP_CONST"),
            ident("productId2")
        ]
    );
}

#[test]
fn test_undefined_and_arguments_are_identifiers() {
    assert_eq!(
        kinds("undefined arguments"),
        vec![ident("undefined"), ident("arguments")]
    );
}

// ─────────────────────────────────────────────────────────────────────
// Operators & punctuation
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_equality_longest_match() {
    assert_eq!(
        kinds("= == === != !== =>"),
        vec![
            TokenKind::Eq,
            TokenKind::EqEq,
            TokenKind::EqEqEq,
            TokenKind::BangEq,
            TokenKind::BangEqEq,
            TokenKind::Arrow
        ]
    );
}

#[test]
fn test_update_and_compound_assignment() {
    assert_eq!(
        kinds("i++ j-- k += 1"),
        vec![
            ident("i"),
            TokenKind::PlusPlus,
            ident("j"),
            TokenKind::MinusMinus,
            ident("k"),
            TokenKind::PlusEq,
            TokenKind::Number(1.0)
        ]
    );
}

#[test]
fn test_arrow_function_tokens() {
    assert_eq!(
        kinds("(count, tax) => count * 5.99 * (1 + tax)"),
        vec![
            TokenKind::LParen,
            ident("count"),
            TokenKind::Comma,
            ident("tax"),
            TokenKind::RParen,
            TokenKind::Arrow,
            ident("count"),
            TokenKind::Star,
            TokenKind::Number(5.99),
            TokenKind::Star,
            TokenKind::LParen,
            TokenKind::Number(1.0),
            TokenKind::Plus,
            ident("tax"),
            TokenKind::RParen
        ]
    );
}

#[test]
fn test_logical_operators() {
    assert_eq!(
        kinds("a && !b || c"),
        vec![
            ident("a"),
            TokenKind::AmpAmp,
            TokenKind::Bang,
            ident("b"),
            TokenKind::PipePipe,
            ident("c")
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────
// Literals
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_number_literals() {
    assert_eq!(
        kinds("12 5.00 0.072 .5 1e3 2.5E-1"),
        vec![
            TokenKind::Number(12.0),
            TokenKind::Number(5.0),
            TokenKind::Number(0.072),
            TokenKind::Number(0.5),
            TokenKind::Number(1000.0),
            TokenKind::Number(0.25)
        ]
    );
}

#[test]
fn test_member_access_after_number_is_dot() {
    assert_eq!(
        kinds("a.b"),
        vec![ident("a"), TokenKind::Dot, ident("b")]
    );
}

#[test]
fn test_single_and_double_quoted_strings() {
    assert_eq!(
        kinds(r#"'use strict' "software""#),
        vec![
            TokenKind::String("use strict".into()),
            TokenKind::String("software".into())
        ]
    );
}

#[test]
fn test_string_escapes() {
    assert_eq!(
        kinds(r#"'it\'s' "a\"b" 'x\ny\t'"#),
        vec![
            TokenKind::String("it's".into()),
            TokenKind::String("a\"b".into()),
            TokenKind::String("x\ny\t".into())
        ]
    );
}

#[test]
fn test_other_quote_inside_string() {
    assert_eq!(
        kinds(r#""it's" 'say "hi"'"#),
        vec![
            TokenKind::String("it's".into()),
            TokenKind::String("say \"hi\"".into())
        ]
    );
}

#[test]
fn test_non_ascii_string_content() {
    assert_eq!(kinds("'café'"), vec![TokenKind::String("café".into())]);
}

// ─────────────────────────────────────────────────────────────────────
// Comments & newlines
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_line_and_block_comments_skipped() {
    let src = "/*\n  header\n*/\nlet a = 1; // trailing\n// whole line\na";
    assert_eq!(
        kinds(src),
        vec![
            TokenKind::Let,
            ident("a"),
            TokenKind::Eq,
            TokenKind::Number(1.0),
            TokenKind::Semicolon,
            ident("a")
        ]
    );
}

#[test]
fn test_newline_before_tracks_line_breaks() {
    let sf = SourceFile::new("test.js", "getTotal(5.00)\nconsole.log(x)");
    let tokens = Lexer::new(&sf).lex().tokens;
    let console = tokens
        .iter()
        .find(|t| t.kind == ident("console"))
        .expect("console token");
    assert!(console.newline_before);
    assert!(!tokens[0].newline_before);
    assert!(!tokens[1].newline_before);
}

#[test]
fn test_comment_only_line_still_counts_as_break() {
    let sf = SourceFile::new("test.js", "a // note\nb");
    let tokens = Lexer::new(&sf).lex().tokens;
    assert!(tokens[1].newline_before);
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_unterminated_string() {
    assert_eq!(error_count("'abc"), 1);
    assert!(first_error("'abc").contains("unterminated string"));
}

#[test]
fn test_string_cannot_span_lines() {
    assert_eq!(error_count("'abc\ndef'"), 2);
}

#[test]
fn test_unterminated_block_comment() {
    assert_eq!(first_error("/* never closed"), "Unterminated comment");
}

#[test]
fn test_unexpected_character_recovers() {
    assert_eq!(
        kinds("a # b"),
        vec![ident("a"), ident("b")]
    );
    assert_eq!(first_error("a # b"), "Invalid or unexpected token '#'");
}

#[test]
fn test_single_ampersand_rejected() {
    assert_eq!(error_count("a & b"), 1);
}

#[test]
fn test_spans_on_second_line() {
    let sf = SourceFile::new("test.js", "let a;\n  a = 2;");
    let tokens = Lexer::new(&sf).lex().tokens;
    let second_a = &tokens[3];
    assert_eq!(second_a.kind, ident("a"));
    assert_eq!(second_a.span.start.line, 2);
    assert_eq!(second_a.span.start.col, 3);
}

// ─────────────────────────────────────────────────────────────────────
// 100-iteration determinism test
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_lexer_determinism_100_iterations() {
    let source = r#"
'use strict';
var invoice = {
  number: 123,
  process: function() {
    return () => console.log(this);
  }
};
let updateFunctions = [];
for (let i = 0; i < 3; i++) {
  updateFunctions.push(function() { return i });
}
invoice.process().bind({ number: 456 })();
"#;

    let baseline = kinds(source);
    for i in 1..100 {
        assert_eq!(
            baseline,
            kinds(source),
            "Determinism failed on iteration {i}: token streams differ"
        );
    }
}
