//! Core parser infrastructure: token cursor, error reporting, helpers.

use std::collections::HashSet;

use snip_lexer::token::{Token, TokenKind};
use snip_types::ast::{Ident, Param, Program, Stmt};
use snip_types::{SourceFile, Span, SyntaxError, SyntaxErrors};

/// Maximum nesting of expressions before the parser gives up.
pub(crate) const MAX_EXPR_DEPTH: u32 = 64;

/// The snippet parser.
///
/// Consumes a token stream produced by the lexer and builds an AST,
/// collecting errors and resynchronising at statement boundaries.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source_file: &'src SourceFile,
    errors: SyntaxErrors,
    /// Whether the code being parsed is strict mode code.
    pub(crate) strict: bool,
    /// Number of enclosing function bodies (for `return`).
    pub(crate) function_depth: u32,
    /// Number of enclosing loops in the current function (for `break`).
    pub(crate) loop_depth: u32,
    pub(crate) expr_depth: u32,
    /// Declared names per open block, innermost last. The first entry is
    /// the program scope.
    decl_scopes: Vec<DeclScope>,
}

/// Names declared in one block or function body, for early
/// redeclaration errors.
#[derive(Debug, Default)]
struct DeclScope {
    /// `let`/`const`, and function declarations nested in a block.
    lexical: HashSet<String>,
    /// Block-level function declarations, which sloppy code may repeat.
    block_functions: HashSet<String>,
    /// `var` names declared in this block or any block nested in it, plus
    /// parameters and top-level function declarations of a function body.
    vars: HashSet<String>,
    /// Function bodies and the program stop `var` names bubbling outwards.
    is_function: bool,
}

/// Result of parsing.
pub struct ParseResult {
    /// `None` when any syntax error was reported.
    pub program: Option<Program>,
    pub errors: SyntaxErrors,
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            source_file,
            errors: SyntaxErrors::empty(),
            strict: false,
            function_depth: 0,
            loop_depth: 0,
            expr_depth: 0,
            decl_scopes: vec![DeclScope {
                is_function: true,
                ..DeclScope::default()
            }],
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        match self.pos.checked_sub(1) {
            Some(i) => self.tokens[i].span,
            None => Span::point(1, 1),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// Whether a line break precedes the current token.
    pub(crate) fn newline_before(&self) -> bool {
        self.peek().newline_before
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            self.unexpected();
            None
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            _ => {
                self.unexpected();
                None
            }
        }
    }

    /// A property name after `.` or in an object literal: identifiers and
    /// reserved words are both allowed (`obj.new`, `{ if: 1 }`).
    pub(crate) fn expect_property_name(&mut self) -> Option<Ident> {
        let kind = self.peek_kind().clone();
        match kind {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            ref k if k.is_keyword() => {
                let span = self.advance().span;
                Some(Ident::new(k.to_string(), span))
            }
            _ => {
                self.unexpected();
                None
            }
        }
    }

    /// End a statement: `;`, or automatic insertion before a line break,
    /// `}` or end of input.
    pub(crate) fn consume_semicolon(&mut self) -> bool {
        if self.eat(&TokenKind::Semicolon) {
            return true;
        }
        if self.newline_before() || self.check(&TokenKind::RBrace) || self.at_end() {
            return true;
        }
        self.unexpected();
        false
    }

    // ── Declarations ──────────────────────────────────────────────────────────

    pub(crate) fn push_lexical_scope(&mut self) {
        self.decl_scopes.push(DeclScope::default());
    }

    /// Open a function body scope. Parameters count as `var` names, so a
    /// `let` of the same name in the body is a redeclaration.
    pub(crate) fn push_function_scope(&mut self, params: &[Param]) {
        self.decl_scopes.push(DeclScope {
            vars: params.iter().map(|p| p.name.name.clone()).collect(),
            is_function: true,
            ..DeclScope::default()
        });
    }

    pub(crate) fn pop_lexical_scope(&mut self) {
        if self.decl_scopes.len() > 1 {
            self.decl_scopes.pop();
        }
    }

    /// Record a `let`/`const` name in the innermost block.
    pub(crate) fn declare_lexical(&mut self, ident: &Ident) {
        let clash = self.decl_scopes.last_mut().is_some_and(|scope| {
            scope.vars.contains(&ident.name) || !scope.lexical.insert(ident.name.clone())
        });
        if clash {
            self.redeclared(ident);
        }
    }

    /// Record a `var` name in every block up to the enclosing function,
    /// reporting any `let`/`const` of the same name along the way.
    pub(crate) fn declare_var(&mut self, ident: &Ident) {
        let mut clash = false;
        for scope in self.decl_scopes.iter_mut().rev() {
            clash |= scope.lexical.contains(&ident.name);
            scope.vars.insert(ident.name.clone());
            if scope.is_function {
                break;
            }
        }
        if clash {
            self.redeclared(ident);
        }
    }

    /// Record a function declaration's name. In a function body or at the
    /// top level it behaves like `var`; inside a block it is lexical.
    pub(crate) fn declare_function(&mut self, ident: &Ident) {
        let strict = self.strict;
        let Some(scope) = self.decl_scopes.last_mut() else {
            return;
        };
        let clash = if scope.is_function {
            let clash = scope.lexical.contains(&ident.name);
            scope.vars.insert(ident.name.clone());
            clash
        } else if scope.block_functions.contains(&ident.name) {
            strict
        } else {
            let clash =
                scope.vars.contains(&ident.name) || !scope.lexical.insert(ident.name.clone());
            scope.block_functions.insert(ident.name.clone());
            clash
        };
        if clash {
            self.redeclared(ident);
        }
    }

    fn redeclared(&mut self, ident: &Ident) {
        self.error_at(
            format!("Identifier '{}' has already been declared", ident.name),
            ident.span,
        );
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    /// Report the current token as unexpected, in V8's wording.
    pub(crate) fn unexpected(&mut self) {
        let message = match self.peek_kind() {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Number(_) => "Unexpected number".to_string(),
            TokenKind::String(_) => "Unexpected string".to_string(),
            TokenKind::Identifier(name) => format!("Unexpected identifier '{name}'"),
            other => format!("Unexpected token '{other}'"),
        };
        self.error_at_current(message);
    }

    pub(crate) fn error_at_current(&mut self, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(message, span);
    }

    pub(crate) fn error_at(&mut self, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line_of(span).to_string();
        self.errors.push(SyntaxError::new(
            &self.source_file.name,
            message,
            span,
            source_line,
        ));
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_full()
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip to the start of the next statement after an error.
    pub(crate) fn synchronize(&mut self) {
        let start = self.pos;
        while !self.at_end() {
            if self.eat(&TokenKind::Semicolon) {
                return;
            }
            if self.pos > start && (self.newline_before() || self.check(&TokenKind::RBrace)) {
                return;
            }
            match self.peek_kind() {
                TokenKind::Var
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::Function
                | TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Return
                    if self.pos > start =>
                {
                    return
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Parse the token stream into a [`Program`].
    pub fn parse(mut self) -> ParseResult {
        let start = self.current_span();
        self.strict = self.has_use_strict_directive();
        let body = self.parse_statement_list(&TokenKind::Eof);
        let span = start.to(self.previous_span());
        let program = Program {
            body,
            strict: self.strict,
            span,
        };
        ParseResult {
            program: (!self.errors.has_errors()).then_some(program),
            errors: self.errors,
        }
    }

    /// Parse statements until `terminator` (not consumed) or end of input.
    pub(crate) fn parse_statement_list(&mut self, terminator: &TokenKind) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.check(terminator) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            let before = self.pos;
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => {
                    self.synchronize();
                    if self.pos == before {
                        self.advance();
                    }
                }
            }
        }
        stmts
    }

    /// A directive prologue opening with exactly `'use strict'`.
    ///
    /// Only string-literal expression statements form the prologue; any
    /// other directive before it is skipped over when looking.
    pub(crate) fn has_use_strict_directive(&self) -> bool {
        let mut i = self.pos;
        while let Some(TokenKind::String(text)) = self.tokens.get(i).map(|t| &t.kind) {
            let next = self.tokens.get(i + 1);
            let terminated = next.map_or(true, |t| {
                matches!(
                    t.kind,
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                ) || t.newline_before
            });
            if !terminated {
                return false;
            }
            if text == "use strict" {
                return true;
            }
            i += 1;
            if matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Semicolon)) {
                i += 1;
            }
        }
        false
    }
}
