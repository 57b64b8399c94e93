//! Function declarations, function expressions, methods and arrows.

use std::rc::Rc;

use crate::parser::Parser;
use snip_lexer::token::TokenKind;
use snip_types::ast::*;
use snip_types::Span;

impl<'src> Parser<'src> {
    /// `function name(params) { body }` in statement position.
    pub(crate) fn parse_function_declaration(&mut self) -> Option<Rc<FunctionDef>> {
        let start = self.advance().span; // eat `function`
        let name = self.expect_identifier()?;
        self.declare_function(&name);
        self.parse_function_rest(Some(name.name), start)
    }

    /// `function [name](params) { body }` in expression position.
    pub(crate) fn parse_function_expression(&mut self) -> Option<Rc<FunctionDef>> {
        let start = self.advance().span; // eat `function`
        let name = match self.peek_kind() {
            TokenKind::Identifier(_) => Some(self.expect_identifier()?.name),
            _ => None,
        };
        self.parse_function_rest(name, start)
    }

    /// Shorthand method in an object literal: `process() { ... }`.
    pub(crate) fn parse_method(&mut self, key: &str, start: Span) -> Option<Rc<FunctionDef>> {
        self.parse_function_rest(Some(key.to_string()), start)
    }

    fn parse_function_rest(&mut self, name: Option<String>, start: Span) -> Option<Rc<FunctionDef>> {
        let params = self.parse_params()?;
        let (block, strict) = self.parse_function_body(&params)?;
        let span = start.to(self.previous_span());
        Some(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(block),
            is_arrow: false,
            strict,
            span,
        }))
    }

    /// `(a, b = a * 2, c)`
    fn parse_params(&mut self) -> Option<Vec<Param>> {
        self.expect(&TokenKind::LParen)?;
        let mut params: Vec<Param> = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let name = self.expect_identifier()?;
            let default = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param { name, default });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(params)
    }

    /// `{ body }` of a function, with its own directive prologue.
    ///
    /// Returns the block and whether the function is strict.
    fn parse_function_body(&mut self, params: &[Param]) -> Option<(Block, bool)> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;

        let outer_strict = self.strict;
        let outer_loops = self.loop_depth;
        let directive = self.has_use_strict_directive();
        if directive && params.iter().any(|p| p.default.is_some()) {
            self.error_at(
                "Illegal 'use strict' directive in function with non-simple parameter list",
                start,
            );
        }
        self.strict = outer_strict || directive;
        let strict = self.strict;
        self.loop_depth = 0;
        self.function_depth += 1;
        self.push_function_scope(params);

        let stmts = self.parse_statement_list(&TokenKind::RBrace);

        self.pop_lexical_scope();
        self.function_depth -= 1;
        self.loop_depth = outer_loops;
        self.strict = outer_strict;

        self.expect(&TokenKind::RBrace)?;
        let span = start.to(self.previous_span());
        Some((Block { stmts, span }, strict))
    }

    // ── Arrow Functions ───────────────────────────────────────────────────────

    /// Whether the upcoming tokens start an arrow function: `x =>` or a
    /// parenthesised list whose closing `)` is followed by `=>`.
    pub(crate) fn at_arrow_function(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Identifier(_) => matches!(self.look_ahead(1), TokenKind::Arrow),
            TokenKind::LParen => {
                let mut depth = 0usize;
                let mut i = 0;
                loop {
                    match self.look_ahead(i) {
                        TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                        TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                return matches!(self.look_ahead(i + 1), TokenKind::Arrow);
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                    i += 1;
                }
            }
            _ => false,
        }
    }

    /// `x => expr`, `(a, b) => expr` or `(a, b) => { body }`.
    pub(crate) fn parse_arrow_function(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let params = if self.check(&TokenKind::LParen) {
            self.parse_params()?
        } else {
            let name = self.expect_identifier()?;
            vec![Param {
                name,
                default: None,
            }]
        };
        if self.newline_before() {
            self.unexpected();
            return None;
        }
        self.expect(&TokenKind::Arrow)?;

        let (body, strict) = if self.check(&TokenKind::LBrace) {
            let (block, strict) = self.parse_function_body(&params)?;
            (FunctionBody::Block(block), strict)
        } else {
            let expr = self.parse_assignment()?;
            (FunctionBody::Expr(Box::new(expr)), self.strict)
        };
        let span = start.to(self.previous_span());
        let def = Rc::new(FunctionDef {
            name: None,
            params,
            body,
            is_arrow: true,
            strict,
            span,
        });
        Some(Expr::new(ExprKind::Function(def), span))
    }
}
