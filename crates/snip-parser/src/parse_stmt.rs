//! Statement parsing.

use crate::parser::Parser;
use snip_lexer::token::TokenKind;
use snip_types::ast::*;

impl<'src> Parser<'src> {
    /// Parse a block of statements: `{ stmts... }`
    pub(crate) fn parse_block(&mut self) -> Option<Block> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        self.push_lexical_scope();
        let stmts = self.parse_statement_list(&TokenKind::RBrace);
        self.pop_lexical_scope();
        self.expect(&TokenKind::RBrace)?;
        let span = start.to(self.previous_span());
        Some(Block { stmts, span })
    }

    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_block().map(Stmt::Block),
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon().then_some(Stmt::Var(decl))
            }
            TokenKind::Function => self.parse_function_declaration().map(Stmt::Function),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Break | TokenKind::Continue => self.parse_jump_stmt(),
            TokenKind::Semicolon => {
                let span = self.advance().span;
                Some(Stmt::Empty(span))
            }
            _ => {
                let expr = self.parse_expression()?;
                let span = expr.span;
                self.consume_semicolon()
                    .then_some(Stmt::Expr(ExprStmt { expr, span }))
            }
        }
    }

    /// `var a = 1, b` / `let ...` / `const ...` without the terminator.
    pub(crate) fn parse_var_decl(&mut self) -> Option<VarDecl> {
        let start = self.current_span();
        let kind = match self.advance().kind {
            TokenKind::Var => DeclKind::Var,
            TokenKind::Let => DeclKind::Let,
            _ => DeclKind::Const,
        };
        let mut declarators = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            if kind.is_lexical() {
                self.declare_lexical(&name);
            } else {
                self.declare_var(&name);
            }
            let init = if self.eat(&TokenKind::Eq) {
                let mut value = self.parse_assignment()?;
                infer_function_name(&mut value, &name.name);
                Some(value)
            } else {
                if kind == DeclKind::Const {
                    self.error_at(
                        "Missing initializer in const declaration",
                        name.span,
                    );
                }
                None
            };
            declarators.push(Declarator { name, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let span = start.to(self.previous_span());
        Some(VarDecl {
            kind,
            declarators,
            span,
        })
    }

    /// `if (cond) stmt [else stmt]`
    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // eat `if`
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let then_branch = Box::new(self.parse_substatement()?);
        let else_branch = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_substatement()?))
        } else {
            None
        };
        let span = start.to(self.previous_span());
        Some(Stmt::If(IfStmt {
            condition,
            then_branch,
            else_branch,
            span,
        }))
    }

    /// `for (init; test; update) body`
    ///
    /// A lexical declaration in `init` is scoped to the loop.
    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // eat `for`
        self.expect(&TokenKind::LParen)?;
        self.push_lexical_scope();
        let parsed = self.parse_for_rest(start);
        self.pop_lexical_scope();
        parsed
    }

    fn parse_for_rest(&mut self, start: snip_types::Span) -> Option<Stmt> {
        let init = match self.peek_kind() {
            TokenKind::Semicolon => None,
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                Some(ForInit::Decl(self.parse_var_decl()?))
            }
            _ => Some(ForInit::Expr(self.parse_expression()?)),
        };
        self.expect(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        let span = start.to(self.previous_span());
        Some(Stmt::For(ForStmt {
            init,
            test,
            update,
            body,
            span,
        }))
    }

    /// `while (cond) body`
    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // eat `while`
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        let span = start.to(self.previous_span());
        Some(Stmt::While(WhileStmt {
            condition,
            body,
            span,
        }))
    }

    fn parse_loop_body(&mut self) -> Option<Stmt> {
        self.loop_depth += 1;
        let body = self.parse_substatement();
        self.loop_depth -= 1;
        body
    }

    /// The body of `if`/`for`/`while`. Lexical declarations need a block.
    fn parse_substatement(&mut self) -> Option<Stmt> {
        if matches!(self.peek_kind(), TokenKind::Let | TokenKind::Const) {
            self.error_at_current(
                "Lexical declaration cannot appear in a single-statement context",
            );
            return None;
        }
        self.parse_statement()
    }

    /// `return [expr]`. A line break right after `return` ends the statement.
    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // eat `return`
        if self.function_depth == 0 {
            self.error_at(
                "Illegal return statement",
                start,
            );
        }
        let value = if self.newline_before()
            || self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.at_end()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let span = start.to(self.previous_span());
        self.consume_semicolon()
            .then_some(Stmt::Return(ReturnStmt { value, span }))
    }

    /// `break` / `continue`, which must sit inside a loop.
    fn parse_jump_stmt(&mut self) -> Option<Stmt> {
        let token = self.advance();
        if self.loop_depth == 0 {
            let message = match token.kind {
                TokenKind::Break => "Illegal break statement",
                _ => "Illegal continue statement: no surrounding iteration statement",
            };
            self.error_at(message, token.span);
        }
        if !self.consume_semicolon() {
            return None;
        }
        Some(match token.kind {
            TokenKind::Break => Stmt::Break(token.span),
            _ => Stmt::Continue(token.span),
        })
    }
}

/// Give an anonymous function the name of the binding or property it is
/// assigned to, so `var f = function () {}` displays as `[Function: f]`.
pub(crate) fn infer_function_name(expr: &mut Expr, name: &str) {
    if let ExprKind::Function(def) = &mut expr.kind {
        if def.name.is_none() {
            std::rc::Rc::make_mut(def).name = Some(name.to_string());
        }
    }
}
