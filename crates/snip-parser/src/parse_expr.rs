//! Expression parsing with precedence climbing.
//!
//! Precedence (lowest to highest):
//! 1. Assignment `= += -= *= /=` (right-assoc), arrow functions
//! 2. Conditional `? :`
//! 3. `||`
//! 4. `&&`
//! 5. Equality `== != === !==`
//! 6. Relational `< > <= >=`
//! 7. Additive `+ -`
//! 8. Multiplicative `* / %`
//! 9. Prefix `! - + typeof ++ --`
//! 10. Postfix `++ --` (no line break before the operator)
//! 11. Call, member access, `new`
//! 12. Primary

use crate::parse_stmt::infer_function_name;
use crate::parser::{Parser, MAX_EXPR_DEPTH};
use snip_lexer::token::TokenKind;
use snip_types::ast::*;
use std::rc::Rc;

impl<'src> Parser<'src> {
    /// Parse an expression.
    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_assignment()
    }

    /// Assignment, arrow functions and everything below them.
    pub(crate) fn parse_assignment(&mut self) -> Option<Expr> {
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPR_DEPTH {
            self.error_at_current("Expression nesting too deep");
            self.expr_depth -= 1;
            return None;
        }
        let result = self.parse_assignment_inner();
        self.expr_depth -= 1;
        result
    }

    fn parse_assignment_inner(&mut self) -> Option<Expr> {
        if self.at_arrow_function() {
            return self.parse_arrow_function();
        }

        let target = self.parse_conditional()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::AddAssign,
            TokenKind::MinusEq => AssignOp::SubAssign,
            TokenKind::StarEq => AssignOp::MulAssign,
            TokenKind::SlashEq => AssignOp::DivAssign,
            _ => return Some(target),
        };
        if !target.kind.is_assignment_target() {
            self.error_at("Invalid left-hand side in assignment", target.span);
            return None;
        }
        self.advance(); // eat operator
        let mut value = self.parse_assignment()?;
        if let (AssignOp::Assign, ExprKind::Identifier(name)) = (op, &target.kind) {
            infer_function_name(&mut value, name);
        }
        let span = target.span.to(value.span);
        Some(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    /// `test ? consequent : alternate`
    fn parse_conditional(&mut self) -> Option<Expr> {
        let test = self.parse_or()?;
        if !self.eat(&TokenKind::Question) {
            return Some(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        let span = test.span.to(alternate.span);
        Some(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.parse_and()?;
            left = logical(left, LogicalOp::Or, right);
        }
        Some(left)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::AmpAmp) {
            let right = self.parse_equality()?;
            left = logical(left, LogicalOp::And, right);
        }
        Some(left)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::LooseEq,
                TokenKind::BangEq => BinOp::LooseNotEq,
                TokenKind::EqEqEq => BinOp::StrictEq,
                TokenKind::BangEqEq => BinOp::StrictNotEq,
                _ => return Some(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(left, op, right);
        }
    }

    fn parse_relational(&mut self) -> Option<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinOp::Less,
                TokenKind::Greater => BinOp::Greater,
                TokenKind::LessEq => BinOp::LessEq,
                TokenKind::GreaterEq => BinOp::GreaterEq,
                _ => return Some(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Some(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => return Some(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
    }

    /// Prefix operators.
    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let op = match self.peek_kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = match self.advance().kind {
                    TokenKind::PlusPlus => UpdateOp::Increment,
                    _ => UpdateOp::Decrement,
                };
                let target = self.parse_unary()?;
                if !target.kind.is_assignment_target() {
                    self.error_at(
                        "Invalid left-hand side expression in prefix operation",
                        target.span,
                    );
                    return None;
                }
                let span = start.to(target.span);
                return Some(Expr::new(
                    ExprKind::Update {
                        op,
                        prefix: true,
                        target: Box::new(target),
                    },
                    span,
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        let span = start.to(operand.span);
        Some(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `i++` / `i--`. A line break before the operator ends the expression.
    fn parse_postfix(&mut self) -> Option<Expr> {
        let target = self.parse_call_member()?;
        let op = match self.peek_kind() {
            TokenKind::PlusPlus if !self.newline_before() => UpdateOp::Increment,
            TokenKind::MinusMinus if !self.newline_before() => UpdateOp::Decrement,
            _ => return Some(target),
        };
        if !target.kind.is_assignment_target() {
            self.error_at(
                "Invalid left-hand side expression in postfix operation",
                target.span,
            );
            return None;
        }
        let end = self.advance().span;
        let span = target.span.to(end);
        Some(Expr::new(
            ExprKind::Update {
                op,
                prefix: false,
                target: Box::new(target),
            },
            span,
        ))
    }

    /// Calls and member access chained onto a primary or `new` expression.
    fn parse_call_member(&mut self) -> Option<Expr> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            match self.peek_kind() {
                TokenKind::Dot | TokenKind::LBracket => {
                    expr = self.parse_member_suffix(expr)?;
                }
                TokenKind::LParen => {
                    let args = self.parse_arguments()?;
                    let span = expr.span.to(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => return Some(expr),
            }
        }
    }

    /// `new Callee(args)`. The argument list is optional.
    fn parse_new(&mut self) -> Option<Expr> {
        let start = self.advance().span; // eat `new`
        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        while matches!(self.peek_kind(), TokenKind::Dot | TokenKind::LBracket) {
            callee = self.parse_member_suffix(callee)?;
        }
        let args = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let span = start.to(self.previous_span());
        Some(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            span,
        ))
    }

    /// `.name` or `[expr]` applied to `object`.
    fn parse_member_suffix(&mut self, object: Expr) -> Option<Expr> {
        let property = if self.eat(&TokenKind::Dot) {
            MemberProp::Named(self.expect_property_name()?)
        } else {
            self.expect(&TokenKind::LBracket)?;
            let index = self.parse_expression()?;
            self.expect(&TokenKind::RBracket)?;
            MemberProp::Computed(Box::new(index))
        };
        let span = object.span.to(self.previous_span());
        Some(Expr::new(
            ExprKind::Member {
                object: Box::new(object),
                property,
            },
            span,
        ))
    }

    /// `(a, b, ...)`, trailing comma allowed.
    fn parse_arguments(&mut self) -> Option<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(args)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let span = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::String(s) => ExprKind::String(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::This => ExprKind::This,
            TokenKind::Identifier(name) => ExprKind::Identifier(name),
            TokenKind::LParen => return self.parse_paren(),
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Function => {
                return self.parse_function_expression().map(function_expr);
            }
            _ => {
                self.unexpected();
                return None;
            }
        };
        self.advance();
        Some(Expr::new(kind, span))
    }

    fn parse_paren(&mut self) -> Option<Expr> {
        let start = self.advance().span; // eat `(`
        let inner = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let span = start.to(self.previous_span());
        Some(Expr::new(ExprKind::Paren(Box::new(inner)), span))
    }

    /// `[a, b, c]`
    fn parse_array_literal(&mut self) -> Option<Expr> {
        let start = self.advance().span; // eat `[`
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            elements.push(self.parse_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        let span = start.to(self.previous_span());
        Some(Expr::new(ExprKind::Array(elements), span))
    }

    /// `{ key: value, shorthand, method() {} }`
    fn parse_object_literal(&mut self) -> Option<Expr> {
        let start = self.advance().span; // eat `{`
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            properties.push(self.parse_property()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        let span = start.to(self.previous_span());
        Some(Expr::new(ExprKind::Object(properties), span))
    }

    fn parse_property(&mut self) -> Option<Property> {
        let start = self.current_span();
        let (key, shorthand_ok) = match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                (s, false)
            }
            TokenKind::Number(n) => {
                self.advance();
                (number_key(n), false)
            }
            TokenKind::Identifier(_) => (self.expect_property_name()?.name, true),
            _ => (self.expect_property_name()?.name, false),
        };

        let value = if self.eat(&TokenKind::Colon) {
            let mut value = self.parse_assignment()?;
            infer_function_name(&mut value, &key);
            value
        } else if self.check(&TokenKind::LParen) {
            function_expr(self.parse_method(&key, start)?)
        } else if shorthand_ok {
            Expr::new(ExprKind::Identifier(key.clone()), start)
        } else {
            self.unexpected();
            return None;
        };
        let span = start.to(self.previous_span());
        Some(Property { key, value, span })
    }
}

/// Numeric object keys are stored under their canonical string form.
fn number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn function_expr(def: Rc<FunctionDef>) -> Expr {
    let span = def.span;
    Expr::new(ExprKind::Function(def), span)
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr::new(
        ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}

fn logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr::new(
        ExprKind::Logical {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}
