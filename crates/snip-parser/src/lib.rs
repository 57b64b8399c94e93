//! snipcheck parser: converts a token stream into an AST.

mod parse_expr;
mod parse_function;
mod parse_stmt;
mod parser;

use std::rc::Rc;

use snip_lexer::Lexer;
use snip_types::ast::{ExprKind, FunctionDef, Stmt};
use snip_types::{SourceFile, SyntaxErrors};

pub use parser::{ParseResult, Parser};

/// Lex and parse a whole source file.
///
/// Lexer errors are reported ahead of parser errors; the program is only
/// returned when neither stage reported anything.
pub fn parse_source(source_file: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source_file).lex();
    let parsed = Parser::new(lexed.tokens, source_file).parse();
    if !lexed.errors.has_errors() {
        return parsed;
    }
    let mut errors = lexed.errors;
    errors.extend(parsed.errors);
    ParseResult {
        program: None,
        errors,
    }
}

/// Build the function behind `new Function(p1, ..., body)`.
///
/// The parameter list and body are spliced into an anonymous function
/// expression and parsed as sloppy top-level code, so the function is only
/// strict if its body opens with `'use strict'`.
pub fn parse_function_parts(params: &str, body: &str) -> Result<Rc<FunctionDef>, SyntaxErrors> {
    let text = format!("(function anonymous({params}\n) {{\n{body}\n}})");
    let source_file = SourceFile::new("anonymous", &text);
    let result = parse_source(&source_file);
    let Some(program) = result.program else {
        return Err(result.errors);
    };
    if let [Stmt::Expr(stmt)] = program.body.as_slice() {
        if let ExprKind::Paren(inner) = &stmt.expr.kind {
            if let ExprKind::Function(def) = &inner.kind {
                return Ok(Rc::clone(def));
            }
        }
    }
    let mut errors = SyntaxErrors::empty();
    errors.push(snip_types::SyntaxError::new(
        "anonymous",
        "Arg string terminates parameters early",
        program.span,
        "",
    ));
    Err(errors)
}
