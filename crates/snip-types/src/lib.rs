//! Shared types for snipcheck.
//!
//! This crate defines the AST for the JavaScript snippet subset, source
//! spans, the error kinds a snippet can raise, and the syntax diagnostics
//! shared by the lexer and parser.

mod error;
mod span;
pub mod ast;

pub use error::{ErrorKind, SyntaxError, SyntaxErrors, UnknownErrorKind, MAX_ERRORS};
pub use span::{Pos, SourceFile, Span};
