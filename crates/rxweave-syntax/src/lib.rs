//! rxweave declaration syntax
//!
//! Lexer, parser and symbol table for the C#-flavored class declarations the
//! reactive property compiler consumes.
//!
//! # Usage
//!
//! ```ignore
//! use rxweave_syntax::{DeclarationSet, SymbolTable};
//!
//! let set = DeclarationSet::parse("models.rxd", source)?;
//! for class in set.classes() {
//!     println!("{}", class.display_name());
//! }
//! ```

#![warn(missing_docs)]

#[allow(missing_docs)]
pub mod ast;
pub mod lexer;
#[allow(missing_docs)]
pub mod parser;
pub mod symbols;
pub mod token;

pub use ast::{ClassDecl, Expr, ExprKind, MemberDecl, MemberKind, SourceFile, TypeRef};
pub use lexer::{LexError, Lexer};
pub use parser::{parse_expression_source, parse_source, ParseError, ParseErrorKind, Parser};
pub use symbols::{DeclarationSet, ReactiveConventions, SymbolTable};
pub use token::{Span, Token};

/// Failure to read a declaration file.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    /// The input could not be tokenized
    #[error("{} lex error(s), first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
    Lex(Vec<LexError>),

    /// The token stream did not form valid declarations
    #[error("{} parse error(s), first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
    Parse(Vec<ParseError>),
}

impl SyntaxError {
    /// Every error location with its message.
    pub fn locations(&self) -> Vec<(Span, String)> {
        match self {
            SyntaxError::Lex(errors) => errors.iter().map(|e| (e.span(), e.to_string())).collect(),
            SyntaxError::Parse(errors) => errors.iter().map(|e| (e.span, e.message.clone())).collect(),
        }
    }
}
