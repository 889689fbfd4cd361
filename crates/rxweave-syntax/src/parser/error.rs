//! Parse error types and error reporting

use crate::token::{Span, Token};
use std::fmt;

/// A parse error with location and contextual information.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The kind of error that occurred
    pub kind: ParseErrorKind,

    /// Source location of the error
    pub span: Span,

    /// Human-readable error message
    pub message: String,

    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
}

/// The kind of parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// Unexpected token found
    UnexpectedToken {
        /// Tokens that would have been accepted
        expected: Vec<Token>,
        /// Token actually found
        found: Token,
    },

    /// Unexpected end of file
    UnexpectedEof {
        /// Tokens that would have been accepted
        expected: Vec<Token>,
    },

    /// Invalid syntax
    InvalidSyntax {
        /// What went wrong
        reason: String,
    },

    /// Accessor declared twice in one property
    DuplicateAccessor {
        /// `get` or `set`
        accessor: String,
    },

    /// Expression nesting exceeded the parser limit
    ParserLimitExceeded {
        /// Description of the limit
        message: String,
    },
}

impl ParseError {
    /// Create an error with a formatted message.
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        let message = match &kind {
            ParseErrorKind::UnexpectedToken { expected, found } => {
                format!("Unexpected {}, expected {}", found, describe_expected(expected))
            }
            ParseErrorKind::UnexpectedEof { expected } => {
                format!("Unexpected end of file, expected {}", describe_expected(expected))
            }
            ParseErrorKind::InvalidSyntax { reason } => reason.clone(),
            ParseErrorKind::DuplicateAccessor { accessor } => {
                format!("Accessor '{}' is declared more than once", accessor)
            }
            ParseErrorKind::ParserLimitExceeded { message } => message.clone(),
        };
        ParseError {
            kind,
            span,
            message,
            suggestion: None,
        }
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

fn describe_expected(expected: &[Token]) -> String {
    match expected {
        [] => "more input".to_string(),
        [single] => single.to_string(),
        many => {
            let parts: Vec<String> = many.iter().map(|t| t.to_string()).collect();
            format!("one of {}", parts.join(", "))
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.span.line, self.span.column)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
