//! Tokens and source locations for declaration files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range plus the 1-indexed line/column of its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self { start, end, line, column }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        if other.end <= self.start {
            return *self;
        }
        Span::new(self.start, other.end, self.line, self.column)
    }
}

/// A lexed token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Using,
    Namespace,
    Class,
    This,
    Static,
    True,
    False,
    Null,

    // Literals
    Identifier(String),
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Equal,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AmpAmp,
    PipePipe,
    Question,
    QuestionQuestion,
    FatArrow,
    Dot,
    Colon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,

    /// End of input
    Eof,
}

impl Token {
    /// Identifier text, if this is an identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Token::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Using => "using",
            Token::Namespace => "namespace",
            Token::Class => "class",
            Token::This => "this",
            Token::Static => "static",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Identifier(name) => return write!(f, "identifier '{}'", name),
            Token::IntLiteral(value) => return write!(f, "integer {}", value),
            Token::FloatLiteral(value) => return write!(f, "number {}", value),
            Token::StringLiteral(value) => return write!(f, "string \"{}\"", value),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Bang => "!",
            Token::Equal => "=",
            Token::EqualEqual => "==",
            Token::BangEqual => "!=",
            Token::Less => "<",
            Token::LessEqual => "<=",
            Token::Greater => ">",
            Token::GreaterEqual => ">=",
            Token::AmpAmp => "&&",
            Token::PipePipe => "||",
            Token::Question => "?",
            Token::QuestionQuestion => "??",
            Token::FatArrow => "=>",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::Eof => "end of file",
        };
        write!(f, "'{}'", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to_covers_both() {
        let a = Span::new(4, 8, 1, 5);
        let b = Span::new(10, 14, 1, 11);
        let joined = a.to(b);
        assert_eq!(joined.start, 4);
        assert_eq!(joined.end, 14);
        assert_eq!(joined.column, 5);
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token::FatArrow.to_string(), "'=>'");
        assert_eq!(Token::Identifier("Id".into()).to_string(), "identifier 'Id'");
    }
}
