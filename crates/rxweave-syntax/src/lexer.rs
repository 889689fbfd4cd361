//! Lexer for rxweave declaration files.
//!
//! Tokens are recognized by logos; the driver below adds line/column
//! information so every token carries a [`Span`] usable for diagnostics.

use crate::token::{Span, Token};
use logos::Logos;
use thiserror::Error;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
enum Lexeme {
    #[token("/*", skip_block_comment)]
    BlockComment,

    #[token("using")]
    KwUsing,
    #[token("namespace")]
    KwNamespace,
    #[token("class")]
    KwClass,
    #[token("this")]
    KwThis,
    #[token("static")]
    KwStatic,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,
    #[token("null")]
    KwNull,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),
    #[regex(r"[0-9][0-9_]*", |lex| digits(lex.slice()).parse::<i64>().ok())]
    Int(i64),
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*", |lex| digits(lex.slice()).parse::<f64>().ok())]
    Float(f64),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unquote(lex.slice()))]
    Str(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Not,
    #[token("=")]
    Assign,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("?")]
    Question,
    #[token("??")]
    Coalesce,
    #[token("=>")]
    Arrow,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
}

/// Consume through the closing `*/`, or to end of input if there is none.
fn skip_block_comment(lex: &mut logos::Lexer<Lexeme>) -> logos::Skip {
    let rest = lex.remainder();
    let len = rest.find("*/").map_or(rest.len(), |at| at + 2);
    lex.bump(len);
    logos::Skip
}

fn digits(text: &str) -> String {
    text.chars().filter(|&c| c != '_').collect()
}

fn unquote(quoted: &str) -> String {
    let body = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut escaped = false;
    for c in body.chars() {
        if !escaped {
            if c == '\\' {
                escaped = true;
            } else {
                out.push(c);
            }
            continue;
        }
        escaped = false;
        out.push(match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            other => other,
        });
    }
    out
}

impl Lexeme {
    /// The parser-facing token; `None` for trivia.
    fn into_token(self) -> Option<Token> {
        let token = match self {
            Lexeme::BlockComment => return None,
            Lexeme::KwUsing => Token::Using,
            Lexeme::KwNamespace => Token::Namespace,
            Lexeme::KwClass => Token::Class,
            Lexeme::KwThis => Token::This,
            Lexeme::KwStatic => Token::Static,
            Lexeme::KwTrue => Token::True,
            Lexeme::KwFalse => Token::False,
            Lexeme::KwNull => Token::Null,
            Lexeme::Ident(name) => Token::Identifier(name),
            Lexeme::Int(v) => Token::IntLiteral(v),
            Lexeme::Float(v) => Token::FloatLiteral(v),
            Lexeme::Str(s) => Token::StringLiteral(s),
            Lexeme::Plus => Token::Plus,
            Lexeme::Minus => Token::Minus,
            Lexeme::Star => Token::Star,
            Lexeme::Slash => Token::Slash,
            Lexeme::Percent => Token::Percent,
            Lexeme::Not => Token::Bang,
            Lexeme::Assign => Token::Equal,
            Lexeme::Eq => Token::EqualEqual,
            Lexeme::Ne => Token::BangEqual,
            Lexeme::Lt => Token::Less,
            Lexeme::Le => Token::LessEqual,
            Lexeme::Gt => Token::Greater,
            Lexeme::Ge => Token::GreaterEqual,
            Lexeme::AndAnd => Token::AmpAmp,
            Lexeme::OrOr => Token::PipePipe,
            Lexeme::Question => Token::Question,
            Lexeme::Coalesce => Token::QuestionQuestion,
            Lexeme::Arrow => Token::FatArrow,
            Lexeme::Dot => Token::Dot,
            Lexeme::Colon => Token::Colon,
            Lexeme::OpenParen => Token::LeftParen,
            Lexeme::CloseParen => Token::RightParen,
            Lexeme::OpenBrace => Token::LeftBrace,
            Lexeme::CloseBrace => Token::RightBrace,
            Lexeme::OpenBracket => Token::LeftBracket,
            Lexeme::CloseBracket => Token::RightBracket,
            Lexeme::Semi => Token::Semicolon,
            Lexeme::Comma => Token::Comma,
        };
        Some(token)
    }
}

/// Errors produced while tokenizing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    /// A character that starts no token
    #[error("unexpected character '{char}' at {}:{}", .span.line, .span.column)]
    UnexpectedCharacter {
        /// The offending character
        char: char,
        /// Its location
        span: Span,
    },
    /// A string literal without a closing quote
    #[error("string starting at {}:{} is never closed", .span.line, .span.column)]
    UnterminatedString {
        /// Location of the opening quote
        span: Span,
    },
    /// A numeric literal that does not fit its type
    #[error("number '{text}' at {}:{} is out of range", .span.line, .span.column)]
    InvalidNumber {
        /// Literal text
        text: String,
        /// Its location
        span: Span,
    },
}

impl LexError {
    /// Location of the error.
    pub fn span(&self) -> Span {
        match *self {
            Self::UnexpectedCharacter { span, .. } | Self::UnterminatedString { span } | Self::InvalidNumber { span, .. } => span,
        }
    }

    fn classify(text: &str, span: Span) -> Self {
        match text.chars().next() {
            Some('"') => Self::UnterminatedString { span },
            Some(c) if c.is_ascii_digit() => Self::InvalidNumber {
                text: text.to_owned(),
                span,
            },
            c => Self::UnexpectedCharacter {
                char: c.unwrap_or('\0'),
                span,
            },
        }
    }
}

/// Line/column bookkeeping over a byte offset.
struct Cursor {
    offset: usize,
    line: u32,
    column: u32,
}

impl Cursor {
    fn move_to(&mut self, source: &str, target: usize) {
        for c in source[self.offset..target].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = target;
    }

    fn span_to(&self, end: usize) -> Span {
        Span::new(self.offset, end, self.line, self.column)
    }
}

/// Tokenizer over one source text.
pub struct Lexer<'a> {
    source: &'a str,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `source`.
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Tokenize the whole input. The stream always ends with [`Token::Eof`].
    /// Every bad lexeme is collected before failing.
    pub fn tokenize(self) -> Result<Vec<(Token, Span)>, Vec<LexError>> {
        let source = self.source;
        let mut cursor = Cursor {
            offset: 0,
            line: 1,
            column: 1,
        };
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for (result, range) in Lexeme::lexer(source).spanned() {
            cursor.move_to(source, range.start);
            let span = cursor.span_to(range.end);
            match result {
                Ok(lexeme) => tokens.extend(lexeme.into_token().map(|token| (token, span))),
                Err(()) => errors.push(LexError::classify(&source[range], span)),
            }
        }

        cursor.move_to(source, source.len());
        tokens.push((Token::Eof, cursor.span_to(source.len())));

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_lex_property_declaration() {
        let tokens = lex("public string Id { get; set; } = \"\";");
        assert_eq!(tokens[0], Token::Identifier("public".into()));
        assert_eq!(tokens[3], Token::LeftBrace);
        assert_eq!(tokens[9], Token::Equal);
        assert_eq!(tokens[10], Token::StringLiteral(String::new()));
        assert_eq!(tokens.last(), Some(&Token::Eof));
    }

    #[test]
    fn test_lex_operators_longest_match() {
        let tokens = lex("a ?? b => c == d != e <= f >= g && h || !i");
        assert!(tokens.contains(&Token::QuestionQuestion));
        assert!(tokens.contains(&Token::FatArrow));
        assert!(tokens.contains(&Token::EqualEqual));
        assert!(tokens.contains(&Token::BangEqual));
        assert!(tokens.contains(&Token::LessEqual));
        assert!(tokens.contains(&Token::GreaterEqual));
        assert!(tokens.contains(&Token::AmpAmp));
        assert!(tokens.contains(&Token::PipePipe));
        assert!(tokens.contains(&Token::Bang));
    }

    #[test]
    fn test_lex_numbers_and_strings() {
        let tokens = lex("1_000 2.5 \"a\\\"b\"");
        assert_eq!(tokens[0], Token::IntLiteral(1000));
        assert_eq!(tokens[1], Token::FloatLiteral(2.5));
        assert_eq!(tokens[2], Token::StringLiteral("a\"b".into()));
    }

    #[test]
    fn test_lex_skips_comments() {
        let tokens = lex("// line\nclass /* block */ Foo");
        assert_eq!(tokens, vec![Token::Class, Token::Identifier("Foo".into()), Token::Eof]);
    }

    #[test]
    fn test_lex_tracks_lines() {
        let tokens = Lexer::new("class\n  Foo").tokenize().unwrap();
        let (_, span) = &tokens[1];
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 3);
    }

    #[test]
    fn test_lex_unexpected_character() {
        let errors = Lexer::new("class #").tokenize().unwrap_err();
        assert!(matches!(errors[0], LexError::UnexpectedCharacter { char: '#', .. }));
    }
}
