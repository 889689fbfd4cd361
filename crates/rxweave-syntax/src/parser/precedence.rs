//! Binding power of infix operators in getter expressions.

use crate::ast::BinaryOp;
use crate::token::Token;

/// Binding strength; later variants bind tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None = 0,
    Conditional = 1,    // ?:
    NullCoalescing = 2, // ??
    LogicalOr = 3,      // ||
    LogicalAnd = 4,     // &&
    Equality = 5,       // ==, !=
    Relational = 6,     // <, >, <=, >=
    Additive = 7,       // +, -
    Multiplicative = 8, // *, /, %
    Unary = 9,          // !, -
    Call = 10,          // (), .
}

/// `Precedence::None` for tokens that cannot continue an expression.
pub fn infix_precedence(token: &Token) -> Precedence {
    match token {
        Token::Question => Precedence::Conditional,
        Token::QuestionQuestion => Precedence::NullCoalescing,
        Token::PipePipe => Precedence::LogicalOr,
        Token::AmpAmp => Precedence::LogicalAnd,
        Token::EqualEqual | Token::BangEqual => Precedence::Equality,
        Token::Less | Token::LessEqual | Token::Greater | Token::GreaterEqual => Precedence::Relational,
        Token::Plus | Token::Minus => Precedence::Additive,
        Token::Star | Token::Slash | Token::Percent => Precedence::Multiplicative,
        Token::LeftParen | Token::Dot => Precedence::Call,
        _ => Precedence::None,
    }
}

/// `a ?? b ?? c` groups as `a ?? (b ?? c)`; likewise the conditional.
pub fn is_right_associative(token: &Token) -> bool {
    matches!(token, Token::Question | Token::QuestionQuestion)
}

pub fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::QuestionQuestion => BinaryOp::Coalesce,
        Token::PipePipe => BinaryOp::Or,
        Token::AmpAmp => BinaryOp::And,
        Token::EqualEqual => BinaryOp::Equal,
        Token::BangEqual => BinaryOp::NotEqual,
        Token::Less => BinaryOp::Less,
        Token::LessEqual => BinaryOp::LessEqual,
        Token::Greater => BinaryOp::Greater,
        Token::GreaterEqual => BinaryOp::GreaterEqual,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Subtract,
        Token::Star => BinaryOp::Multiply,
        Token::Slash => BinaryOp::Divide,
        Token::Percent => BinaryOp::Modulo,
        _ => return None,
    })
}
