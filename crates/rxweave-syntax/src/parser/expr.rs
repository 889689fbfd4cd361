//! Expression parsing (Pratt parser over the precedence table).

use super::precedence::{binary_op, infix_precedence, is_right_associative, Precedence};
use super::{ParseError, ParseErrorKind, Parser, MAX_DEPTH};
use crate::ast::{Expr, ExprKind, Literal, UnaryOp};
use crate::token::Token;

impl Parser {
    /// Parse a full expression.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_expression_with_precedence(Precedence::None)
    }

    fn parse_expression_with_precedence(&mut self, min: Precedence) -> Result<Expr, ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.depth -= 1;
            return Err(ParseError::new(
                ParseErrorKind::ParserLimitExceeded {
                    message: "Expression nesting is too deep".to_string(),
                },
                self.current_span(),
            ));
        }
        let result = self.parse_infix_chain(min);
        self.depth -= 1;
        result
    }

    fn parse_infix_chain(&mut self, min: Precedence) -> Result<Expr, ParseError> {
        let mut left = self.parse_prefix()?;

        loop {
            let token = self.current().clone();
            let prec = infix_precedence(&token);
            if prec == Precedence::None || prec <= min && !(prec == min && is_right_associative(&token)) {
                break;
            }

            left = match token {
                Token::Dot => {
                    self.advance();
                    let (name, span) = self.expect_identifier()?;
                    let span = left.span.to(span);
                    Expr::new(
                        ExprKind::Member {
                            object: Box::new(left),
                            name,
                        },
                        span,
                    )
                }
                Token::LeftParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(&Token::RightParen) {
                        args.push(self.parse_expression()?);
                        if !self.check(&Token::Comma) {
                            break;
                        }
                        self.advance();
                    }
                    self.expect(Token::RightParen)?;
                    let span = left.span.to(self.previous_span());
                    Expr::new(
                        ExprKind::Call {
                            callee: Box::new(left),
                            args,
                        },
                        span,
                    )
                }
                Token::Question => {
                    self.advance();
                    let then_branch = self.parse_expression_with_precedence(Precedence::None)?;
                    self.expect(Token::Colon)?;
                    let else_branch = self.parse_expression_with_precedence(Precedence::None)?;
                    let span = left.span.to(else_branch.span);
                    Expr::new(
                        ExprKind::Conditional {
                            condition: Box::new(left),
                            then_branch: Box::new(then_branch),
                            else_branch: Box::new(else_branch),
                        },
                        span,
                    )
                }
                _ => {
                    let Some(op) = binary_op(&token) else {
                        break;
                    };
                    self.advance();
                    let right = self.parse_expression_with_precedence(prec)?;
                    let span = left.span.to(right.span);
                    Expr::new(
                        ExprKind::Binary {
                            op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        span,
                    )
                }
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let span = self.current_span();
        let token = self.current().clone();

        let kind = match token {
            Token::IntLiteral(value) => ExprKind::Literal(Literal::Int(value)),
            Token::FloatLiteral(value) => ExprKind::Literal(Literal::Float(value)),
            Token::StringLiteral(value) => ExprKind::Literal(Literal::Str(value)),
            Token::True => ExprKind::Literal(Literal::Bool(true)),
            Token::False => ExprKind::Literal(Literal::Bool(false)),
            Token::Null => ExprKind::Literal(Literal::Null),
            Token::This => ExprKind::This,
            Token::Static => return self.parse_lambda(),
            Token::Identifier(name) => {
                if matches!(self.peek(), Some(Token::FatArrow)) {
                    return self.parse_lambda();
                }
                ExprKind::Identifier(name)
            }
            Token::Bang | Token::Minus => {
                self.advance();
                let operand = self.parse_expression_with_precedence(Precedence::Unary)?;
                let op = if token == Token::Bang { UnaryOp::Not } else { UnaryOp::Negate };
                let span = span.to(operand.span);
                return Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                ));
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                return Ok(Expr::new(inner.kind, span.to(self.previous_span())));
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidSyntax {
                        reason: format!("Expected an expression, found {}", token),
                    },
                    span,
                ))
            }
        };

        self.advance();
        Ok(Expr::new(kind, span))
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_span();
        let is_static = if self.check(&Token::Static) {
            self.advance();
            true
        } else {
            false
        };
        let (param, _) = self.expect_identifier()?;
        self.expect(Token::FatArrow)?;
        let body = self.parse_expression()?;
        let span = start.to(body.span);
        Ok(Expr::new(
            ExprKind::Lambda {
                is_static,
                param,
                body: Box::new(body),
            },
            span,
        ))
    }
}
