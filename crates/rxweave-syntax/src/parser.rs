//! Parser for rxweave declaration files
//!
//! A recursive descent parser that turns the token stream from the lexer
//! into a [`SourceFile`]. Member bodies are parsed into [`Expr`] trees by
//! the Pratt parser in [`expr`].

pub mod error;
pub mod expr;
pub mod precedence;

use crate::ast::*;
use crate::lexer::{LexError, Lexer};
use crate::token::{Span, Token};

pub use error::{ParseError, ParseErrorKind};

/// Parser state.
pub struct Parser {
    /// Pre-tokenized input, always terminated by `Eof`
    tokens: Vec<(Token, Span)>,

    /// Current position in token stream
    pos: usize,

    /// Current expression nesting depth
    depth: usize,

    /// Accumulated parse errors (allows continuing after errors)
    errors: Vec<ParseError>,
}

/// Maximum expression nesting before the parser gives up.
const MAX_DEPTH: usize = 256;

impl Parser {
    /// Create a new parser from source code.
    pub fn new(source: &str) -> Result<Self, Vec<LexError>> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
            errors: Vec::new(),
        })
    }

    /// Parse the whole file.
    ///
    /// Returns the file on success, or all accumulated errors on failure.
    pub fn parse(mut self) -> Result<SourceFile, Vec<ParseError>> {
        let mut usings = Vec::new();
        let mut namespace = None;
        let mut classes = Vec::new();

        while self.check(&Token::Using) {
            match self.parse_using() {
                Ok(path) => usings.push(path),
                Err(err) => {
                    self.errors.push(err);
                    self.sync_past(&Token::Semicolon);
                }
            }
        }

        let mut block_namespace = false;
        if self.check(&Token::Namespace) {
            self.advance();
            match self.parse_qualified_name() {
                Ok(name) => namespace = Some(name),
                Err(err) => self.errors.push(err),
            }
            if self.check(&Token::LeftBrace) {
                self.advance();
                block_namespace = true;
            } else if let Err(err) = self.expect(Token::Semicolon) {
                self.errors.push(err);
            }
        }

        while !self.at_eof() && !(block_namespace && self.check(&Token::RightBrace)) {
            match self.parse_class() {
                Ok(class) => classes.push(class),
                Err(err) => {
                    self.errors.push(err);
                    self.sync_to_class_boundary();
                }
            }
        }

        if block_namespace {
            if let Err(err) = self.expect(Token::RightBrace) {
                self.errors.push(err);
            }
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        Ok(SourceFile {
            usings,
            namespace,
            classes,
        })
    }

    // ========================================================================
    // Token Management
    // ========================================================================

    /// Get the current token.
    #[inline]
    pub fn current(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    /// Get the current token's span.
    #[inline]
    pub fn current_span(&self) -> Span {
        self.tokens[self.pos].1
    }

    /// Peek at the next token (lookahead).
    #[inline]
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(tok, _)| tok)
    }

    /// Span of the most recently consumed token.
    fn previous_span(&self) -> Span {
        if self.pos == 0 {
            self.current_span()
        } else {
            self.tokens[self.pos - 1].1
        }
    }

    /// Advance to the next token, returning the previous current token.
    pub fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].0.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    /// Check if the current token matches the given kind.
    #[inline]
    pub fn check(&self, expected: &Token) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(expected)
    }

    /// Check if the current token is the contextual keyword `word`.
    fn check_word(&self, word: &str) -> bool {
        self.current().as_identifier() == Some(word)
    }

    /// Check if we've reached EOF.
    #[inline]
    pub fn at_eof(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    /// Consume the current token if it matches the expected kind.
    pub fn expect(&mut self, expected: Token) -> Result<Token, ParseError> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected_token(&[expected]))
        }
    }

    /// Consume an identifier and return its text and span.
    fn expect_identifier(&mut self) -> Result<(String, Span), ParseError> {
        let span = self.current_span();
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.unexpected_token(&[Token::Identifier(String::new())])),
        }
    }

    // ========================================================================
    // Error Handling
    // ========================================================================

    /// Create an "unexpected token" error.
    fn unexpected_token(&self, expected: &[Token]) -> ParseError {
        let span = self.current_span();
        if self.at_eof() {
            ParseError::new(
                ParseErrorKind::UnexpectedEof {
                    expected: expected.to_vec(),
                },
                span,
            )
        } else {
            ParseError::new(
                ParseErrorKind::UnexpectedToken {
                    expected: expected.to_vec(),
                    found: self.current().clone(),
                },
                span,
            )
        }
    }

    /// Skip tokens up to and including `token`.
    fn sync_past(&mut self, token: &Token) {
        while !self.at_eof() && !self.check(token) {
            self.advance();
        }
        if !self.at_eof() {
            self.advance();
        }
    }

    /// Skip to the end of the current member: past `;` or a balanced `}`.
    fn sync_to_member_boundary(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.current() {
                Token::LeftBrace => depth += 1,
                Token::RightBrace if depth == 0 => return,
                Token::RightBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        if self.check(&Token::Semicolon) {
                            self.advance();
                        }
                        return;
                    }
                }
                Token::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip to the next `class` keyword or the end of input.
    fn sync_to_class_boundary(&mut self) {
        self.advance();
        while !self.at_eof() && !self.check(&Token::Class) && !self.check(&Token::LeftBracket) {
            self.advance();
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn parse_using(&mut self) -> Result<String, ParseError> {
        self.expect(Token::Using)?;
        let path = self.parse_qualified_name()?;
        self.expect(Token::Semicolon)?;
        Ok(path)
    }

    fn parse_qualified_name(&mut self) -> Result<String, ParseError> {
        let (mut name, _) = self.expect_identifier()?;
        while self.check(&Token::Dot) {
            self.advance();
            let (segment, _) = self.expect_identifier()?;
            name.push('.');
            name.push_str(&segment);
        }
        Ok(name)
    }

    fn parse_modifiers(&mut self) -> Vec<Modifier> {
        let mut modifiers = Vec::new();
        loop {
            if self.check(&Token::Static) {
                self.advance();
                modifiers.push(Modifier::Static);
                continue;
            }
            let modifier = self.current().as_identifier().and_then(Modifier::from_keyword);
            match modifier {
                // `partial` before a type name is a modifier, not the type
                Some(modifier) if self.peek_is_declaration_continuation() => {
                    self.advance();
                    modifiers.push(modifier);
                }
                _ => return modifiers,
            }
        }
    }

    fn peek_is_declaration_continuation(&self) -> bool {
        matches!(self.peek(), Some(Token::Identifier(_)) | Some(Token::Class) | Some(Token::Static))
    }

    fn parse_attributes(&mut self) -> Result<Vec<Attribute>, ParseError> {
        let mut attributes = Vec::new();
        while self.check(&Token::LeftBracket) {
            self.advance();
            loop {
                attributes.push(self.parse_attribute()?);
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(Token::RightBracket)?;
        }
        Ok(attributes)
    }

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let start = self.current_span();
        let mut name = self.parse_qualified_name()?;
        // `[DerivedAttribute]` and `[Derived]` are the same attribute
        if let Some(stripped) = name.strip_suffix("Attribute") {
            if !stripped.is_empty() {
                name = stripped.to_string();
            }
        }

        let mut args = Vec::new();
        if self.check(&Token::LeftParen) {
            self.advance();
            while !self.check(&Token::RightParen) {
                args.push(self.parse_attribute_arg()?);
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
            self.expect(Token::RightParen)?;
        }

        Ok(Attribute {
            name,
            args,
            span: start.to(self.previous_span()),
        })
    }

    fn parse_attribute_arg(&mut self) -> Result<AttrArg, ParseError> {
        let start = self.current_span();
        let named = matches!(self.current(), Token::Identifier(_)) && matches!(self.peek(), Some(Token::Equal));
        if named {
            let (name, _) = self.expect_identifier()?;
            self.expect(Token::Equal)?;
            let value = self.parse_attribute_value()?;
            return Ok(AttrArg::Named {
                name,
                value,
                span: start.to(self.previous_span()),
            });
        }
        let value = self.parse_attribute_value()?;
        Ok(AttrArg::Positional {
            value,
            span: start.to(self.previous_span()),
        })
    }

    fn parse_attribute_value(&mut self) -> Result<AttrValue, ParseError> {
        let value = match self.current().clone() {
            Token::StringLiteral(s) => AttrValue::Str(s),
            Token::IntLiteral(i) => AttrValue::Int(i),
            Token::FloatLiteral(x) => AttrValue::Float(x),
            Token::True => AttrValue::Bool(true),
            Token::False => AttrValue::Bool(false),
            Token::Null => AttrValue::Null,
            Token::Minus => {
                self.advance();
                return match self.current().clone() {
                    Token::IntLiteral(i) => {
                        self.advance();
                        Ok(AttrValue::Int(-i))
                    }
                    Token::FloatLiteral(x) => {
                        self.advance();
                        Ok(AttrValue::Float(-x))
                    }
                    _ => Err(self.unexpected_token(&[Token::IntLiteral(0), Token::FloatLiteral(0.0)])),
                };
            }
            Token::Identifier(ref word) if word == "nameof" && matches!(self.peek(), Some(Token::LeftParen)) => {
                self.advance();
                self.advance();
                let path = self.parse_qualified_name()?;
                self.expect(Token::RightParen)?;
                // `nameof(A.B)` is "B"
                let last = path.rsplit('.').next().unwrap_or_default();
                return Ok(AttrValue::Str(last.to_string()));
            }
            Token::Identifier(_) => {
                let path = self.parse_qualified_name()?;
                return Ok(AttrValue::Path(path.split('.').map(str::to_string).collect()));
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidSyntax {
                        reason: format!("Attribute arguments must be constants, found {}", self.current()),
                    },
                    self.current_span(),
                ))
            }
        };
        self.advance();
        Ok(value)
    }

    fn parse_class(&mut self) -> Result<ClassDecl, ParseError> {
        let start = self.current_span();
        // Class-level attributes are accepted and ignored
        self.parse_attributes()?;
        let modifiers = self.parse_modifiers();
        self.expect(Token::Class)?;
        let (name, name_span) = self.expect_identifier()?;

        let mut type_params = Vec::new();
        if self.check(&Token::Less) {
            self.advance();
            loop {
                let (param, _) = self.expect_identifier()?;
                type_params.push(param);
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(Token::Greater)?;
        }

        let mut bases = Vec::new();
        if self.check(&Token::Colon) {
            self.advance();
            loop {
                bases.push(self.parse_type()?);
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }

        self.expect(Token::LeftBrace)?;
        let mut members = Vec::new();
        while !self.check(&Token::RightBrace) && !self.at_eof() {
            match self.parse_member() {
                Ok(member) => members.push(member),
                Err(err) => {
                    self.errors.push(err);
                    self.sync_to_member_boundary();
                }
            }
        }
        self.expect(Token::RightBrace)?;

        Ok(ClassDecl {
            name,
            type_params,
            modifiers,
            bases,
            members,
            name_span,
            span: start.to(self.previous_span()),
        })
    }

    /// Parse a type reference: `Name(.Name)*(<T, ...>)?(?)?`
    pub fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        let name = self.parse_qualified_name()?;
        let mut args = Vec::new();
        if self.check(&Token::Less) {
            self.advance();
            loop {
                args.push(self.parse_type()?);
                if self.check(&Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(Token::Greater)?;
        }
        let nullable = if self.check(&Token::Question) {
            self.advance();
            true
        } else {
            false
        };
        Ok(TypeRef { name, args, nullable })
    }

    fn parse_member(&mut self) -> Result<MemberDecl, ParseError> {
        let start = self.current_span();
        let attributes = self.parse_attributes()?;
        let modifiers = self.parse_modifiers();
        let ty = self.parse_type()?;
        let (name, name_span) = self.expect_identifier()?;

        let kind = match self.current() {
            Token::LeftParen => MemberKind::Method(self.parse_method_rest(ty)?),
            Token::FatArrow => {
                let arrow = self.current_span();
                self.advance();
                let body = self.parse_expression()?;
                self.expect(Token::Semicolon)?;
                MemberKind::Property(PropertyDecl {
                    ty,
                    getter: Some(Accessor {
                        body: Some(body),
                        span: arrow.to(self.previous_span()),
                    }),
                    setter: None,
                    initializer: None,
                })
            }
            Token::LeftBrace => MemberKind::Property(self.parse_property_rest(ty)?),
            _ => {
                return Err(self.unexpected_token(&[Token::LeftParen, Token::FatArrow, Token::LeftBrace]));
            }
        };

        Ok(MemberDecl {
            name,
            attributes,
            modifiers,
            kind,
            name_span,
            span: start.to(self.previous_span()),
        })
    }

    fn parse_method_rest(&mut self, return_type: TypeRef) -> Result<MethodDecl, ParseError> {
        self.expect(Token::LeftParen)?;
        let mut params = Vec::new();
        while !self.check(&Token::RightParen) {
            let start = self.current_span();
            let ty = self.parse_type()?;
            let (name, _) = self.expect_identifier()?;
            params.push(Param {
                name,
                ty,
                span: start.to(self.previous_span()),
            });
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(Token::RightParen)?;

        let body = if self.check(&Token::FatArrow) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(Token::Semicolon)?;

        Ok(MethodDecl {
            return_type,
            params,
            body,
        })
    }

    fn parse_property_rest(&mut self, ty: TypeRef) -> Result<PropertyDecl, ParseError> {
        self.expect(Token::LeftBrace)?;
        let mut getter = None;
        let mut setter = None;

        while !self.check(&Token::RightBrace) {
            // Accessor-level accessibility such as `private set;`
            while self
                .current()
                .as_identifier()
                .and_then(Modifier::from_keyword)
                .is_some_and(|m| m.is_accessibility())
            {
                self.advance();
            }

            let span = self.current_span();
            let slot = if self.check_word("get") {
                &mut getter
            } else if self.check_word("set") || self.check_word("init") {
                &mut setter
            } else {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidSyntax {
                        reason: format!("Expected 'get' or 'set', found {}", self.current()),
                    },
                    span,
                ));
            };
            if slot.is_some() {
                let accessor = self.current().as_identifier().unwrap_or_default().to_string();
                return Err(ParseError::new(ParseErrorKind::DuplicateAccessor { accessor }, span));
            }
            self.advance();

            let body = if self.check(&Token::FatArrow) {
                self.advance();
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect(Token::Semicolon)?;
            *slot = Some(Accessor {
                body,
                span: span.to(self.previous_span()),
            });
        }
        self.expect(Token::RightBrace)?;

        let initializer = if self.check(&Token::Equal) {
            self.advance();
            let value = self.parse_expression()?;
            self.expect(Token::Semicolon)?;
            Some(value)
        } else {
            None
        };

        Ok(PropertyDecl {
            ty,
            getter,
            setter,
            initializer,
        })
    }
}

/// Parse a complete declaration file.
pub fn parse_source(source: &str) -> Result<SourceFile, crate::SyntaxError> {
    let parser = Parser::new(source).map_err(crate::SyntaxError::Lex)?;
    parser.parse().map_err(crate::SyntaxError::Parse)
}

/// Parse a standalone expression, e.g. a getter body supplied out of band.
pub fn parse_expression_source(source: &str) -> Result<Expr, crate::SyntaxError> {
    let mut parser = Parser::new(source).map_err(crate::SyntaxError::Lex)?;
    let expr = parser.parse_expression().map_err(|e| crate::SyntaxError::Parse(vec![e]))?;
    if !parser.at_eof() {
        let err = parser.unexpected_token(&[Token::Eof]);
        return Err(crate::SyntaxError::Parse(vec![err]));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usings_and_namespace() {
        let file = parse_source("using System; using ReactiveUI; namespace Demo.Models;").unwrap();
        assert_eq!(file.usings, vec!["System", "ReactiveUI"]);
        assert_eq!(file.namespace.as_deref(), Some("Demo.Models"));
        assert!(file.classes.is_empty());
    }

    #[test]
    fn test_parse_block_namespace() {
        let file = parse_source("namespace Demo { partial class A { } }").unwrap();
        assert_eq!(file.namespace.as_deref(), Some("Demo"));
        assert_eq!(file.classes[0].name, "A");
    }

    #[test]
    fn test_parse_class_header() {
        let file = parse_source("public abstract partial class Box<T, U> : ReactiveObjectBase, IReactiveObject { }").unwrap();
        let class = &file.classes[0];
        assert_eq!(class.name, "Box");
        assert_eq!(class.type_params, vec!["T", "U"]);
        assert!(class.has_modifier(Modifier::Partial));
        assert!(class.has_modifier(Modifier::Abstract));
        assert!(class.derives_from("IReactiveObject"));
        assert_eq!(class.display_name(), "Box<T, U>");
    }

    #[test]
    fn test_parse_auto_property_with_initializer() {
        let file = parse_source("partial class A { [Reactive] public string Id { get; set; } = \"\"; }").unwrap();
        let member = &file.classes[0].members[0];
        assert_eq!(member.name, "Id");
        assert_eq!(member.attributes[0].name, "Reactive");
        let prop = member.as_property().unwrap();
        assert_eq!(prop.ty.name, "string");
        assert!(prop.getter.is_some());
        assert!(prop.setter.is_some());
        assert!(prop.initializer.is_some());
    }

    #[test]
    fn test_parse_expression_bodied_property() {
        let file = parse_source("partial class A { public bool Same => Id == Name; }").unwrap();
        let prop = file.classes[0].members[0].as_property().unwrap();
        assert!(prop.setter.is_none());
        assert_eq!(prop.getter_body().unwrap().to_string(), "Id == Name");
    }

    #[test]
    fn test_parse_method_declarations() {
        let file = parse_source("partial class A { public async Task<int> Load(string path); void Reset() => Clear(); }").unwrap();
        let load = file.classes[0].members[0].as_method().unwrap();
        assert_eq!(load.return_type.to_string(), "Task<int>");
        assert_eq!(load.params.len(), 1);
        assert!(file.classes[0].members[0].has_modifier(Modifier::Async));
        let reset = file.classes[0].members[1].as_method().unwrap();
        assert!(reset.body.is_some());
    }

    #[test]
    fn test_parse_attribute_arguments() {
        let file = parse_source(
            "partial class A { [Derived(CacheMode.Disabled, \"X\", NotifyOnInitialValue = true)] public int Y => X; }",
        )
        .unwrap();
        let attr = &file.classes[0].members[0].attributes[0];
        assert_eq!(attr.args.len(), 3);
        assert!(matches!(&attr.args[0], AttrArg::Positional { value: AttrValue::Path(p), .. } if p.join(".") == "CacheMode.Disabled"));
        assert!(matches!(&attr.args[2], AttrArg::Named { name, value: AttrValue::Bool(true), .. } if name == "NotifyOnInitialValue"));
    }

    #[test]
    fn test_nameof_attribute_argument_is_a_string() {
        let file = parse_source(
            "partial class A { [Derived(CacheMode.Disabled, nameof(X), nameof(A.Z))] public int Y => X + Z; }",
        )
        .unwrap();
        let attr = &file.classes[0].members[0].attributes[0];
        assert!(matches!(&attr.args[1], AttrArg::Positional { value: AttrValue::Str(s), .. } if s == "X"));
        assert!(matches!(&attr.args[2], AttrArg::Positional { value: AttrValue::Str(s), .. } if s == "Z"));
    }

    #[test]
    fn test_attribute_suffix_is_stripped() {
        let file = parse_source("partial class A { [ReactiveAttribute] int X { get; set; } }").unwrap();
        assert_eq!(file.classes[0].members[0].attributes[0].name, "Reactive");
    }

    #[test]
    fn test_private_setter_is_a_setter() {
        let file = parse_source("partial class A { int X { get; private set; } }").unwrap();
        assert!(file.classes[0].members[0].as_property().unwrap().setter.is_some());
    }

    #[test]
    fn test_duplicate_accessor_is_an_error() {
        let errors = parse_source("partial class A { int X { get; get; } }").unwrap_err();
        let crate::SyntaxError::Parse(errors) = errors else { panic!("expected parse errors") };
        assert!(matches!(errors[0].kind, ParseErrorKind::DuplicateAccessor { .. }));
    }

    #[test]
    fn test_recovers_after_bad_member() {
        let errors = parse_source("partial class A { int X { get; } = ; int Y { get; set; } int Z => ; }").unwrap_err();
        let crate::SyntaxError::Parse(errors) = errors else { panic!("expected parse errors") };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_parse_expression_source_rejects_trailing_tokens() {
        assert!(parse_expression_source("a + b").is_ok());
        assert!(parse_expression_source("a b").is_err());
    }
}
