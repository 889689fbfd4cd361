//! Syntax tree for declaration files and member-body expressions.

use crate::token::Span;
use std::fmt;

/// A parsed declaration file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// `using` directives in order
    pub usings: Vec<String>,
    /// File-scoped namespace, if any
    pub namespace: Option<String>,
    /// Declared classes in order
    pub classes: Vec<ClassDecl>,
}

/// Declaration modifiers recognized in front of classes and members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Internal,
    Partial,
    Abstract,
    Sealed,
    Static,
    Async,
    Virtual,
    Override,
    Readonly,
}

impl Modifier {
    /// Map a contextual keyword to a modifier.
    pub fn from_keyword(word: &str) -> Option<Modifier> {
        Some(match word {
            "public" => Modifier::Public,
            "private" => Modifier::Private,
            "protected" => Modifier::Protected,
            "internal" => Modifier::Internal,
            "partial" => Modifier::Partial,
            "abstract" => Modifier::Abstract,
            "sealed" => Modifier::Sealed,
            "async" => Modifier::Async,
            "virtual" => Modifier::Virtual,
            "override" => Modifier::Override,
            "readonly" => Modifier::Readonly,
            _ => return None,
        })
    }

    /// Source keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Private => "private",
            Modifier::Protected => "protected",
            Modifier::Internal => "internal",
            Modifier::Partial => "partial",
            Modifier::Abstract => "abstract",
            Modifier::Sealed => "sealed",
            Modifier::Static => "static",
            Modifier::Async => "async",
            Modifier::Virtual => "virtual",
            Modifier::Override => "override",
            Modifier::Readonly => "readonly",
        }
    }

    /// Whether this is an accessibility keyword.
    pub fn is_accessibility(&self) -> bool {
        matches!(
            self,
            Modifier::Public | Modifier::Private | Modifier::Protected | Modifier::Internal
        )
    }
}

/// A (possibly generic, possibly nullable) type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Qualified name, e.g. `System.String` or `Task`
    pub name: String,
    /// Generic arguments
    pub args: Vec<TypeRef>,
    /// Trailing `?`
    pub nullable: bool,
}

impl TypeRef {
    /// A non-generic, non-nullable type.
    pub fn simple(name: impl Into<String>) -> Self {
        TypeRef {
            name: name.into(),
            args: Vec::new(),
            nullable: false,
        }
    }

    /// Last segment of the qualified name.
    pub fn base_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// `void`
    pub fn is_void(&self) -> bool {
        self.name == "void"
    }

    /// `bool` or `System.Boolean`, not nullable.
    pub fn is_bool(&self) -> bool {
        !self.nullable && matches!(self.name.as_str(), "bool" | "Boolean" | "System.Boolean")
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// Class name without type parameters
    pub name: String,
    /// Generic type parameter names
    pub type_params: Vec<String>,
    /// Modifiers in source order
    pub modifiers: Vec<Modifier>,
    /// Base class and interfaces in source order
    pub bases: Vec<TypeRef>,
    /// Members in source order
    pub members: Vec<MemberDecl>,
    /// Span of the class name
    pub name_span: Span,
    /// Span of the whole declaration
    pub span: Span,
}

impl ClassDecl {
    /// Whether the class carries `modifier`.
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }

    /// Whether any base list entry has the given (unqualified) name.
    pub fn derives_from(&self, name: &str) -> bool {
        self.bases.iter().any(|base| base.base_name() == name)
    }

    /// Find a member by name.
    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Name including type parameters, e.g. `Box<T>`.
    pub fn display_name(&self) -> String {
        if self.type_params.is_empty() {
            self.name.clone()
        } else {
            format!("{}<{}>", self.name, self.type_params.join(", "))
        }
    }
}

/// A member of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    /// Member name
    pub name: String,
    /// Attributes in source order
    pub attributes: Vec<Attribute>,
    /// Modifiers in source order
    pub modifiers: Vec<Modifier>,
    /// Property or method details
    pub kind: MemberKind,
    /// Span of the member name
    pub name_span: Span,
    /// Span of the whole member
    pub span: Span,
}

impl MemberDecl {
    /// The property part, if this member is a property.
    pub fn as_property(&self) -> Option<&PropertyDecl> {
        match &self.kind {
            MemberKind::Property(prop) => Some(prop),
            MemberKind::Method(_) => None,
        }
    }

    /// The method part, if this member is a method.
    pub fn as_method(&self) -> Option<&MethodDecl> {
        match &self.kind {
            MemberKind::Method(method) => Some(method),
            MemberKind::Property(_) => None,
        }
    }

    /// Whether the member carries `modifier`.
    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

/// Member shape.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Property(PropertyDecl),
    Method(MethodDecl),
}

/// A property declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    /// Declared type
    pub ty: TypeRef,
    /// `get` accessor, if declared
    pub getter: Option<Accessor>,
    /// `set` accessor, if declared
    pub setter: Option<Accessor>,
    /// `= expr;` initializer
    pub initializer: Option<Expr>,
}

impl PropertyDecl {
    /// Expression body of the getter, if it has one.
    pub fn getter_body(&self) -> Option<&Expr> {
        self.getter.as_ref().and_then(|g| g.body.as_ref())
    }
}

/// A `get`/`set` accessor. `body` is `None` for an auto accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub body: Option<Expr>,
    pub span: Span,
}

/// A method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub return_type: TypeRef,
    pub params: Vec<Param>,
    /// Expression body; `None` for a declaration without a body
    pub body: Option<Expr>,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

/// An attribute occurrence, e.g. `[Derived(CacheMode.Disabled, "A")]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name as written
    pub name: String,
    /// Arguments in source order
    pub args: Vec<AttrArg>,
    /// Span of the attribute
    pub span: Span,
}

/// An attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrArg {
    Positional { value: AttrValue, span: Span },
    Named { name: String, value: AttrValue, span: Span },
}

impl AttrArg {
    /// Location of the argument.
    pub fn span(&self) -> Span {
        match self {
            AttrArg::Positional { span, .. } | AttrArg::Named { span, .. } => *span,
        }
    }
}

/// Constant attribute argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Dotted name such as `CacheMode.Disabled`
    Path(Vec<String>),
    /// Collected variadic arguments
    Array(Vec<AttrValue>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => write!(f, "null"),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::Str(s) => write!(f, "\"{}\"", s),
            AttrValue::Path(segments) => write!(f, "{}", segments.join(".")),
            AttrValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// Bare name; a member of `this` unless bound by a lambda
    Identifier(String),
    This,
    Member {
        object: Box<Expr>,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Lambda {
        is_static: bool,
        param: String,
        body: Box<Expr>,
    },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    /// Source operator text.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }

    /// Binding strength used when printing.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Coalesce => 2,
            BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::Equal | BinaryOp::NotEqual => 5,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => 6,
            BinaryOp::Add | BinaryOp::Subtract => 7,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 8,
        }
    }
}

/// Receivers that name host helpers rather than class members.
pub const HOST_RECEIVERS: &[&str] = &["string", "Math"];

/// A read of a class member found in an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRead {
    pub name: String,
    pub span: Span,
}

impl Expr {
    /// Create an expression node.
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    /// `this.To(static x => body)`: returns the parameter name and body.
    pub fn as_static_projection(&self) -> Option<(&str, &Expr)> {
        let ExprKind::Call { callee, args } = &self.kind else {
            return None;
        };
        let ExprKind::Member { object, name } = &callee.kind else {
            return None;
        };
        if name != "To" || !matches!(object.kind, ExprKind::This) || args.len() != 1 {
            return None;
        }
        match &args[0].kind {
            ExprKind::Lambda { is_static: true, param, body } => Some((param.as_str(), body)),
            _ => None,
        }
    }

    /// Every member of the enclosing class this expression reads, in order.
    pub fn member_reads(&self) -> Vec<MemberRead> {
        let mut reads = Vec::new();
        let mut bound = Vec::new();
        collect_reads(self, &mut bound, &mut reads);
        reads
    }
}

fn collect_reads(expr: &Expr, bound: &mut Vec<String>, reads: &mut Vec<MemberRead>) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::This => {}
        ExprKind::Identifier(name) => {
            if !bound.contains(name) && !HOST_RECEIVERS.contains(&name.as_str()) {
                reads.push(MemberRead { name: name.clone(), span: expr.span });
            }
        }
        ExprKind::Member { object, name } => match &object.kind {
            ExprKind::This => reads.push(MemberRead { name: name.clone(), span: expr.span }),
            ExprKind::Identifier(receiver) if bound.contains(receiver) => {
                reads.push(MemberRead { name: name.clone(), span: expr.span })
            }
            _ => collect_reads(object, bound, reads),
        },
        ExprKind::Call { callee, args } => {
            // `this.To(...)` reads nothing by itself
            let is_projection = matches!(
                &callee.kind,
                ExprKind::Member { object, name } if name == "To" && matches!(object.kind, ExprKind::This)
            );
            if !is_projection {
                collect_reads(callee, bound, reads);
            }
            for arg in args {
                collect_reads(arg, bound, reads);
            }
        }
        ExprKind::Unary { operand, .. } => collect_reads(operand, bound, reads),
        ExprKind::Binary { left, right, .. } => {
            collect_reads(left, bound, reads);
            collect_reads(right, bound, reads);
        }
        ExprKind::Conditional { condition, then_branch, else_branch } => {
            collect_reads(condition, bound, reads);
            collect_reads(then_branch, bound, reads);
            collect_reads(else_branch, bound, reads);
        }
        ExprKind::Lambda { param, body, .. } => {
            bound.push(param.clone());
            collect_reads(body, bound, reads);
            bound.pop();
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, 0)
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, min_prec: u8) -> fmt::Result {
    match &expr.kind {
        ExprKind::Literal(Literal::Null) => write!(f, "null"),
        ExprKind::Literal(Literal::Bool(b)) => write!(f, "{}", b),
        ExprKind::Literal(Literal::Int(i)) if *i < 0 && min_prec >= 9 => write!(f, "({})", i),
        ExprKind::Literal(Literal::Int(i)) => write!(f, "{}", i),
        ExprKind::Literal(Literal::Float(x)) if x.is_sign_negative() && min_prec >= 9 => write!(f, "({:?})", x),
        ExprKind::Literal(Literal::Float(x)) => write!(f, "{:?}", x),
        ExprKind::Literal(Literal::Str(s)) => write!(f, "\"{}\"", escape_string(s)),
        ExprKind::Identifier(name) => write!(f, "{}", name),
        ExprKind::This => write!(f, "this"),
        ExprKind::Member { object, name } => {
            write_expr(f, object, 10)?;
            write!(f, ".{}", name)
        }
        ExprKind::Call { callee, args } => {
            write_expr(f, callee, 10)?;
            write!(f, "(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_expr(f, arg, 0)?;
            }
            write!(f, ")")
        }
        ExprKind::Unary { op, operand } => {
            let symbol = match op {
                UnaryOp::Not => "!",
                UnaryOp::Negate => "-",
            };
            let parens = min_prec > 9;
            if parens {
                write!(f, "(")?;
            }
            write!(f, "{}", symbol)?;
            // `- -x` must not print as the decrement token
            if *op == UnaryOp::Negate && matches!(operand.kind, ExprKind::Unary { op: UnaryOp::Negate, .. }) {
                write!(f, "(")?;
                write_expr(f, operand, 0)?;
                write!(f, ")")?;
            } else {
                write_expr(f, operand, 9)?;
            }
            if parens {
                write!(f, ")")?;
            }
            Ok(())
        }
        ExprKind::Binary { op, left, right } => {
            let prec = op.precedence();
            let parens = prec < min_prec;
            if parens {
                write!(f, "(")?;
            }
            // `??` groups to the right, everything else to the left
            let (left_prec, right_prec) = if *op == BinaryOp::Coalesce {
                (prec + 1, prec)
            } else {
                (prec, prec + 1)
            };
            write_expr(f, left, left_prec)?;
            write!(f, " {} ", op.as_str())?;
            write_expr(f, right, right_prec)?;
            if parens {
                write!(f, ")")?;
            }
            Ok(())
        }
        ExprKind::Conditional { condition, then_branch, else_branch } => {
            let parens = min_prec > 1;
            if parens {
                write!(f, "(")?;
            }
            write_expr(f, condition, 2)?;
            write!(f, " ? ")?;
            write_expr(f, then_branch, 1)?;
            write!(f, " : ")?;
            write_expr(f, else_branch, 1)?;
            if parens {
                write!(f, ")")?;
            }
            Ok(())
        }
        ExprKind::Lambda { is_static, param, body } => {
            let parens = min_prec > 0;
            if parens {
                write!(f, "(")?;
            }
            if *is_static {
                write!(f, "static ")?;
            }
            write!(f, "{} => ", param)?;
            write_expr(f, body, 0)?;
            if parens {
                write!(f, ")")?;
            }
            Ok(())
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out
}
