//! Expression lowering.

use super::builder::MethodBuilder;
use super::instr::{BinOp, Instr};
use crate::error::{CompileError, CompileResult};
use rxweave_syntax::ast::{BinaryOp, Expr, ExprKind, Literal, HOST_RECEIVERS};

/// Names visible to an expression.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Parameters, bound to argument slots in order
    pub params: &'a [String],
    /// Whether bare member names resolve against `this`
    pub has_this: bool,
}

impl<'a> Scope<'a> {
    /// An instance method with the given parameters.
    pub fn instance(params: &'a [String]) -> Self {
        Scope { params, has_this: true }
    }

    /// A static function; only its parameters are visible.
    pub fn detached(params: &'a [String]) -> Self {
        Scope { params, has_this: false }
    }

    fn param(&self, name: &str) -> Option<u16> {
        self.params.iter().position(|p| p == name).map(|i| i as u16)
    }
}

/// Lower `expr`, leaving its value on the stack.
pub fn lower_expr(builder: &mut MethodBuilder, expr: &Expr, scope: Scope<'_>) -> CompileResult<()> {
    match &expr.kind {
        ExprKind::Literal(lit) => builder.emit(match lit {
            Literal::Null => Instr::PushNull,
            Literal::Bool(b) => Instr::PushBool(*b),
            Literal::Int(i) => Instr::PushInt(*i),
            Literal::Float(x) => Instr::PushFloat(*x),
            Literal::Str(s) => Instr::PushStr(s.clone()),
        }),

        ExprKind::Identifier(name) => {
            if let Some(index) = scope.param(name) {
                builder.emit(Instr::LoadArg(index));
            } else if HOST_RECEIVERS.contains(&name.as_str()) {
                return Err(unsupported(builder, format!("'{}' is only valid as a call receiver", name)));
            } else {
                load_this(builder, scope)?;
                builder.emit(Instr::GetProperty(name.clone()));
            }
        }

        ExprKind::This => load_this(builder, scope)?,

        ExprKind::Member { object, name } => match host_receiver(object, scope) {
            Some(host) => builder.emit(Instr::CallHost {
                name: format!("{}.{}", host, name),
                argc: 0,
            }),
            None => {
                lower_expr(builder, object, scope)?;
                builder.emit(Instr::GetProperty(name.clone()));
            }
        },

        ExprKind::Call { callee, args } => {
            let argc = u8::try_from(args.len()).map_err(|_| unsupported(builder, "too many call arguments".to_string()))?;
            match &callee.kind {
                ExprKind::Identifier(name) if scope.param(name).is_none() => {
                    load_this(builder, scope)?;
                    lower_args(builder, args, scope)?;
                    builder.emit(Instr::CallMethod { name: name.clone(), argc });
                }
                ExprKind::Member { object, name } => match host_receiver(object, scope) {
                    Some(host) => {
                        lower_args(builder, args, scope)?;
                        builder.emit(Instr::CallHost {
                            name: format!("{}.{}", host, name),
                            argc,
                        });
                    }
                    None => {
                        lower_expr(builder, object, scope)?;
                        lower_args(builder, args, scope)?;
                        builder.emit(Instr::CallMethod { name: name.clone(), argc });
                    }
                },
                _ => return Err(unsupported(builder, format!("cannot call '{}'", callee))),
            }
        }

        ExprKind::Unary { op, operand } => {
            lower_expr(builder, operand, scope)?;
            builder.emit(Instr::Unary((*op).into()));
        }

        ExprKind::Binary { op, left, right } => match op {
            BinaryOp::And | BinaryOp::Or => {
                let short = builder.new_label();
                let end = builder.new_label();
                lower_expr(builder, left, scope)?;
                let (jump, value): (fn(usize) -> Instr, bool) = if *op == BinaryOp::And {
                    (Instr::JumpIfFalse, false)
                } else {
                    (Instr::JumpIfTrue, true)
                };
                builder.emit_jump(jump, short);
                lower_expr(builder, right, scope)?;
                builder.emit_jump(Instr::Jump, end);
                builder.bind(short);
                builder.emit(Instr::PushBool(value));
                builder.bind(end);
            }
            BinaryOp::Coalesce => {
                let end = builder.new_label();
                lower_expr(builder, left, scope)?;
                builder.emit_jump(Instr::JumpIfNotNull, end);
                lower_expr(builder, right, scope)?;
                builder.bind(end);
            }
            _ => {
                let strict = BinOp::from_source(*op).ok_or_else(|| CompileError::InternalError {
                    message: format!("operator {} has no strict form", op.as_str()),
                })?;
                lower_expr(builder, left, scope)?;
                lower_expr(builder, right, scope)?;
                builder.emit(Instr::Binary(strict));
            }
        },

        ExprKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            let otherwise = builder.new_label();
            let end = builder.new_label();
            lower_expr(builder, condition, scope)?;
            builder.emit_jump(Instr::JumpIfFalse, otherwise);
            lower_expr(builder, then_branch, scope)?;
            builder.emit_jump(Instr::Jump, end);
            builder.bind(otherwise);
            lower_expr(builder, else_branch, scope)?;
            builder.bind(end);
        }

        ExprKind::Lambda { .. } => {
            return Err(unsupported(builder, "lambdas must be hoisted before lowering".to_string()));
        }
    }
    Ok(())
}

fn lower_args(builder: &mut MethodBuilder, args: &[Expr], scope: Scope<'_>) -> CompileResult<()> {
    for arg in args {
        lower_expr(builder, arg, scope)?;
    }
    Ok(())
}

fn load_this(builder: &mut MethodBuilder, scope: Scope<'_>) -> CompileResult<()> {
    if !scope.has_this {
        return Err(unsupported(builder, "instance member read from a static function".to_string()));
    }
    builder.emit(Instr::LoadThis);
    Ok(())
}

/// `string` in `string.IsNullOrEmpty`, unless shadowed by a parameter.
fn host_receiver<'e>(object: &'e Expr, scope: Scope<'_>) -> Option<&'e str> {
    match &object.kind {
        ExprKind::Identifier(name) if scope.param(name).is_none() && HOST_RECEIVERS.contains(&name.as_str()) => {
            Some(name.as_str())
        }
        _ => None,
    }
}

fn unsupported(builder: &MethodBuilder, reason: String) -> CompileError {
    CompileError::UnsupportedExpression {
        member: builder.name().to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxweave_syntax::parse_expression_source;

    fn lower(source: &str, params: &[&str], has_this: bool) -> CompileResult<Vec<Instr>> {
        let expr = parse_expression_source(source).unwrap();
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        let mut builder = MethodBuilder::new("test", params.len() as u16);
        lower_expr(&mut builder, &expr, Scope { params: &params, has_this })?;
        builder.emit(Instr::Return);
        Ok(builder.build()?.code)
    }

    #[test]
    fn test_projection_reads_through_parameter() {
        let code = lower("x.Id == x.Name", &["x"], false).unwrap();
        assert_eq!(
            code,
            vec![
                Instr::LoadArg(0),
                Instr::GetProperty("Id".into()),
                Instr::LoadArg(0),
                Instr::GetProperty("Name".into()),
                Instr::Binary(BinOp::Eq),
                Instr::Return,
            ]
        );
    }

    #[test]
    fn test_bare_names_read_this() {
        let code = lower("Name.Length", &[], true).unwrap();
        assert_eq!(
            code,
            vec![
                Instr::LoadThis,
                Instr::GetProperty("Name".into()),
                Instr::GetProperty("Length".into()),
                Instr::Return,
            ]
        );
    }

    #[test]
    fn test_and_short_circuits() {
        let code = lower("A && B", &[], true).unwrap();
        assert_eq!(code[2], Instr::JumpIfFalse(6));
        assert_eq!(code[5], Instr::Jump(7));
        assert_eq!(code[6], Instr::PushBool(false));
    }

    #[test]
    fn test_host_call() {
        let code = lower("string.IsNullOrEmpty(Name)", &[], true).unwrap();
        assert_eq!(
            code[2],
            Instr::CallHost {
                name: "string.IsNullOrEmpty".into(),
                argc: 1
            }
        );
    }

    #[test]
    fn test_static_function_cannot_read_this() {
        let err = lower("Id", &["x"], false).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedExpression { .. }));
    }

    #[test]
    fn test_lambda_is_rejected() {
        assert!(lower("this.To(static x => x.Id)", &[], true).is_err());
    }
}
