//! Operators and host helpers.
//!
//! The host surface is the handful of `string`/`Math` members getter bodies
//! reach for, plus the string instance members.

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::Value;
use rxweave_compiler::patch::{BinOp, UnOp};

/// Apply a unary operator.
pub fn unary(op: UnOp, value: Value) -> RuntimeResult<Value> {
    match (op, value) {
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (op, value) => Err(RuntimeError::TypeError(format!(
            "cannot apply {:?} to {}",
            op,
            value.type_name()
        ))),
    }
}

/// Apply a strict binary operator.
pub fn binary(op: BinOp, left: Value, right: Value) -> RuntimeResult<Value> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(left.equals(&right))),
        BinOp::Ne => return Ok(Value::Bool(!left.equals(&right))),
        BinOp::Add if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) => {
            return Ok(Value::Str(format!("{}{}", left, right)));
        }
        _ => {}
    }

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            float_op(op, as_float(&left), as_float(&right))
        }
        (Value::Str(a), Value::Str(b)) if is_comparison(op) => Ok(Value::Bool(compare(op, a.cmp(b)))),
        _ => Err(RuntimeError::TypeError(format!(
            "cannot apply '{}' to {} and {}",
            op.mnemonic(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> RuntimeResult<Value> {
    Ok(match op {
        BinOp::Add => Value::Int(a.wrapping_add(b)),
        BinOp::Sub => Value::Int(a.wrapping_sub(b)),
        BinOp::Mul => Value::Int(a.wrapping_mul(b)),
        BinOp::Div => {
            if b == 0 {
                return Err(RuntimeError::DivideByZero);
            }
            Value::Int(a.wrapping_div(b))
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(RuntimeError::DivideByZero);
            }
            Value::Int(a.wrapping_rem(b))
        }
        _ => Value::Bool(compare(op, a.cmp(&b))),
    })
}

fn float_op(op: BinOp, a: f64, b: f64) -> RuntimeResult<Value> {
    Ok(match op {
        BinOp::Add => Value::Float(a + b),
        BinOp::Sub => Value::Float(a - b),
        BinOp::Mul => Value::Float(a * b),
        BinOp::Div => Value::Float(a / b),
        BinOp::Mod => Value::Float(a % b),
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Ge => Value::Bool(a >= b),
        BinOp::Eq => Value::Bool(a == b),
        BinOp::Ne => Value::Bool(a != b),
    })
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

fn is_comparison(op: BinOp) -> bool {
    matches!(op, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
}

fn compare(op: BinOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinOp::Lt => ordering == Less,
        BinOp::Le => ordering != Greater,
        BinOp::Gt => ordering == Greater,
        BinOp::Ge => ordering != Less,
        BinOp::Eq => ordering == Equal,
        _ => ordering != Equal,
    }
}

/// Call a `string.*` or `Math.*` helper.
pub fn call_host(name: &str, args: &[Value]) -> RuntimeResult<Value> {
    match (name, args) {
        ("string.Empty", []) => Ok(Value::Str(String::new())),
        ("string.IsNullOrEmpty", [value]) => Ok(Value::Bool(match value {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            _ => false,
        })),
        ("string.IsNullOrWhiteSpace", [value]) => Ok(Value::Bool(match value {
            Value::Null => true,
            Value::Str(s) => s.trim().is_empty(),
            _ => false,
        })),
        ("string.Concat", parts) => Ok(Value::Str(parts.iter().map(|p| p.to_string()).collect())),
        ("Math.Max", [a, b]) => pick(a, b, BinOp::Ge),
        ("Math.Min", [a, b]) => pick(a, b, BinOp::Le),
        ("Math.Abs", [Value::Int(i)]) => Ok(Value::Int(i.wrapping_abs())),
        ("Math.Abs", [Value::Float(x)]) => Ok(Value::Float(x.abs())),
        _ => Err(RuntimeError::UnknownHost(format!("{}/{}", name, args.len()))),
    }
}

fn pick(a: &Value, b: &Value, keep_left: BinOp) -> RuntimeResult<Value> {
    match binary(keep_left, a.clone(), b.clone())? {
        Value::Bool(true) => Ok(a.clone()),
        _ => Ok(b.clone()),
    }
}

/// Read a property or call a method of a string.
pub fn string_member(text: &str, member: &str, args: &[Value]) -> RuntimeResult<Value> {
    let arg = |i: usize| -> RuntimeResult<&str> {
        match args.get(i) {
            Some(Value::Str(s)) => Ok(s.as_str()),
            other => Err(RuntimeError::TypeError(format!(
                "string.{} expects a string argument, got {}",
                member,
                other.map_or("nothing", |v| v.type_name())
            ))),
        }
    };

    match member {
        "Length" => Ok(Value::Int(text.chars().count() as i64)),
        "ToUpper" => Ok(Value::Str(text.to_uppercase())),
        "ToLower" => Ok(Value::Str(text.to_lowercase())),
        "Trim" => Ok(Value::Str(text.trim().to_string())),
        "Contains" => Ok(Value::Bool(text.contains(arg(0)?))),
        "StartsWith" => Ok(Value::Bool(text.starts_with(arg(0)?))),
        "EndsWith" => Ok(Value::Bool(text.ends_with(arg(0)?))),
        _ => Err(RuntimeError::UnknownMember {
            class: "string".to_string(),
            member: member.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_concatenation() {
        let v = binary(BinOp::Add, Value::from("n="), Value::Int(3)).unwrap();
        assert_eq!(v, Value::from("n=3"));
    }

    #[test]
    fn test_integer_division_by_zero() {
        assert!(matches!(
            binary(BinOp::Div, Value::Int(1), Value::Int(0)),
            Err(RuntimeError::DivideByZero)
        ));
        assert_eq!(
            binary(BinOp::Div, Value::Int(7), Value::Float(2.0)).unwrap(),
            Value::Float(3.5)
        );
    }

    #[test]
    fn test_host_helpers() {
        assert_eq!(call_host("string.IsNullOrEmpty", &[Value::Null]).unwrap(), Value::Bool(true));
        assert_eq!(call_host("Math.Max", &[Value::Int(2), Value::Int(5)]).unwrap(), Value::Int(5));
        assert!(matches!(call_host("Math.Pow", &[]), Err(RuntimeError::UnknownHost(_))));
    }

    #[test]
    fn test_string_members() {
        assert_eq!(string_member("héllo", "Length", &[]).unwrap(), Value::Int(5));
        assert_eq!(
            string_member("abc", "StartsWith", &[Value::from("ab")]).unwrap(),
            Value::Bool(true)
        );
    }
}
