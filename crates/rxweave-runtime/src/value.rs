//! Runtime values.

use std::fmt;

/// Handle to an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// Handle to a command object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub u32);

/// Handle to a locale registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocaleId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ObjectId),
    Command(CommandId),
    Locale(LocaleId),
}

impl Value {
    /// Zero value of a declared type.
    pub fn default_for(ty: &str) -> Value {
        if ty.ends_with('?') {
            return Value::Null;
        }
        match ty {
            "bool" | "Boolean" | "System.Boolean" => Value::Bool(false),
            "int" | "long" | "short" | "byte" | "sbyte" | "uint" | "ulong" | "ushort" | "Int32" | "Int64"
            | "System.Int32" | "System.Int64" => Value::Int(0),
            "double" | "float" | "decimal" | "Double" | "Single" | "System.Double" => Value::Float(0.0),
            _ => Value::Null,
        }
    }

    /// Value equality as the generated equality checks see it.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            _ => self == other,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Command(_) => "command",
            Value::Locale(_) => "locale",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

/// Text used for string concatenation.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Object(id) => write!(f, "object#{}", id.0),
            Value::Command(id) => write!(f, "command#{}", id.0),
            Value::Locale(id) => write!(f, "locale#{}", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(Value::default_for("bool"), Value::Bool(false));
        assert_eq!(Value::default_for("int"), Value::Int(0));
        assert_eq!(Value::default_for("int?"), Value::Null);
        assert_eq!(Value::default_for("string"), Value::Null);
    }

    #[test]
    fn test_numeric_equality() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert!(!Value::Str("2".into()).equals(&Value::Int(2)));
        assert!(Value::Null.equals(&Value::Null));
    }
}
