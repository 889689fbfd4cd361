//! Emission errors

use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Unsupported expression in '{member}': {reason}")]
    UnsupportedExpression { member: String, reason: String },

    #[error("Statement emitted outside of a method: {statement}")]
    StatementOutsideMethod { statement: String },

    #[error("Jump to unbound label {label}")]
    UnboundLabel { label: usize },

    #[error("Formatting failed: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Internal compiler error: {message}")]
    InternalError { message: String },
}
