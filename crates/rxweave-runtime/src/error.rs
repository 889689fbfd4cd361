//! Runtime error types.

use rxweave_compiler::CompileError;

/// Errors raised while loading patch modules or executing generated code.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Patch module failed its integrity check
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Patch module does not fit the class image
    #[error("Cannot apply patch to '{class}': {reason}")]
    Patch { class: String, reason: String },

    /// Baseline lowering failed
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Unknown class '{0}'")]
    UnknownClass(String),

    #[error("'{class}' has no member '{member}'")]
    UnknownMember { class: String, member: String },

    /// Declared body with no instruction form and no patch replacing it
    #[error("'{method}' has no executable body: {reason}")]
    OpaqueBody { method: String, reason: String },

    #[error("Unknown host function '{0}'")]
    UnknownHost(String),

    #[error("Invalid object handle {0}")]
    InvalidObject(u32),

    #[error("Command {0} is disabled")]
    CommandDisabled(u32),

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Call depth limit exceeded")]
    StackOverflow,

    #[error("Division by zero")]
    DivideByZero,

    #[error("Type error: {0}")]
    TypeError(String),
}

/// Runtime result
pub type RuntimeResult<T> = Result<T, RuntimeError>;
