//! Analysis findings.
//!
//! Every variant is recoverable: the analyzer records it, skips or degrades
//! the offending member, and keeps going. [`crate::diagnostic`] renders
//! them.

use rxweave_syntax::Span;
use thiserror::Error;

/// Why a command's enablement binding was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnablementIssue {
    /// No property has that name
    Unresolved,
    /// The property is not `bool`
    NotBoolean,
    /// The property never raises change notifications
    NotObservable,
}

/// An analysis finding attached to a source location.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CheckError {
    #[error("Class '{class}' is not partial and cannot receive generated members")]
    NotExtensible { class: String, span: Span },

    #[error("Generated member '{name}' duplicates an existing member")]
    DuplicateTarget { name: String, span: Span, original: Span },

    #[error("Property '{property}' marked [{annotation}] has no setter")]
    MissingSetter {
        property: String,
        annotation: String,
        span: Span,
    },

    #[error("Derived property '{property}' must not declare a setter")]
    DerivedHasSetter {
        property: String,
        span: Span,
        setter_span: Span,
    },

    #[error("'{name}' named by '{property}' is not a property of this class")]
    UnknownSource {
        property: String,
        name: String,
        span: Span,
    },

    #[error("Derived properties form a cycle: {}", .members.join(" -> "))]
    DerivedCycle {
        members: Vec<String>,
        span: Span,
        related: Vec<Span>,
    },

    #[error("Command '{command}' cannot bind enablement to '{property}'")]
    InvalidEnablement {
        command: String,
        property: String,
        issue: EnablementIssue,
        span: Span,
    },

    #[error("Command method '{method}' takes {count} parameters; at most one is supported")]
    TooManyCommandParameters { method: String, count: usize, span: Span },

    #[error("Localized property '{property}' must not declare a setter")]
    LocaleHasSetter { property: String, span: Span },

    #[error("Locale key '{key}' for '{property}' is not a property of this class")]
    UnknownLocaleKey { property: String, key: String, span: Span },

    #[error("Invalid arguments to [{annotation}] on '{member}': {reason}")]
    InvalidAnnotationArguments {
        annotation: String,
        member: String,
        reason: String,
        span: Span,
    },

    #[error("Duplicate [{annotation}] on '{member}' is ignored")]
    DuplicateAnnotation {
        annotation: String,
        member: String,
        span: Span,
        first: Span,
    },

    #[error("Unsupported body for '{member}': {reason}")]
    UnsupportedBody { member: String, reason: String, span: Span },

    #[error("Derived property '{property}' reads '{read}', which is not one of its sources")]
    UndeclaredRead { property: String, read: String, span: Span },

    #[error("NotifyOnInitialValue has no effect on lazily cached '{property}'")]
    IgnoredInitialNotification { property: String, span: Span },

    #[error("Generated field '{slot}' for '{property}' collides with an existing member")]
    SlotCollision {
        property: String,
        slot: String,
        span: Span,
        existing: Span,
    },

    #[error("No constructor of [{annotation}] accepts these arguments on '{member}'; its annotations are ignored")]
    UnresolvedAnnotation {
        annotation: String,
        member: String,
        span: Span,
    },

    #[error("Cached derived property '{property}' needs an expression-bodied getter")]
    MissingGetterExpression { property: String, span: Span },
}

impl CheckError {
    /// Primary location of the finding.
    pub fn span(&self) -> Span {
        use CheckError::*;

        match self {
            NotExtensible { span, .. }
            | DuplicateTarget { span, .. }
            | MissingSetter { span, .. }
            | DerivedHasSetter { span, .. }
            | UnknownSource { span, .. }
            | DerivedCycle { span, .. }
            | InvalidEnablement { span, .. }
            | TooManyCommandParameters { span, .. }
            | LocaleHasSetter { span, .. }
            | UnknownLocaleKey { span, .. }
            | InvalidAnnotationArguments { span, .. }
            | DuplicateAnnotation { span, .. }
            | UnsupportedBody { span, .. }
            | UndeclaredRead { span, .. }
            | IgnoredInitialNotification { span, .. }
            | SlotCollision { span, .. }
            | UnresolvedAnnotation { span, .. }
            | MissingGetterExpression { span, .. } => *span,
        }
    }

    /// Whether this finding is only a warning.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            CheckError::DuplicateAnnotation { .. }
                | CheckError::UndeclaredRead { .. }
                | CheckError::IgnoredInitialNotification { .. }
                | CheckError::UnresolvedAnnotation { .. }
        )
    }
}
