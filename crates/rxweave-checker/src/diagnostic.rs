//! Diagnostic rendering for analysis findings
//!
//! Findings are turned into codespan-reporting diagnostics so they print with
//! source context. [`JsonDiagnostic`] is the machine-readable form used by
//! `--format json`.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, LabelStyle, Severity};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term::{self, termcolor::WriteColor};
use rxweave_syntax::{Span, SyntaxError};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;

use crate::error::{CheckError, EnablementIssue};

/// Stable `RXnnnn` identifier of a finding kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        self.0
    }
}

/// One rendered finding: message, code and labelled source ranges
pub struct Diagnostic {
    inner: CsDiagnostic<usize>,
    code: Option<ErrorCode>,
}

fn range(span: Span) -> Range<usize> {
    span.start..span.end
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            inner: CsDiagnostic::new(severity).with_message(message),
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_code(self, code: ErrorCode) -> Self {
        Self {
            inner: self.inner.with_code(code.0),
            code: Some(code),
        }
    }

    /// Label the location the finding is about.
    pub fn with_primary_label(mut self, file_id: usize, span: Span, message: impl Into<String>) -> Self {
        self.inner.labels.push(Label::primary(file_id, range(span)).with_message(message));
        self
    }

    /// Label a location that explains the finding.
    pub fn with_secondary_label(mut self, file_id: usize, span: Span, message: impl Into<String>) -> Self {
        self.inner.labels.push(Label::secondary(file_id, range(span)).with_message(message));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.inner.notes.push(note.into());
        self
    }

    /// Notes prefixed with `help:` render as suggestions.
    pub fn with_help(self, help: impl Into<String>) -> Self {
        let text = format!("help: {}", help.into());
        self.with_note(text)
    }

    pub fn severity(&self) -> Severity {
        self.inner.severity
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    pub fn labels(&self) -> &[Label<usize>] {
        &self.inner.labels
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Render an analysis finding, attaching labels specific to its kind.
    pub fn from_check_error(error: &CheckError, file_id: usize) -> Self {
        use CheckError::*;

        let severity = if error.is_warning() { Severity::Warning } else { Severity::Error };
        let diag = Self::new(severity, error.to_string()).with_code(error_code(error));
        let at = |diag: Self, span: &Span, text: &str| diag.with_primary_label(file_id, *span, text.to_string());

        match error {
            NotExtensible { class, span } => {
                at(diag, span, "class is not partial").with_help(format!("declare it as 'partial class {}'", class))
            }
            DuplicateTarget { span, original, .. } => {
                at(diag, span, "would be generated here").with_secondary_label(file_id, *original, "already declared here")
            }
            MissingSetter { span, .. } => at(diag, span, "no setter").with_help("add '{ get; set; }' accessors"),
            DerivedHasSetter { span, setter_span, .. } => at(diag, span, "derived property")
                .with_secondary_label(file_id, *setter_span, "setter declared here")
                .with_note("derived values are recomputed from their sources"),
            UnknownSource { span, name, .. } => at(diag, span, &format!("'{}' not found", name)),
            DerivedCycle { members, span, related } => members
                .iter()
                .skip(1)
                .zip(related)
                .fold(at(diag, span, "cycle starts here"), |d, (member, other)| {
                    d.with_secondary_label(file_id, *other, format!("'{}' is part of the cycle", member))
                })
                .with_note("none of these properties will be generated"),
            InvalidEnablement { issue, property, span, .. } => {
                let why = match issue {
                    EnablementIssue::Unresolved => "not found",
                    EnablementIssue::NotBoolean => "is not bool",
                    EnablementIssue::NotObservable => "never raises change notifications",
                };
                at(diag, span, &format!("'{}' {}", property, why)).with_note("the command is generated as always enabled")
            }
            TooManyCommandParameters { span, .. } => {
                at(diag, span, "too many parameters").with_help("wrap the arguments in a single parameter object")
            }
            LocaleHasSetter { span, .. } => at(diag, span, "setter not allowed"),
            UnknownLocaleKey { span, key, .. } => at(diag, span, &format!("'{}' not found", key)),
            InvalidAnnotationArguments { span, .. } => at(diag, span, "invalid argument"),
            DuplicateAnnotation { span, first, .. } => {
                at(diag, span, "ignored").with_secondary_label(file_id, *first, "first occurrence here")
            }
            UnsupportedBody { span, .. } => at(diag, span, "unsupported"),
            UndeclaredRead { span, read, .. } => {
                at(diag, span, "read here").with_help(format!("add \"{}\" to the annotation's sources", read))
            }
            IgnoredInitialNotification { span, .. } => at(diag, span, "has no effect"),
            SlotCollision { span, existing, slot, .. } => at(diag, span, &format!("needs field '{}'", slot))
                .with_secondary_label(file_id, *existing, "existing member"),
            UnresolvedAnnotation { span, .. } => at(diag, span, "no matching constructor"),
            MissingGetterExpression { span, .. } => at(diag, span, "no getter expression")
                .with_help("use 'CacheMode.Disabled' or give the getter an expression body"),
        }
    }

    /// Diagnostics for a declaration file that failed to parse
    pub fn from_syntax_error(error: &SyntaxError, file_id: usize) -> Vec<Self> {
        let code = match error {
            SyntaxError::Lex(_) => ErrorCode("RX0101"),
            SyntaxError::Parse(_) => ErrorCode("RX0102"),
        };
        error
            .locations()
            .into_iter()
            .map(|(span, message)| {
                Diagnostic::error(message)
                    .with_code(code)
                    .with_primary_label(file_id, span, "here")
            })
            .collect()
    }

    /// A class that analyzed cleanly but whose output could not be generated.
    pub fn from_emit_failure(class: &str, reason: &str, span: Span, file_id: usize) -> Self {
        Diagnostic::error(format!("cannot generate code for '{}': {}", class, reason))
            .with_code(ErrorCode("RX0103"))
            .with_primary_label(file_id, span, "declared here")
    }

    /// Render with source context.
    pub fn emit_to(&self, writer: &mut dyn WriteColor, files: &SimpleFiles<String, String>) -> Result<(), codespan_reporting::files::Error> {
        term::emit(writer, &term::Config::default(), files, &self.inner)
    }

    pub fn to_json(&self, files: &SimpleFiles<String, String>) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&JsonDiagnostic::new(self, files))
    }
}

/// Serialized diagnostic
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDiagnostic {
    /// `RXnnnn`, absent for uncoded messages
    pub code: Option<String>,
    /// `error`, `warning`, ...
    pub severity: String,
    pub message: String,
    pub labels: Vec<JsonLabel>,
    /// Notes, including `help:` suggestions
    pub notes: Vec<String>,
}

/// Serialized label with 1-indexed positions
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLabel {
    pub file: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: Option<String>,
    /// `primary` or `secondary`
    pub style: String,
}

impl JsonLabel {
    /// `None` when the label points outside the known files.
    fn resolve(label: &Label<usize>, files: &SimpleFiles<String, String>) -> Option<Self> {
        let file = files.get(label.file_id).ok()?;
        let from = file.location((), label.range.start).ok()?;
        let to = file.location((), label.range.end).ok()?;
        let style = if label.style == LabelStyle::Primary { "primary" } else { "secondary" };
        Some(Self {
            file: file.name().clone(),
            start_line: from.line_number,
            start_column: from.column_number,
            end_line: to.line_number,
            end_column: to.column_number,
            message: Some(label.message.clone()).filter(|m| !m.is_empty()),
            style: style.to_owned(),
        })
    }
}

impl JsonDiagnostic {
    pub fn new(diag: &Diagnostic, files: &SimpleFiles<String, String>) -> Self {
        let severity = match diag.severity() {
            Severity::Bug => "bug",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
        };
        Self {
            code: diag.code().map(|c| c.as_str().to_owned()),
            severity: severity.to_owned(),
            message: diag.message().to_owned(),
            labels: diag.labels().iter().filter_map(|l| JsonLabel::resolve(l, files)).collect(),
            notes: diag.inner.notes.clone(),
        }
    }
}

/// Code identifying the kind of an analysis finding.
pub fn error_code(error: &CheckError) -> ErrorCode {
    use CheckError::*;

    ErrorCode(match error {
        NotExtensible { .. } => "RX0001",
        DuplicateTarget { .. } => "RX0002",
        MissingSetter { .. } => "RX0003",
        DerivedHasSetter { .. } => "RX0004",
        UnknownSource { .. } => "RX0005",
        DerivedCycle { .. } => "RX0006",
        InvalidEnablement { .. } => "RX0007",
        TooManyCommandParameters { .. } => "RX0008",
        LocaleHasSetter { .. } => "RX0009",
        UnknownLocaleKey { .. } => "RX0010",
        InvalidAnnotationArguments { .. } => "RX0011",
        DuplicateAnnotation { .. } => "RX0012",
        UnsupportedBody { .. } => "RX0013",
        UndeclaredRead { .. } => "RX0014",
        IgnoredInitialNotification { .. } => "RX0015",
        SlotCollision { .. } => "RX0016",
        UnresolvedAnnotation { .. } => "RX0017",
        MissingGetterExpression { .. } => "RX0018",
    })
}

/// Single-file database for rendering one declaration file (file id 0).
pub fn create_files(path: impl Into<PathBuf>, source: impl Into<String>) -> SimpleFiles<String, String> {
    let mut files = SimpleFiles::new();
    files.add(path.into().display().to_string(), source.into());
    files
}
