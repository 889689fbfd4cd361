//! Collects findings produced while analyzing a declaration set.

use crate::diagnostic::{create_files, Diagnostic};
use crate::error::CheckError;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::termcolor::WriteColor;

/// Accumulates analysis findings in the order they were found.
#[derive(Debug, Clone, Default)]
pub struct ValidationReporter {
    errors: Vec<CheckError>,
}

impl ValidationReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding.
    pub fn report(&mut self, error: CheckError) {
        if error.is_warning() {
            tracing::debug!(span = ?error.span(), "{}", error);
        } else {
            tracing::debug!(span = ?error.span(), error = %error, "analysis error");
        }
        self.errors.push(error);
    }

    /// Findings recorded so far.
    pub fn errors(&self) -> &[CheckError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<CheckError> {
        self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any finding is an error rather than a warning.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| !e.is_warning())
    }

    /// `(errors, warnings)`
    pub fn counts(&self) -> (usize, usize) {
        let warnings = self.errors.iter().filter(|e| e.is_warning()).count();
        (self.errors.len() - warnings, warnings)
    }

    /// Append findings from another reporter.
    pub fn extend(&mut self, other: ValidationReporter) {
        self.errors.extend(other.errors);
    }

    /// Rendered diagnostics, in report order.
    pub fn diagnostics(&self, file_id: usize) -> Vec<Diagnostic> {
        self.errors
            .iter()
            .map(|e| Diagnostic::from_check_error(e, file_id))
            .collect()
    }

    /// Render every finding against `source`.
    pub fn emit(&self, writer: &mut dyn WriteColor, path: &str, source: &str) -> Result<(), codespan_reporting::files::Error> {
        let files: SimpleFiles<String, String> = create_files(path, source);
        for diagnostic in self.diagnostics(0) {
            diagnostic.emit_to(writer, &files)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codespan_reporting::term::termcolor::NoColor;
    use rxweave_syntax::Span;

    #[test]
    fn test_counts_split_warnings() {
        let mut reporter = ValidationReporter::new();
        reporter.report(CheckError::NotExtensible {
            class: "A".into(),
            span: Span::new(0, 1, 1, 1),
        });
        reporter.report(CheckError::IgnoredInitialNotification {
            property: "B".into(),
            span: Span::new(0, 1, 1, 1),
        });
        assert_eq!(reporter.counts(), (1, 1));
        assert!(reporter.has_errors());
    }

    #[test]
    fn test_emit_plain_text() {
        let mut reporter = ValidationReporter::new();
        reporter.report(CheckError::NotExtensible {
            class: "A".into(),
            span: Span::new(6, 7, 1, 7),
        });
        let mut out = NoColor::new(Vec::new());
        reporter.emit(&mut out, "a.rxd", "class A : IReactiveObject {}").unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("error[RX0001]"));
        assert!(text.contains("a.rxd:1:7"));
    }
}
