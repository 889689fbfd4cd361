//! Metadata extraction: raw attributes to normalized annotation records.

use crate::error::CheckError;
use crate::reporter::ValidationReporter;
use crate::shapes::{AnnotationKind, ShapeRegistry};
use rxweave_syntax::ast::{AttrArg, AttrValue, Attribute, MemberDecl};
use rxweave_syntax::Span;

/// A normalized annotation occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    /// Annotation kind
    pub kind: AnnotationKind,
    /// Member the annotation is attached to
    pub target: String,
    /// Positional arguments bound to parameter names, in order
    pub positional: Vec<(String, AttrValue)>,
    /// Named arguments in source order
    pub named: Vec<(String, AttrValue)>,
    /// Location of the attribute
    pub span: Span,
}

impl AnnotationRecord {
    /// Argument value by parameter name; named arguments win.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.positional.iter().find(|(n, _)| n == name))
            .map(|(_, v)| v)
    }

    /// Boolean argument, or `default` when absent.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(AttrValue::Bool(b)) => *b,
            _ => default,
        }
    }

    /// Non-empty string argument.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(AttrValue::Str(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// String list argument (a variadic, or a single string).
    pub fn get_strings(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(AttrValue::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    AttrValue::Str(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            Some(AttrValue::Str(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Enum variant name of an `Enum.Variant` argument.
    pub fn get_variant(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(AttrValue::Path(path)) => path.last().map(String::as_str),
            _ => None,
        }
    }
}

/// Reads annotation records off class members.
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor {
    shapes: ShapeRegistry,
}

impl MetadataExtractor {
    /// Extractor using the built-in annotation shapes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor using a custom shape registry.
    pub fn with_shapes(shapes: ShapeRegistry) -> Self {
        Self { shapes }
    }

    /// Records for one member.
    ///
    /// Repeated kinds keep the first occurrence. If any recognized annotation
    /// cannot be bound to a constructor, the member gets no records at all.
    pub fn extract_member(&self, member: &MemberDecl, reporter: &mut ValidationReporter) -> Vec<AnnotationRecord> {
        let mut seen: Vec<(AnnotationKind, Span)> = Vec::new();
        let mut records = Vec::new();

        for attribute in &member.attributes {
            let Some(shape) = self.shapes.lookup(&attribute.name) else {
                continue;
            };

            if let Some((_, first)) = seen.iter().find(|(kind, _)| *kind == shape.kind) {
                tracing::debug!(member = %member.name, annotation = %shape.kind, "duplicate annotation ignored");
                reporter.report(CheckError::DuplicateAnnotation {
                    annotation: shape.kind.to_string(),
                    member: member.name.clone(),
                    span: attribute.span,
                    first: *first,
                });
                continue;
            }
            seen.push((shape.kind, attribute.span));

            match self.bind(attribute, member, reporter) {
                Some(record) => records.push(record),
                None => return Vec::new(),
            }
        }

        records
    }

    /// Records for every member, parallel to `members`.
    pub fn extract_all(&self, members: &[MemberDecl], reporter: &mut ValidationReporter) -> Vec<Vec<AnnotationRecord>> {
        members.iter().map(|m| self.extract_member(m, reporter)).collect()
    }

    fn bind(&self, attribute: &Attribute, member: &MemberDecl, reporter: &mut ValidationReporter) -> Option<AnnotationRecord> {
        let shape = self.shapes.lookup(&attribute.name)?;

        let mut positional_values = Vec::new();
        let mut named = Vec::new();
        for arg in &attribute.args {
            match arg {
                AttrArg::Positional { value, span } => {
                    if !named.is_empty() {
                        reporter.report(invalid_args(attribute, member, "positional argument after named argument", *span));
                        return None;
                    }
                    positional_values.push(value.clone());
                }
                AttrArg::Named { name, value, span } => {
                    let Some(param) = shape.named_param(name) else {
                        reporter.report(invalid_args(
                            attribute,
                            member,
                            &format!("unknown named argument '{}'", name),
                            *span,
                        ));
                        return None;
                    };
                    if !param.ty.accepts(value) {
                        reporter.report(invalid_args(
                            attribute,
                            member,
                            &format!("'{}' expects {}, found {}", name, param.ty, value),
                            *span,
                        ));
                        return None;
                    }
                    named.push((name.clone(), value.clone()));
                }
            }
        }

        if let Some(max) = shape.max_positional() {
            if positional_values.len() > max {
                reporter.report(invalid_args(
                    attribute,
                    member,
                    &format!("expected at most {} positional argument(s), found {}", max, positional_values.len()),
                    attribute.span,
                ));
                return None;
            }
        }

        let Some(positional) = shape.bind_positional(&positional_values) else {
            tracing::debug!(member = %member.name, annotation = %shape.kind, "no matching annotation constructor");
            reporter.report(CheckError::UnresolvedAnnotation {
                annotation: shape.kind.to_string(),
                member: member.name.clone(),
                span: attribute.span,
            });
            return None;
        };

        Some(AnnotationRecord {
            kind: shape.kind,
            target: member.name.clone(),
            positional,
            named,
            span: attribute.span,
        })
    }
}

fn invalid_args(attribute: &Attribute, member: &MemberDecl, reason: &str, span: Span) -> CheckError {
    CheckError::InvalidAnnotationArguments {
        annotation: attribute.name.clone(),
        member: member.name.clone(),
        reason: reason.to_string(),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxweave_syntax::parse_source;

    fn extract(member_source: &str) -> (Vec<AnnotationRecord>, ValidationReporter) {
        let file = parse_source(&format!("partial class A {{ {} }}", member_source)).unwrap();
        let mut reporter = ValidationReporter::new();
        let records = MetadataExtractor::new().extract_member(&file.classes[0].members[0], &mut reporter);
        (records, reporter)
    }

    #[test]
    fn test_extract_positional_and_named() {
        let (records, reporter) =
            extract("[Derived(CacheMode.Disabled, \"A\", \"B\", NotifyOnInitialValue = true)] int X => A + B;");
        assert!(reporter.is_empty());
        let record = &records[0];
        assert_eq!(record.kind, AnnotationKind::Derived);
        assert_eq!(record.target, "X");
        assert_eq!(record.get_variant("CacheMode"), Some("Disabled"));
        assert_eq!(record.get_strings("Sources"), vec!["A", "B"]);
        assert!(record.get_bool("NotifyOnInitialValue", false));
    }

    #[test]
    fn test_named_argument_wins_over_positional() {
        let (records, _) = extract("[Derived(CacheMode.Disabled, \"A\", CacheMode = CacheMode.LazyOnFirstAccess)] int X => A;");
        assert_eq!(records[0].get_variant("CacheMode"), Some("LazyOnFirstAccess"));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let (records, reporter) = extract("[Reactive(false)] [Reactive(true)] int X { get; set; }");
        assert_eq!(records.len(), 1);
        assert!(!records[0].get_bool("Check", true));
        assert!(matches!(reporter.errors()[0], CheckError::DuplicateAnnotation { .. }));
    }

    #[test]
    fn test_unresolved_constructor_clears_member() {
        let (records, reporter) = extract("[Command] [Derived(42)] int X => 1;");
        assert!(records.is_empty());
        assert!(matches!(reporter.errors()[0], CheckError::UnresolvedAnnotation { .. }));
    }

    #[test]
    fn test_too_many_positional_arguments() {
        let (records, reporter) = extract("[Reactive(true, false)] int X { get; set; }");
        assert!(records.is_empty());
        assert!(matches!(reporter.errors()[0], CheckError::InvalidAnnotationArguments { .. }));
    }

    #[test]
    fn test_unknown_named_argument() {
        let (records, reporter) = extract("[Command(Enabled = \"X\")] void Run();");
        assert!(records.is_empty());
        assert!(matches!(&reporter.errors()[0], CheckError::InvalidAnnotationArguments { reason, .. } if reason.contains("Enabled")));
    }

    #[test]
    fn test_foreign_attributes_are_ignored() {
        let (records, reporter) = extract("[Obsolete(\"old\")] [Reactive] int X { get; set; }");
        assert_eq!(records.len(), 1);
        assert!(reporter.is_empty());
    }
}
