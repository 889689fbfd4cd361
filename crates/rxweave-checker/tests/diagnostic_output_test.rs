//! Integration tests for diagnostic output
//!
//! Runs the analyzer over real declarations and renders what it finds.

use codespan_reporting::term::termcolor::NoColor;
use rxweave_checker::{create_files, Analyzer, Diagnostic, JsonDiagnostic};
use rxweave_syntax::DeclarationSet;

fn render(source: &str) -> String {
    let set = DeclarationSet::parse("models.rxd", source).unwrap();
    let analysis = Analyzer::new().analyze(&set);
    let mut out = NoColor::new(Vec::new());
    analysis.reporter.emit(&mut out, "models.rxd", source).unwrap();
    String::from_utf8(out.into_inner()).unwrap()
}

#[test]
fn test_not_extensible_diagnostic() {
    let source = "public class Account : IReactiveObject\n{\n    [Reactive] public string Id { get; set; }\n}\n";
    let text = render(source);
    assert!(text.contains("error[RX0001]"), "{}", text);
    assert!(text.contains("models.rxd:1:14"), "{}", text);
    assert!(text.contains("partial class Account"), "{}", text);
}

#[test]
fn test_missing_setter_diagnostic() {
    let source = "partial class A : IReactiveObject\n{\n    [Reactive] public int Count { get; }\n}\n";
    let text = render(source);
    assert!(text.contains("error[RX0003]"), "{}", text);
    assert!(text.contains("models.rxd:3:27"), "{}", text);
}

#[test]
fn test_duplicate_annotation_is_a_warning() {
    let source = "partial class A : IReactiveObject\n{\n    [Reactive] [Reactive] public int Count { get; set; }\n}\n";
    let text = render(source);
    assert!(text.contains("warning[RX0012]"), "{}", text);
    assert!(text.contains("first occurrence here"), "{}", text);
}

#[test]
fn test_cycle_diagnostic_json() {
    let source = r#"partial class A : IReactiveObject
{
    [Derived("B")] public int A1 => B;
    [Derived("A1")] public int B => A1;
}
"#;
    let set = DeclarationSet::parse("models.rxd", source).unwrap();
    let analysis = Analyzer::new().analyze(&set);
    let files = create_files("models.rxd", source);

    let diagnostic = Diagnostic::from_check_error(&analysis.errors()[0], 0);
    let json = diagnostic.to_json(&files).unwrap();
    let parsed: JsonDiagnostic = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.code.as_deref(), Some("RX0006"));
    assert_eq!(parsed.severity, "error");
    assert_eq!(parsed.labels.len(), 2);
    assert_eq!(parsed.labels[0].style, "primary");
    assert_eq!(parsed.labels[0].start_line, 3);
    assert_eq!(parsed.labels[1].start_line, 4);
}
