//! File pipeline against a temporary project directory

use rxweave_cli::pipeline::{read_patch, PATCH_EXTENSION};
use rxweave_cli::{discover_inputs, process_all, process_file, write_artifacts, Backend, Config, Mode};
use rxweave_syntax::ReactiveConventions;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ACCOUNT: &str = r#"
using ReactiveUI;
namespace Demo.Models;

public partial class Account : ReactiveObjectBase
{
    [Reactive] public string Id { get; set; } = "";
    [Reactive] public string Name { get; set; } = "";

    [Derived(CacheMode.EagerAtInit, "Id", "Name")]
    public bool Verified => this.To(static x => x.Id == x.Name);

    [Command(CanExecute = "Verified")]
    public void Submit();
}
"#;

const BROKEN: &str = r#"
public class Sealed : IReactiveObject
{
    [Reactive] public int X { get; set; }
}
"#;

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("models/nested")).unwrap();
    fs::write(dir.path().join("models/account.rxd"), ACCOUNT).unwrap();
    fs::write(dir.path().join("models/nested/sealed.rxd"), BROKEN).unwrap();
    fs::write(dir.path().join("models/notes.txt"), "not a declaration").unwrap();
    dir
}

fn pattern(dir: &Path, glob: &str) -> String {
    dir.join(glob).to_string_lossy().into_owned()
}

#[test]
fn test_discover_inputs_sorted() {
    let dir = project();
    let inputs = discover_inputs(&[pattern(dir.path(), "models/**/*.rxd")]).unwrap();
    let names: Vec<String> = inputs
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["account.rxd", "sealed.rxd"]);
}

#[test]
fn test_reports_keep_input_order() {
    let dir = project();
    let inputs = discover_inputs(&[pattern(dir.path(), "models/**/*.rxd")]).unwrap();
    let reports = process_all(&inputs, &ReactiveConventions::default(), Mode::Check, 4).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].path, inputs[0]);
    assert!(!reports[0].has_errors());
    assert!(reports[0].artifacts.is_empty());

    // Non-partial class: one class-level error, nothing generated
    assert_eq!(reports[1].errors, 1);
    let code = reports[1].diagnostics[0].code().map(|c| c.as_str().to_string());
    assert_eq!(code.as_deref(), Some("RX0001"));
}

#[test]
fn test_syntax_error_becomes_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.rxd");
    fs::write(&path, "partial class {").unwrap();
    let report = process_file(&path, &ReactiveConventions::default(), Mode::Check).unwrap();
    assert!(report.has_errors());
    let code = report.diagnostics[0].code().map(|c| c.as_str().to_string());
    assert_eq!(code.as_deref(), Some("RX0102"));
}

#[test]
fn test_generate_skips_unchanged_outputs() {
    let dir = project();
    let out = dir.path().join("generated");
    let input = dir.path().join("models/account.rxd");
    let report = process_file(&input, &ReactiveConventions::default(), Mode::Emit(Backend::Source)).unwrap();
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].file_name, "Demo.Models.Account.reactive.g.cs");

    let first = write_artifacts(&out, &report.artifacts, true).unwrap();
    assert_eq!((first.written, first.unchanged), (1, 0));
    let second = write_artifacts(&out, &report.artifacts, true).unwrap();
    assert_eq!((second.written, second.unchanged), (0, 1));
    let forced = write_artifacts(&out, &report.artifacts, false).unwrap();
    assert_eq!(forced.written, 1);

    let text = fs::read_to_string(out.join("Demo.Models.Account.reactive.g.cs")).unwrap();
    assert!(text.contains("public partial class Account"));
}

#[test]
fn test_patch_module_on_disk_is_intact() {
    let dir = project();
    let out = dir.path().join("patches");
    let input = dir.path().join("models/account.rxd");
    let report = process_file(&input, &ReactiveConventions::default(), Mode::Emit(Backend::Patch)).unwrap();
    let artifact = &report.artifacts[0];
    assert_eq!(artifact.file_name, format!("Demo.Models.Account.{}", PATCH_EXTENSION));
    assert!(artifact.listing.as_deref().unwrap().starts_with("; patch Account\n"));

    write_artifacts(&out, &report.artifacts, true).unwrap();
    let module = read_patch(&out.join(&artifact.file_name)).unwrap();
    assert!(module.is_intact());
    assert_eq!(module.class, "Account");
}

#[test]
fn test_custom_conventions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.rxd");
    fs::write(
        &path,
        "partial class Panel : ViewModel { [Reactive] int Width { get; set; } }",
    )
    .unwrap();
    let config = Config::from_str("[reactive]\nextensible_base = \"ViewModel\"\ninit_method = \"Setup\"\n").unwrap();

    let report = process_file(&path, &config.conventions(), Mode::Emit(Backend::Source)).unwrap();
    assert!(!report.has_errors());
    assert!(report.artifacts[0].contents.contains("protected override void Setup()"));

    let plain = process_file(&path, &ReactiveConventions::default(), Mode::Emit(Backend::Source)).unwrap();
    assert!(plain.artifacts.is_empty());
}

#[test]
fn test_unlowerable_class_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("a_good.rxd");
    let bad = dir.path().join("b_bad.rxd");
    fs::write(&good, ACCOUNT).unwrap();
    fs::write(
        &bad,
        r#"
        partial class Gauge : IReactiveObject
        {
            [Reactive] int X { get; set; }
            [Derived(CacheMode.EagerAtInit, "X")] int Y => Math;
        }
        partial class Dial : IReactiveObject { [Reactive] int Z { get; set; } }
        "#,
    )
    .unwrap();

    let inputs = vec![good, bad];
    let reports = process_all(&inputs, &ReactiveConventions::default(), Mode::Emit(Backend::Patch), 2).unwrap();
    assert_eq!(reports.len(), 2);

    assert!(!reports[0].has_errors());
    assert_eq!(reports[0].artifacts.len(), 1);
    assert_eq!(reports[0].artifacts[0].class, "Demo.Models.Account");

    // Gauge fails to lower; Dial in the same file is still generated
    assert_eq!(reports[1].errors, 1);
    let diagnostic = reports[1].diagnostics.last().unwrap();
    assert_eq!(diagnostic.code().map(|c| c.as_str()), Some("RX0103"));
    assert!(diagnostic.message().contains("Gauge"));
    let classes: Vec<_> = reports[1].artifacts.iter().map(|a| a.class.as_str()).collect();
    assert_eq!(classes, ["Dial"]);
}
