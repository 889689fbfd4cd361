//! Integration tests for class analysis

use rxweave_checker::model::{DerivedOrigin, PropertyRole};
use rxweave_checker::{Analysis, Analyzer, CachePolicy, CheckError, EnablementIssue, Recompute};
use rxweave_syntax::DeclarationSet;

fn analyze(source: &str) -> Analysis {
    let set = DeclarationSet::parse("test.rxd", source).expect("declarations parse");
    Analyzer::new().analyze(&set)
}

const ACCOUNT: &str = r#"
namespace Demo.Models;

public partial class Account : ReactiveObjectBase
{
    [Reactive] public string Id { get; set; } = "";
    [Reactive] public string Name { get; set; } = "";

    [Derived(CacheMode.EagerAtInit, "Id", "Name")]
    public bool Verified => this.To(static x => x.Id == x.Name);

    [Derived(CacheMode.Disabled, "Name")]
    public int NameLength => Name.Length;

    [Command(CanExecute = "Verified")]
    public void Submit();
}
"#;

#[test]
fn test_account_model() {
    let analysis = analyze(ACCOUNT);
    assert!(analysis.errors().is_empty(), "{:?}", analysis.errors());
    let model = &analysis.models[0];

    assert_eq!(model.full_name(), "Demo.Models.Account");
    assert!(model.is_extensible_base);
    assert_eq!(model.mutable_properties.len(), 2);
    assert_eq!(model.mutable_properties[0].slot, "_id");

    let verified = &model.derived[0];
    assert_eq!(verified.name, "Verified");
    assert_eq!(verified.cache, CachePolicy::EagerAtInit);
    assert_eq!(verified.slot.as_ref().map(|s| s.value.as_str()), Some("_verified"));
    assert!(matches!(verified.recompute, Some(Recompute::Static(_))));
    assert_eq!(model.statics.iter().next().map(|f| f.name.as_str()), Some("_verifiedProjection"));

    let length = &model.derived[1];
    assert_eq!(length.cache, CachePolicy::Disabled);
    assert!(length.slot.is_none());

    let command = &model.commands[0];
    assert_eq!(command.property_name, "SubmitCommand");
    assert_eq!(command.enablement.as_ref().map(|e| e.name.as_str()), Some("Verified"));
}

#[test]
fn test_shared_source_has_one_group() {
    let analysis = analyze(ACCOUNT);
    let model = &analysis.models[0];
    let name = model.members.resolve("Name").unwrap();
    let id = model.members.resolve("Id").unwrap();

    assert_eq!(model.graph.dependents(name).len(), 2);
    assert_eq!(model.graph.dependents(id).len(), 1);
    // Groups are keyed in first-seen source order
    let sources: Vec<_> = model.graph.groups().iter().map(|g| g.source).collect();
    assert_eq!(sources, vec![id, name]);
}

#[test]
fn test_derived_with_setter_is_rejected() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [Derived("X")] int Y { get; set; }
        }"#,
    );
    assert!(analysis.models[0].derived.is_empty());
    assert!(matches!(analysis.errors()[0], CheckError::DerivedHasSetter { .. }));
}

#[test]
fn test_unknown_source_drops_edge() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [Derived("X", "Missing")] int Y => X;
        }"#,
    );
    let model = &analysis.models[0];
    assert_eq!(model.derived[0].sources.len(), 1);
    assert!(matches!(&analysis.errors()[0], CheckError::UnknownSource { name, .. } if name == "Missing"));
}

#[test]
fn test_cycle_is_diagnosed_and_rejected() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [Derived("B", "X")] int A1 => B + X;
            [Derived("A1")] int B => A1 + 1;
            [Derived("X")] int C => X * 2;
        }"#,
    );
    let model = &analysis.models[0];
    let names: Vec<&str> = model.derived.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["C"]);

    let cycles: Vec<_> = analysis
        .errors()
        .iter()
        .filter_map(|e| match e {
            CheckError::DerivedCycle { members, .. } => Some(members.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(cycles, vec![vec!["A1".to_string(), "B".to_string(), "A1".to_string()]]);
    assert_eq!(model.members.get(model.members.resolve("B").unwrap()).role, PropertyRole::Plain);
}

#[test]
fn test_self_reference_is_a_cycle() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Derived("Y")] int Y => 1;
        }"#,
    );
    assert!(analysis.models[0].derived.is_empty());
    assert!(matches!(analysis.errors()[0], CheckError::DerivedCycle { .. }));
}

#[test]
fn test_undeclared_read_warns() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [Reactive] int Z { get; set; }
            [Derived("X")] int Y => X + Z;
        }"#,
    );
    assert_eq!(analysis.models[0].derived.len(), 1);
    assert!(!analysis.has_errors());
    assert!(matches!(&analysis.errors()[0], CheckError::UndeclaredRead { read, .. } if read == "Z"));
}

#[test]
fn test_lazy_ignores_initial_notification() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [Derived(CacheMode.LazyOnFirstAccess, "X", NotifyOnInitialValue = true)] int Y => X;
        }"#,
    );
    let derived = &analysis.models[0].derived[0];
    assert!(!derived.notify_on_initial_value);
    assert_eq!(derived.slot.as_ref().and_then(|s| s.flag.as_deref()), Some("_yInitialized"));
    assert!(matches!(analysis.errors()[0], CheckError::IgnoredInitialNotification { .. }));
}

#[test]
fn test_cached_auto_getter_needs_expression() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [Derived("X")] int Y { get; }
        }"#,
    );
    assert!(analysis.models[0].derived.is_empty());
    assert!(matches!(analysis.errors()[0], CheckError::MissingGetterExpression { .. }));
}

#[test]
fn test_notify_for_creates_announce_edge() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [NotifyFor("Label")]
            [Reactive] int Count { get; set; }
            string Label { get; }
        }"#,
    );
    let model = &analysis.models[0];
    let label = &model.derived[0];
    assert_eq!(label.name, "Label");
    assert_eq!(label.cache, CachePolicy::Disabled);
    assert!(label.recompute.is_none());
    assert_eq!(label.sources, vec![model.members.resolve("Count").unwrap()]);
}

#[test]
fn test_notify_for_merges_into_existing_derived() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [NotifyFor("Y")]
            [Reactive] int W { get; set; }
            [Derived("X")] int Y => X + W;
        }"#,
    );
    let model = &analysis.models[0];
    assert_eq!(model.derived.len(), 1);
    assert_eq!(model.derived[0].sources.len(), 2);
    assert_eq!(model.derived[0].slot.as_ref().map(|s| s.value.as_str()), Some("_y"));
}

#[test]
fn test_method_derived_value() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [Derived("X", Property = "Doubled")] int ComputeDoubled() => X * 2;
        }"#,
    );
    let model = &analysis.models[0];
    let derived = &model.derived[0];
    assert_eq!(derived.name, "Doubled");
    assert_eq!(
        derived.origin,
        DerivedOrigin::Method {
            method: "ComputeDoubled".to_string()
        }
    );
    assert!(model.members.get(derived.property).synthesized);
}

#[test]
fn test_method_derived_name_collision() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] int X { get; set; }
            [Derived("X", Property = "X")] int ComputeX() => X;
        }"#,
    );
    assert!(analysis.models[0].derived.is_empty());
    assert!(matches!(analysis.errors()[0], CheckError::DuplicateTarget { .. }));
}

#[test]
fn test_slot_collision() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            int _x { get; set; }
            [Reactive] int X { get; set; }
        }"#,
    );
    assert!(analysis.models[0].mutable_properties.is_empty());
    assert!(matches!(&analysis.errors()[0], CheckError::SlotCollision { slot, .. } if slot == "_x"));
}

#[test]
fn test_command_enablement_degrades() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] string Name { get; set; }
            bool Plain { get; }
            [Command(CanExecute = "Name")] void Save();
            [Command(CanExecute = "Plain")] void Load();
            [Command(CanExecute = "Nope")] void Reset();
            [Command(CanExecute = "")] void Clear();
        }"#,
    );
    let model = &analysis.models[0];
    assert_eq!(model.commands.len(), 4);
    assert!(model.commands.iter().all(|c| c.enablement.is_none()));

    let issues: Vec<EnablementIssue> = analysis
        .errors()
        .iter()
        .filter_map(|e| match e {
            CheckError::InvalidEnablement { issue, .. } => Some(*issue),
            _ => None,
        })
        .collect();
    assert_eq!(
        issues,
        vec![EnablementIssue::NotBoolean, EnablementIssue::NotObservable, EnablementIssue::Unresolved]
    );
}

#[test]
fn test_command_shapes() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Command] Task<int> LoadAsync(string path);
            [Command] void Move(int x, int y);
        }"#,
    );
    let model = &analysis.models[0];
    assert_eq!(model.commands.len(), 1);
    let load = &model.commands[0];
    assert!(load.is_async);
    assert_eq!(load.return_type.as_ref().map(|t| t.name.as_str()), Some("int"));
    assert_eq!(load.argument_type.as_ref().map(|t| t.name.as_str()), Some("string"));
    assert!(matches!(analysis.errors()[0], CheckError::TooManyCommandParameters { count: 2, .. }));
}

#[test]
fn test_locale_groups() {
    let analysis = analyze(
        r#"partial class A : IReactiveObject {
            [Reactive] string Key { get; set; }
            [Localized("Strings", "Key")] string Title { get; }
            [Localized("Strings", "Key", Retain = true)] string Subtitle { get; }
            [Localized("Strings", "Key")] string Broken { get; set; }
            [Localized("Strings", "Missing")] string Lost { get; }
        }"#,
    );
    let model = &analysis.models[0];
    assert_eq!(model.locale_groups.len(), 1);
    let bindings = &model.locale_groups[0].groupings[0].bindings;
    assert_eq!(bindings.len(), 2);
    assert!(bindings[1].retain_value_on_key_change);
    assert!(matches!(analysis.errors()[0], CheckError::LocaleHasSetter { .. }));
    assert!(matches!(analysis.errors()[1], CheckError::UnknownLocaleKey { .. }));
}

#[test]
fn test_generic_abstract_header() {
    let analysis = analyze("public abstract partial class Box<T> : ReactiveObjectBase { }");
    let model = &analysis.models[0];
    assert!(model.is_generic());
    assert!(model.is_abstract);
    assert_eq!(model.display_name(), "Box<T>");
    assert_eq!(model.accessibility.as_deref(), Some("public"));
}

#[test]
fn test_errors_do_not_stop_other_classes() {
    let analysis = analyze(
        r#"
        class Broken : IReactiveObject { }
        partial class Fine : IReactiveObject { [Reactive] int X { get; set; } }
        "#,
    );
    assert_eq!(analysis.models.len(), 1);
    assert_eq!(analysis.models[0].name, "Fine");
}

#[test]
fn test_static_projection_reading_instance_is_rejected() {
    let analysis = analyze(
        r#"
        partial class Account : IReactiveObject
        {
            [Reactive] string Id { get; set; } = "";
            [Derived(CacheMode.EagerAtInit, "Id")]
            bool Empty => this.To(static x => Id == "");
            [Derived(CacheMode.EagerAtInit, "Id")]
            bool Named => this.To(static x => x.Id != "");
        }
        "#,
    );
    assert_eq!(analysis.errors().len(), 1, "{:?}", analysis.errors());
    assert!(matches!(
        &analysis.errors()[0],
        CheckError::UnsupportedBody { member, reason, .. } if member == "Empty" && reason.contains("'Id'")
    ));
    let model = &analysis.models[0];
    let names: Vec<_> = model.derived.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["Named"]);
}

#[test]
fn test_nameof_sources_resolve() {
    let analysis = analyze(
        r#"
        partial class Account : IReactiveObject
        {
            [Reactive] string Id { get; set; } = "";
            [Reactive] string Name { get; set; } = "";
            [Derived(CacheMode.EagerAtInit, nameof(Id), nameof(Name))]
            bool Verified => this.To(static x => x.Id == x.Name);
        }
        "#,
    );
    assert!(analysis.errors().is_empty(), "{:?}", analysis.errors());
    assert_eq!(analysis.models[0].derived[0].sources.len(), 2);
}

#[test]
fn test_observable_property_gets_init_slot() {
    let analysis = analyze(
        r#"
        partial class Viewer : ReactiveObjectBase
        {
            [Reactive] Feed Source { get; set; }
            [ObservableAsProperty] string Title => Source.ToDefault();
            [ObservableAsProperty] string Broken { get; set; }
        }
        "#,
    );
    assert_eq!(analysis.errors().len(), 1, "{:?}", analysis.errors());
    assert!(matches!(analysis.errors()[0], CheckError::DerivedHasSetter { .. }));

    let title = &analysis.models[0].derived[0];
    assert_eq!(title.origin, DerivedOrigin::Observable);
    assert_eq!(title.cache, CachePolicy::EagerAtInit);
    assert!(title.sources.is_empty());
    assert_eq!(title.slot.as_ref().map(|s| s.value.as_str()), Some("_title"));
    assert!(matches!(&title.recompute, Some(Recompute::Inline(expr)) if expr.to_string() == "Source"));
}
