//! Observable behavior of patched classes

use rxweave_checker::Analyzer;
use rxweave_compiler::compile_patch;
use rxweave_runtime::{patched_image, Event, ObjectId, RuntimeError, Value, Vm};
use rxweave_syntax::{DeclarationSet, SymbolTable};

const ACCOUNT: &str = r#"
using ReactiveUI;
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

    void OnNameChanged(string oldValue, string newValue) => Touch();
    void Touch();
}
"#;

/// Parse, analyze, patch and load every class in `source`.
fn load(source: &str) -> Vm {
    let set = DeclarationSet::parse("test.rxd", source).unwrap();
    let analysis = Analyzer::new().analyze(&set);
    assert!(!analysis.has_errors(), "{:?}", analysis.errors());

    let mut vm = Vm::new();
    for model in &analysis.models {
        let module = compile_patch(model).unwrap();
        let class = set.class(&model.name).unwrap();
        vm.load(patched_image(class, set.conventions(), &module).unwrap());
    }
    vm
}

fn create(vm: &mut Vm, class: &str) -> ObjectId {
    let object = vm.instantiate(class).unwrap();
    vm.clear_events();
    object
}

fn changed(events: &[Event], name: &str) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::Changed { property, .. } if property == name))
        .count()
}

fn changing(events: &[Event], name: &str) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::Changing { property, .. } if property == name))
        .count()
}

fn position(events: &[Event], wanted: &Event) -> usize {
    events.iter().position(|e| e == wanted).unwrap()
}

#[test]
fn test_eager_value_is_correct_after_construction() {
    let mut vm = load(ACCOUNT);
    let account = create(&mut vm, "Account");
    assert_eq!(vm.get(account, "Verified").unwrap(), Value::Bool(true));
    assert_eq!(vm.field(account, "_verified"), Some(&Value::Bool(true)));
    assert_eq!(vm.get(account, "NameLength").unwrap(), Value::Int(0));
}

#[test]
fn test_write_notifies_in_setter_order() {
    let mut vm = load(ACCOUNT);
    let account = create(&mut vm, "Account");
    vm.set(account, "Name", "ada").unwrap();
    let events = vm.take_events();

    let name_changing = Event::Changing {
        object: account,
        property: "Name".into(),
    };
    let length_changing = Event::Changing {
        object: account,
        property: "NameLength".into(),
    };
    let name_changed = Event::Changed {
        object: account,
        property: "Name".into(),
    };
    let hook = Event::Hook {
        object: account,
        hook: "OnNameChanged".into(),
        args: vec![Value::from(""), Value::from("ada")],
    };
    let verified_changed = Event::Changed {
        object: account,
        property: "Verified".into(),
    };
    let length_changed = Event::Changed {
        object: account,
        property: "NameLength".into(),
    };

    let order = [
        position(&events, &name_changing),
        position(&events, &length_changing),
        position(&events, &name_changed),
        position(&events, &hook),
        position(&events, &verified_changed),
        position(&events, &length_changed),
    ];
    assert!(order.windows(2).all(|w| w[0] < w[1]), "{:#?}", events);
    assert!(events.contains(&Event::Invoked {
        object: account,
        method: "Touch".into(),
        args: Vec::new(),
    }));
    assert_eq!(vm.get(account, "NameLength").unwrap(), Value::Int(3));
    assert_eq!(vm.get(account, "Verified").unwrap(), Value::Bool(false));
}

#[test]
fn test_verified_tracks_both_sources() {
    let mut vm = load(ACCOUNT);
    let account = create(&mut vm, "Account");

    vm.set(account, "Id", "114").unwrap();
    let events = vm.take_events();
    assert_eq!(changed(&events, "Verified"), 1, "{:#?}", events);
    assert_eq!(changing(&events, "Verified"), 1, "{:#?}", events);
    assert_eq!(vm.get(account, "Verified").unwrap(), Value::Bool(false));

    vm.set(account, "Name", "114").unwrap();
    let events = vm.take_events();
    assert_eq!(changed(&events, "Verified"), 1, "{:#?}", events);
    assert_eq!(vm.get(account, "Verified").unwrap(), Value::Bool(true));
    assert_eq!(vm.field(account, "_verified"), Some(&Value::Bool(true)));
}

#[test]
fn test_unchanged_write_is_silent() {
    let mut vm = load(ACCOUNT);
    let account = create(&mut vm, "Account");
    vm.set(account, "Name", "").unwrap();
    assert!(vm.events().is_empty(), "{:#?}", vm.events());
}

#[test]
fn test_hook_without_body_is_not_called() {
    let mut vm = load(ACCOUNT);
    let account = create(&mut vm, "Account");
    vm.set(account, "Id", "x").unwrap();
    assert!(!vm.events().iter().any(|e| matches!(e, Event::Hook { .. })));
}

#[test]
fn test_command_enablement_follows_gate() {
    let mut vm = load(ACCOUNT);
    let account = create(&mut vm, "Account");
    let submit = vm.command(account, "SubmitCommand").unwrap();
    assert!(vm.can_execute(submit).unwrap());

    vm.set(account, "Name", "ada").unwrap();
    assert!(!vm.can_execute(submit).unwrap());
    assert!(vm.take_events().contains(&Event::CanExecuteChanged {
        command: submit,
        can_execute: false,
    }));
    assert!(matches!(vm.execute(submit, None), Err(RuntimeError::CommandDisabled(_))));

    vm.set(account, "Id", "ada").unwrap();
    assert!(vm.can_execute(submit).unwrap());
    vm.clear_events();
    vm.execute(submit, None).unwrap();
    assert_eq!(
        vm.events(),
        &[Event::Invoked {
            object: account,
            method: "Submit".into(),
            args: Vec::new(),
        }]
    );

    // The property returns the same command every time
    assert_eq!(vm.command(account, "SubmitCommand").unwrap(), submit);
}

#[test]
fn test_shared_dependent_notifies_once() {
    let mut vm = load(
        r#"partial class Grid : ReactiveObjectBase {
            [Reactive] int A { get; set; }
            [Derived("A")] int B => A + 1;
            [Derived("A", "B")] int C => A + B;
        }"#,
    );
    let grid = create(&mut vm, "Grid");
    assert_eq!(vm.get(grid, "C").unwrap(), Value::Int(1));

    vm.set(grid, "A", 5i64).unwrap();
    let events = vm.take_events();
    assert_eq!(changed(&events, "B"), 1);
    assert_eq!(changed(&events, "C"), 1);
    assert_eq!(vm.get(grid, "B").unwrap(), Value::Int(6));
    assert_eq!(vm.get(grid, "C").unwrap(), Value::Int(11));
}

#[test]
fn test_disabled_value_pairs_each_write() {
    let mut vm = load(
        r#"partial class Label : ReactiveObjectBase {
            [Reactive] string Text { get; set; } = "a";
            [Derived(CacheMode.Disabled, "Text")] string Upper => Text.ToUpper();
        }"#,
    );
    let label = create(&mut vm, "Label");
    for text in ["b", "c"] {
        vm.set(label, "Text", text).unwrap();
        let events = vm.take_events();
        assert_eq!(changing(&events, "Upper"), 1);
        assert_eq!(changed(&events, "Upper"), 1);
        assert_eq!(vm.get(label, "Upper").unwrap(), Value::from(text.to_uppercase().as_str()));
    }

    vm.set(label, "Text", "c").unwrap();
    assert!(vm.events().is_empty());
}

#[test]
fn test_lazy_value_computes_on_first_read() {
    let mut vm = load(
        r#"partial class Meter : ReactiveObjectBase {
            [Reactive] int Raw { get; set; }
            [Derived(CacheMode.LazyOnFirstAccess, "Raw")] int Scaled => Raw * 10 + 1;
        }"#,
    );
    let meter = create(&mut vm, "Meter");
    assert_eq!(vm.field(meter, "_scaledInitialized"), Some(&Value::Bool(false)));
    assert_eq!(vm.field(meter, "_scaled"), Some(&Value::Int(0)));
    assert_eq!(vm.get(meter, "Scaled").unwrap(), Value::Int(1));
    assert_eq!(vm.field(meter, "_scaledInitialized"), Some(&Value::Bool(true)));

    vm.set(meter, "Raw", 3i64).unwrap();
    assert_eq!(changed(vm.events(), "Scaled"), 1);
    assert_eq!(vm.get(meter, "Scaled").unwrap(), Value::Int(31));
}

#[test]
fn test_interface_only_class_waits_for_explicit_init() {
    let mut vm = load(
        r#"partial class Plain : IReactiveObject {
            [Reactive] int X { get; set; }
            [Derived("X")] int Y => X + 3;
        }"#,
    );
    let plain = create(&mut vm, "Plain");
    assert_eq!(vm.get(plain, "Y").unwrap(), Value::Int(0));

    vm.call(plain, "InitializeReactiveObject", Vec::new()).unwrap();
    assert_eq!(vm.get(plain, "Y").unwrap(), Value::Int(3));
    assert!(vm.events().is_empty());
}

#[test]
fn test_command_with_argument() {
    let mut vm = load(
        r#"partial class Greeter : ReactiveObjectBase {
            [Command] void Greet(string who);
        }"#,
    );
    let greeter = create(&mut vm, "Greeter");
    let greet = vm.command(greeter, "GreetCommand").unwrap();
    assert!(vm.can_execute(greet).unwrap());
    vm.execute(greet, Some(Value::from("bob"))).unwrap();
    assert_eq!(
        vm.events().last(),
        Some(&Event::Invoked {
            object: greeter,
            method: "Greet".into(),
            args: vec![Value::from("bob")],
        })
    );
}

#[test]
fn test_locale_registration_at_init() {
    let mut vm = load(
        r#"partial class Page : ReactiveObjectBase {
            [Reactive] string Key { get; set; }
            [Localized("Strings", "Key")] string Title { get; }
            [Localized("Strings", "Key", Retain = true)] string Subtitle { get; }
        }"#,
    );
    let page = create(&mut vm, "Page");
    let registrations = vm.locale_registrations();
    assert_eq!(registrations.len(), 1);
    let registration = &registrations[0];
    assert_eq!(registration.registry, "Strings");
    assert_eq!(registration.owner, page);
    let bindings: Vec<(&str, bool)> = registration
        .bindings
        .iter()
        .map(|b| (b.target.as_str(), b.retain))
        .collect();
    assert_eq!(bindings, vec![("Title", false), ("Subtitle", true)]);
}

#[test]
fn test_observable_property_reads_helper_value() {
    let mut vm = load(
        r#"
        partial class Feed : IReactiveObject { [Reactive] public string Value { get; set; } }
        partial class Viewer : IReactiveObject {
            [Reactive] public Feed Source { get; set; }
            [ObservableAsProperty] public string Title => Source.ToDefault();
        }
        "#,
    );
    let feed = create(&mut vm, "Feed");
    vm.set(feed, "Value", "foo").unwrap();
    let viewer = create(&mut vm, "Viewer");

    // No helper before init: the getter falls back to the default
    assert_eq!(vm.get(viewer, "Title").unwrap(), Value::Null);

    vm.set(viewer, "Source", Value::Object(feed)).unwrap();
    vm.call(viewer, "InitializeReactiveObject", Vec::new()).unwrap();
    assert_eq!(vm.field(viewer, "_title"), Some(&Value::Object(feed)));
    assert_eq!(vm.get(viewer, "Title").unwrap(), Value::from("foo"));

    vm.set(feed, "Value", "bar").unwrap();
    assert_eq!(vm.get(viewer, "Title").unwrap(), Value::from("bar"));
    assert!(vm.set(viewer, "Title", "baz").is_err());
}
