//! Class emission pipeline.
//!
//! [`CodeEmitter`] walks a finished [`ClassModel`] through a fixed sequence
//! of stages and describes every generated member to an [`EmitSink`]. The
//! init entry point comes last because earlier stages contribute to it.

use crate::error::CompileResult;
use crate::fragment::{
    ClassHeader, CommandFactory, FieldDecl, FieldRole, HookDecl, MethodKind, MethodSig, Operand, PropertySig,
    StaticFunction, Stmt,
};
use crate::sink::EmitSink;
use rxweave_checker::model::{DerivedPropertyDescriptor, PropertyDescriptor};
use rxweave_checker::{CachePolicy, ClassModel, CommandDescriptor, Recompute};
use rxweave_syntax::ast::TypeRef;
use tracing::instrument;

/// Emission stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStage {
    Init,
    BackingSlots,
    Accessors,
    DerivedRecomputers,
    Commands,
    LocaleRegistrations,
    InitializationEntryPoint,
    Done,
}

impl EmitStage {
    fn next(self) -> EmitStage {
        match self {
            EmitStage::Init => EmitStage::BackingSlots,
            EmitStage::BackingSlots => EmitStage::Accessors,
            EmitStage::Accessors => EmitStage::DerivedRecomputers,
            EmitStage::DerivedRecomputers => EmitStage::Commands,
            EmitStage::Commands => EmitStage::LocaleRegistrations,
            EmitStage::LocaleRegistrations => EmitStage::InitializationEntryPoint,
            EmitStage::InitializationEntryPoint | EmitStage::Done => EmitStage::Done,
        }
    }
}

/// Type used for command parameters and results that carry no value.
pub const UNIT_TYPE: &str = "System.Reactive.Unit";

/// Generic command type exposed by generated command properties.
pub const COMMAND_TYPE: &str = "ReactiveUI.ReactiveCommand";

/// Helper type backing an observable-fed property.
pub const OBSERVABLE_HELPER_TYPE: &str = "ReactiveUI.ObservableAsPropertyHelper";

/// `ObservableAsPropertyHelper<T>` for a property of type `value`.
pub fn observable_helper_type(value: &TypeRef) -> TypeRef {
    TypeRef {
        name: OBSERVABLE_HELPER_TYPE.to_string(),
        args: vec![value.clone()],
        nullable: false,
    }
}

/// `ReactiveCommand<TIn, TOut>` for a command descriptor.
pub fn command_type(command: &CommandDescriptor) -> TypeRef {
    let unit = || TypeRef::simple(UNIT_TYPE);
    TypeRef {
        name: COMMAND_TYPE.to_string(),
        args: vec![
            command.argument_type.clone().unwrap_or_else(unit),
            command.return_type.clone().unwrap_or_else(unit),
        ],
        nullable: false,
    }
}

/// Walks one [`ClassModel`] into an [`EmitSink`].
pub struct CodeEmitter<'m> {
    model: &'m ClassModel,
    stage: EmitStage,
    /// Statements gathered for the init entry point
    init: Vec<Stmt>,
}

impl<'m> CodeEmitter<'m> {
    pub fn new(model: &'m ClassModel) -> Self {
        Self {
            model,
            stage: EmitStage::Init,
            init: Vec::new(),
        }
    }

    pub fn stage(&self) -> EmitStage {
        self.stage
    }

    /// Run every stage and return the sink's output.
    #[instrument(skip_all, fields(class = %self.model.name))]
    pub fn emit<S: EmitSink>(mut self, sink: &mut S) -> CompileResult<S::Output> {
        while self.stage != EmitStage::Done {
            tracing::trace!(stage = ?self.stage, "emitting");
            match self.stage {
                EmitStage::Init => sink.begin_class(&self.header())?,
                EmitStage::BackingSlots => self.emit_backing_slots(sink)?,
                EmitStage::Accessors => self.emit_accessors(sink)?,
                EmitStage::DerivedRecomputers => self.emit_recomputers(sink)?,
                EmitStage::Commands => self.emit_commands(sink)?,
                EmitStage::LocaleRegistrations => self.collect_locale_registrations(),
                EmitStage::InitializationEntryPoint => self.emit_init(sink)?,
                EmitStage::Done => {}
            }
            self.stage = self.stage.next();
        }
        sink.end_class()
    }

    fn header(&self) -> ClassHeader {
        ClassHeader {
            name: self.model.name.clone(),
            namespace: self.model.namespace.clone(),
            usings: self.model.usings.clone(),
            type_params: self.model.type_params.clone(),
            accessibility: self.model.accessibility.clone(),
            is_abstract: self.model.is_abstract,
        }
    }

    fn emit_backing_slots<S: EmitSink>(&self, sink: &mut S) -> CompileResult<()> {
        for prop in &self.model.mutable_properties {
            sink.emit_field(&FieldDecl {
                name: prop.slot.clone(),
                ty: prop.declared_type.clone(),
                role: FieldRole::PropertySlot,
                initializer: prop.initializer.clone(),
            })?;
        }

        for derived in &self.model.derived {
            let Some(slot) = &derived.slot else {
                continue;
            };
            let ty = if derived.is_observable() {
                observable_helper_type(&derived.declared_type)
            } else {
                derived.declared_type.clone()
            };
            sink.emit_field(&FieldDecl {
                name: slot.value.clone(),
                ty,
                role: FieldRole::DerivedSlot,
                initializer: None,
            })?;
            if let Some(flag) = &slot.flag {
                sink.emit_field(&FieldDecl {
                    name: flag.clone(),
                    ty: TypeRef::simple("bool"),
                    role: FieldRole::LazyFlag,
                    initializer: None,
                })?;
            }
        }

        for function in self.model.statics.iter() {
            sink.emit_static(&StaticFunction {
                name: function.name.clone(),
                param: function.param.clone(),
                body: function.body.clone(),
                return_type: function.return_type.clone(),
            })?;
        }

        for prop in &self.model.mutable_properties {
            for hook in [changing_hook(&prop.name), changed_hook(&prop.name)] {
                let implemented = self.model.declares_hook(&hook);
                sink.declare_hook(&HookDecl {
                    name: hook,
                    value_type: prop.declared_type.clone(),
                    implemented,
                })?;
            }
        }
        Ok(())
    }

    fn emit_accessors<S: EmitSink>(&self, sink: &mut S) -> CompileResult<()> {
        for prop in &self.model.mutable_properties {
            self.emit_raise_and_set(sink, prop)?;
        }

        for prop in &self.model.mutable_properties {
            let info = self.model.members.get(prop.id);
            sink.declare_property(&PropertySig {
                name: prop.name.clone(),
                ty: prop.declared_type.clone(),
                accessibility: info.accessibility.clone(),
                synthesized: false,
                has_setter: true,
            })?;

            sink.begin_method(&MethodSig::getter(&prop.name, &prop.declared_type))?;
            sink.emit_statement(&Stmt::Return(Operand::Slot(prop.slot.clone())))?;
            sink.end_method()?;

            sink.begin_method(&MethodSig::setter(&prop.name, &prop.declared_type))?;
            sink.emit_statement(&Stmt::CallMethod {
                method: raise_and_set_name(&prop.name),
                pass_value: true,
            })?;
            sink.end_method()?;

            if prop.initializer.is_some() {
                sink.redirect_initializer(&prop.name, &format!("set_{}", prop.name))?;
            }
        }

        for derived in &self.model.derived {
            let Some(recompute) = self.recompute_operand(derived) else {
                tracing::debug!(property = %derived.name, "announce-only target, getter kept");
                continue;
            };
            let info = self.model.members.get(derived.property);
            sink.declare_property(&PropertySig {
                name: derived.name.clone(),
                ty: derived.declared_type.clone(),
                accessibility: info.accessibility.clone(),
                synthesized: info.synthesized,
                has_setter: false,
            })?;

            sink.begin_method(&MethodSig::getter(&derived.name, &derived.declared_type))?;
            match (&derived.slot, derived.cache) {
                (Some(slot), _) if derived.is_observable() => {
                    sink.emit_statement(&Stmt::Return(Operand::HelperValue {
                        slot: slot.value.clone(),
                        ty: derived.declared_type.clone(),
                    }))?;
                }
                (Some(slot), CachePolicy::LazyOnFirstAccess) => {
                    if let Some(flag) = &slot.flag {
                        sink.emit_statement(&Stmt::IfUnset {
                            flag: flag.clone(),
                            then: vec![
                                Stmt::Store {
                                    slot: slot.value.clone(),
                                    value: recompute,
                                },
                                Stmt::Store {
                                    slot: flag.clone(),
                                    value: Operand::Bool(true),
                                },
                            ],
                        })?;
                    }
                    sink.emit_statement(&Stmt::Return(Operand::Slot(slot.value.clone())))?;
                }
                (Some(slot), _) => sink.emit_statement(&Stmt::Return(Operand::Slot(slot.value.clone())))?,
                (None, _) => sink.emit_statement(&Stmt::Return(recompute))?,
            }
            sink.end_method()?;
        }
        Ok(())
    }

    /// Body of `RaiseAndSet{P}`, following the setter contract.
    fn emit_raise_and_set<S: EmitSink>(&self, sink: &mut S, prop: &PropertyDescriptor) -> CompileResult<()> {
        sink.begin_method(&MethodSig {
            name: raise_and_set_name(&prop.name),
            kind: MethodKind::RaiseAndSet {
                property: prop.name.clone(),
            },
            params: vec![("value".to_string(), prop.declared_type.clone())],
            return_type: None,
        })?;

        let affected: Vec<&DerivedPropertyDescriptor> = self
            .model
            .propagation(prop.id)
            .into_iter()
            .map(|d| self.model.derived(d))
            .collect();

        if !prop.skip_equality_check {
            sink.emit_statement(&Stmt::ReturnIfUnchanged { slot: prop.slot.clone() })?;
        }
        sink.emit_statement(&Stmt::CaptureOld { slot: prop.slot.clone() })?;
        sink.emit_statement(&Stmt::RaiseChanging {
            property: prop.name.clone(),
        })?;
        sink.emit_statement(&Stmt::CallHook {
            hook: changing_hook(&prop.name),
        })?;
        for derived in affected.iter().filter(|d| d.cache == CachePolicy::Disabled) {
            sink.emit_statement(&Stmt::RaiseChanging {
                property: derived.name.clone(),
            })?;
        }

        sink.emit_statement(&Stmt::StoreValue { slot: prop.slot.clone() })?;

        sink.emit_statement(&Stmt::RaiseChanged {
            property: prop.name.clone(),
        })?;
        sink.emit_statement(&Stmt::CallHook {
            hook: changed_hook(&prop.name),
        })?;
        for derived in &affected {
            let stmt = if derived.cache.is_cached() {
                Stmt::CallMethod {
                    method: recompute_name(&derived.name),
                    pass_value: false,
                }
            } else {
                Stmt::RaiseChanged {
                    property: derived.name.clone(),
                }
            };
            sink.emit_statement(&stmt)?;
        }

        sink.end_method()
    }

    fn emit_recomputers<S: EmitSink>(&self, sink: &mut S) -> CompileResult<()> {
        for derived in self.model.derived.iter().filter(|d| !d.is_observable()) {
            let (Some(slot), Some(recompute)) = (&derived.slot, self.recompute_operand(derived)) else {
                continue;
            };
            sink.begin_method(&MethodSig {
                name: recompute_name(&derived.name),
                kind: MethodKind::Recompute {
                    property: derived.name.clone(),
                },
                params: Vec::new(),
                return_type: None,
            })?;
            if let Some(flag) = &slot.flag {
                sink.emit_statement(&Stmt::Store {
                    slot: flag.clone(),
                    value: Operand::Bool(true),
                })?;
            }
            sink.emit_statement(&Stmt::SetIfChanged {
                slot: slot.value.clone(),
                value: recompute,
                property: derived.name.clone(),
            })?;
            sink.end_method()?;
        }
        Ok(())
    }

    fn emit_commands<S: EmitSink>(&self, sink: &mut S) -> CompileResult<()> {
        for command in &self.model.commands {
            let ty = command_type(command);
            sink.emit_field(&FieldDecl {
                name: command.slot.clone(),
                ty: ty.clone(),
                role: FieldRole::CommandSlot,
                initializer: None,
            })?;
            sink.declare_property(&PropertySig {
                name: command.property_name.clone(),
                ty: ty.clone(),
                accessibility: Some("public".to_string()),
                synthesized: true,
                has_setter: false,
            })?;
            sink.begin_method(&MethodSig {
                name: format!("get_{}", command.property_name),
                kind: MethodKind::CommandGetter {
                    command: command.property_name.clone(),
                },
                params: Vec::new(),
                return_type: Some(ty),
            })?;
            sink.emit_statement(&Stmt::ReturnCommand {
                slot: command.slot.clone(),
                factory: CommandFactory {
                    method: command.method.clone(),
                    argument_type: command.argument_type.clone(),
                    return_type: command.return_type.clone(),
                    is_async: command.is_async,
                    enablement: command.enablement.as_ref().map(|e| e.name.clone()),
                },
            })?;
            sink.end_method()?;
        }
        Ok(())
    }

    /// Locale registrations only contribute to the init entry point.
    fn collect_locale_registrations(&mut self) {
        let mut unnamed = 0;
        for group in &self.model.locale_groups {
            for grouping in &group.groupings {
                let variable = match &grouping.name {
                    Some(name) => name.clone(),
                    None => {
                        unnamed += 1;
                        if unnamed == 1 {
                            "i18nObject".to_string()
                        } else {
                            format!("i18nObject{}", unnamed)
                        }
                    }
                };
                self.init.push(Stmt::RegisterLocaleObject {
                    registry: group.registry.clone(),
                    grouping: grouping.name.clone(),
                    variable: variable.clone(),
                });
                for binding in &grouping.bindings {
                    self.init.push(Stmt::AddLocaleProperty {
                        variable: variable.clone(),
                        key: binding.key_name.clone(),
                        target: binding.target_name.clone(),
                        retain: binding.retain_value_on_key_change,
                    });
                }
            }
        }
    }

    fn emit_init<S: EmitSink>(&mut self, sink: &mut S) -> CompileResult<()> {
        let mut body = Vec::new();
        for id in self.model.initialization_order() {
            let derived = self.model.derived(id);
            match derived.cache {
                CachePolicy::EagerAtInit => {
                    let (Some(slot), Some(value)) = (&derived.slot, self.recompute_operand(derived)) else {
                        continue;
                    };
                    if derived.notify_on_initial_value {
                        body.push(Stmt::CallMethod {
                            method: recompute_name(&derived.name),
                            pass_value: false,
                        });
                    } else {
                        body.push(Stmt::Store {
                            slot: slot.value.clone(),
                            value,
                        });
                    }
                }
                CachePolicy::Disabled if derived.notify_on_initial_value => body.push(Stmt::RaiseChanged {
                    property: derived.name.clone(),
                }),
                CachePolicy::Disabled | CachePolicy::LazyOnFirstAccess => {}
            }
        }
        body.append(&mut self.init);

        sink.begin_method(&MethodSig {
            name: self.model.init_method.clone(),
            kind: MethodKind::Init {
                is_override: self.model.is_extensible_base,
            },
            params: Vec::new(),
            return_type: None,
        })?;
        for stmt in &body {
            sink.emit_statement(stmt)?;
        }
        sink.end_method()
    }

    fn recompute_operand(&self, derived: &DerivedPropertyDescriptor) -> Option<Operand> {
        Some(match derived.recompute.as_ref()? {
            Recompute::Inline(expr) => Operand::Expr(expr.clone()),
            Recompute::Static(id) => Operand::Static {
                function: self.model.statics.get(*id).name.clone(),
            },
            Recompute::Method(method) => Operand::Method(method.clone()),
        })
    }
}

/// Emit `model` into `sink`.
pub fn emit_class<S: EmitSink>(model: &ClassModel, sink: &mut S) -> CompileResult<S::Output> {
    CodeEmitter::new(model).emit(sink)
}

pub fn raise_and_set_name(property: &str) -> String {
    format!("RaiseAndSet{}", property)
}

pub fn recompute_name(property: &str) -> String {
    format!("Recompute{}", property)
}

pub fn changing_hook(property: &str) -> String {
    format!("On{}Changing", property)
}

pub fn changed_hook(property: &str) -> String {
    format!("On{}Changed", property)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxweave_checker::Analyzer;
    use rxweave_syntax::DeclarationSet;

    /// Records fragments as one line each.
    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
        method: Option<String>,
    }

    impl EmitSink for Recorder {
        type Output = Vec<String>;

        fn begin_class(&mut self, header: &ClassHeader) -> CompileResult<()> {
            self.lines.push(format!("class {}", header.display_name()));
            Ok(())
        }

        fn emit_field(&mut self, field: &FieldDecl) -> CompileResult<()> {
            self.lines.push(format!("field {}", field.name));
            Ok(())
        }

        fn emit_static(&mut self, function: &StaticFunction) -> CompileResult<()> {
            self.lines.push(format!("static {}", function.name));
            Ok(())
        }

        fn declare_hook(&mut self, hook: &HookDecl) -> CompileResult<()> {
            self.lines.push(format!("hook {}", hook.name));
            Ok(())
        }

        fn declare_property(&mut self, property: &PropertySig) -> CompileResult<()> {
            self.lines.push(format!("property {}", property.name));
            Ok(())
        }

        fn begin_method(&mut self, sig: &MethodSig) -> CompileResult<()> {
            self.method = Some(sig.name.clone());
            self.lines.push(format!("method {}", sig.name));
            Ok(())
        }

        fn emit_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
            let line = match stmt {
                Stmt::RaiseChanging { property } => format!("  changing {}", property),
                Stmt::RaiseChanged { property } => format!("  changed {}", property),
                Stmt::CallMethod { method, .. } => format!("  call {}", method),
                other => format!("  {}", other.label()),
            };
            self.lines.push(line);
            Ok(())
        }

        fn end_method(&mut self) -> CompileResult<()> {
            self.method = None;
            Ok(())
        }

        fn end_class(&mut self) -> CompileResult<Vec<String>> {
            Ok(std::mem::take(&mut self.lines))
        }
    }

    fn emit(source: &str) -> Vec<String> {
        let set = DeclarationSet::parse("test.rxd", source).unwrap();
        let analysis = Analyzer::new().analyze(&set);
        assert!(!analysis.has_errors(), "{:?}", analysis.errors());
        emit_class(&analysis.models[0], &mut Recorder::default()).unwrap()
    }

    fn method_body<'a>(lines: &'a [String], name: &str) -> Vec<&'a str> {
        let header = format!("method {}", name);
        lines
            .iter()
            .skip_while(|l| **l != header)
            .skip(1)
            .take_while(|l| l.starts_with("  "))
            .map(|l| l.trim())
            .collect()
    }

    #[test]
    fn test_setter_contract_order() {
        let lines = emit(
            r#"partial class A : IReactiveObject {
                [Reactive] int X { get; set; }
                [Derived(CacheMode.Disabled, "X")] int Half => X / 2;
                [Derived("X")] int Double => X * 2;
            }"#,
        );
        assert_eq!(
            method_body(&lines, "RaiseAndSetX"),
            vec![
                "return-if-unchanged",
                "capture-old",
                "changing X",
                "call-hook",
                "changing Half",
                "store-value",
                "changed X",
                "call-hook",
                "changed Half",
                "call RecomputeDouble",
            ]
        );
    }

    #[test]
    fn test_shared_source_calls_each_target_once() {
        let lines = emit(
            r#"partial class A : IReactiveObject {
                [Reactive] int X { get; set; }
                [Reactive] int Y { get; set; }
                [Derived("X", "Y")] int Sum => X + Y;
                [Derived("X")] int Twice => X * 2;
                [Derived("Sum", "Twice")] int Total => Sum + Twice;
            }"#,
        );
        let body = method_body(&lines, "RaiseAndSetX");
        let calls: Vec<&str> = body.iter().copied().filter(|l| l.starts_with("call ")).collect();
        assert_eq!(calls, vec!["call RecomputeSum", "call RecomputeTwice", "call RecomputeTotal"]);
        assert_eq!(lines.iter().filter(|l| *l == "field _sum").count(), 1);
    }

    #[test]
    fn test_skip_equality_check_drops_guard() {
        let lines = emit("partial class A : IReactiveObject { [Reactive(false)] int X { get; set; } }");
        assert_eq!(method_body(&lines, "RaiseAndSetX")[0], "capture-old");
    }

    #[test]
    fn test_stage_order() {
        let lines = emit(
            r#"partial class A : ReactiveObjectBase {
                [Reactive] string Key { get; set; }
                [Derived(CacheMode.LazyOnFirstAccess, "Key")] int Len => Key.Length;
                [Localized("Strings", "Key")] string Title { get; }
                [Command] void Go();
            }"#,
        );
        let expected = [
            "field _key",
            "field _len",
            "field _lenInitialized",
            "hook OnKeyChanging",
            "method RaiseAndSetKey",
            "method get_Len",
            "method RecomputeLen",
            "field _goCommand",
            "method InitializeReactiveObject",
        ];
        let positions: Vec<usize> = expected
            .iter()
            .map(|needle| lines.iter().position(|l| l == needle).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", lines);

        assert_eq!(method_body(&lines, "get_Len"), vec!["if-unset", "return"]);
        assert_eq!(method_body(&lines, "RecomputeLen"), vec!["store", "set-if-changed"]);
        assert_eq!(
            method_body(&lines, "InitializeReactiveObject"),
            vec!["register-locale-object", "add-locale-property"]
        );
    }

    #[test]
    fn test_init_orders_eager_values() {
        let lines = emit(
            r#"partial class A : IReactiveObject {
                [Reactive] int X { get; set; }
                [Derived("Base")] int Top => Base + 1;
                [Derived(CacheMode.EagerAtInit, "X", NotifyOnInitialValue = true)] int Base => X;
            }"#,
        );
        assert_eq!(method_body(&lines, "InitializeReactiveObject"), vec!["call RecomputeBase", "store"]);
    }

    #[test]
    fn test_announce_only_target_keeps_getter() {
        let lines = emit(
            r#"partial class A : IReactiveObject {
                [NotifyFor("Label")]
                [Reactive] int Count { get; set; }
                string Label { get; }
            }"#,
        );
        assert!(!lines.iter().any(|l| l == "property Label"));
        assert!(method_body(&lines, "RaiseAndSetCount").contains(&"changed Label"));
    }

    #[test]
    fn test_command_type() {
        let set = DeclarationSet::parse("t.rxd", "partial class A : IReactiveObject { [Command] Task<int> Load(string path); }").unwrap();
        let analysis = Analyzer::new().analyze(&set);
        let ty = command_type(&analysis.models[0].commands[0]);
        assert_eq!(ty.to_string(), "ReactiveUI.ReactiveCommand<string, int>");
    }
}
