//! Source synthesis back-end.
//!
//! Renders one C# partial class per model. Fragments arrive in emission
//! order and are sorted into sections, which are written out in the fixed
//! member order of a generated unit when the class ends.

use crate::error::{CompileError, CompileResult};
use crate::fragment::{
    ClassHeader, CommandFactory, FieldDecl, FieldRole, HookDecl, MethodKind, MethodSig, Operand, PropertySig,
    StaticFunction, Stmt,
};
use crate::sink::EmitSink;
use rustc_hash::FxHashMap;
use rxweave_syntax::ast::TypeRef;
use std::fmt::Write;

const INDENT: &str = "    ";

/// One generated compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Namespace-qualified class name
    pub class: String,
    /// `{Namespace.Class}.reactive.g.cs`, generic brackets as braces
    pub file_name: String,
    pub text: String,
}

/// File name of the unit generated for `header`.
pub fn unit_file_name(header: &ClassHeader) -> String {
    let name = match &header.namespace {
        Some(ns) => format!("{}.{}", ns, header.display_name()),
        None => header.display_name(),
    };
    let name: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '<' => '{',
            '>' => '}',
            other => other,
        })
        .collect();
    format!("{}.reactive.g.cs", name)
}

#[derive(Debug)]
struct PropertyBlock {
    sig: PropertySig,
    getter: Option<Vec<String>>,
    setter: Option<Vec<String>>,
}

#[derive(Debug)]
struct OpenMethod {
    sig: MethodSig,
    body: Vec<String>,
}

/// [`EmitSink`] producing C# source text.
#[derive(Debug, Default)]
pub struct SourceSink {
    header: Option<ClassHeader>,
    fields: Vec<String>,
    statics: Vec<String>,
    hooks: Vec<String>,
    setters: Vec<String>,
    properties: Vec<PropertyBlock>,
    recomputers: Vec<String>,
    commands: Vec<String>,
    init: Option<String>,
    slot_types: FxHashMap<String, TypeRef>,
    current: Option<OpenMethod>,
}

impl SourceSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn class_name(&self) -> CompileResult<String> {
        self.header
            .as_ref()
            .map(ClassHeader::display_name)
            .ok_or_else(|| CompileError::InternalError {
                message: "fragment emitted before begin_class".to_string(),
            })
    }

    fn render_statement(&self, stmt: &Stmt, indent: usize, out: &mut Vec<String>) -> CompileResult<()> {
        let pad = INDENT.repeat(indent);
        match stmt {
            Stmt::ReturnIfUnchanged { slot } => {
                let ty = self.slot_types.get(slot).ok_or_else(|| CompileError::InternalError {
                    message: format!("unknown slot '{}'", slot),
                })?;
                out.push(format!(
                    "{}if (global::System.Collections.Generic.EqualityComparer<{}>.Default.Equals({}, value)) return;",
                    pad, ty, slot
                ));
            }
            Stmt::CaptureOld { slot } => out.push(format!("{}var oldValue = {};", pad, slot)),
            Stmt::RaiseChanging { property } => out.push(format!(
                "{}ReactiveUI.IReactiveObjectExtensions.RaisePropertyChanging(this, nameof({}));",
                pad, property
            )),
            Stmt::RaiseChanged { property } => out.push(format!(
                "{}ReactiveUI.IReactiveObjectExtensions.RaisePropertyChanged(this, nameof({}));",
                pad, property
            )),
            Stmt::CallHook { hook } => out.push(format!("{}{}(oldValue, value);", pad, hook)),
            Stmt::StoreValue { slot } => out.push(format!("{}{} = value;", pad, slot)),
            Stmt::CallMethod { method, pass_value } => {
                let arg = if *pass_value { "value" } else { "" };
                out.push(format!("{}{}({});", pad, method, arg));
            }
            Stmt::SetIfChanged { slot, value, property } => out.push(format!(
                "{}ReactiveUI.IReactiveObjectExtensions.RaiseAndSetIfChanged(this, ref {}, {}, nameof({}));",
                pad,
                slot,
                operand(value),
                property
            )),
            Stmt::Store { slot, value } => out.push(format!("{}{} = {};", pad, slot, operand(value))),
            Stmt::IfUnset { flag, then } => {
                out.push(format!("{}if (!{})", pad, flag));
                out.push(format!("{}{{", pad));
                for inner in then {
                    self.render_statement(inner, indent + 1, out)?;
                }
                out.push(format!("{}}}", pad));
            }
            Stmt::Return(value) => out.push(format!("{}return {};", pad, operand(value))),
            Stmt::ReturnCommand { slot, factory } => {
                out.push(format!("{}return {} ??= {};", pad, slot, command_factory(factory)))
            }
            Stmt::RegisterLocaleObject { registry, variable, .. } => {
                out.push(format!("{}{}.I18nObjects.Add(new(this));", pad, registry));
                out.push(format!("{}var {} = {}.I18nObjects.Last();", pad, variable, registry));
            }
            Stmt::AddLocaleProperty {
                variable,
                key,
                target,
                retain,
            } => out.push(format!(
                "{}{}.AddProperty(nameof({}), x => (({})x).{}, nameof({}), {});",
                pad,
                variable,
                key,
                self.class_name()?,
                key,
                target,
                retain
            )),
        }
        Ok(())
    }

    fn property_mut(&mut self, name: &str) -> CompileResult<&mut PropertyBlock> {
        self.properties
            .iter_mut()
            .rev()
            .find(|p| p.sig.name == name)
            .ok_or_else(|| CompileError::InternalError {
                message: format!("accessor for undeclared property '{}'", name),
            })
    }

    fn render(&self) -> CompileResult<String> {
        let header = self.header.as_ref().ok_or_else(|| CompileError::InternalError {
            message: "end_class without begin_class".to_string(),
        })?;
        let mut out = String::new();

        writeln!(out, "// <auto-generated>")?;
        writeln!(out, "#nullable enable")?;
        for using in &header.usings {
            writeln!(out, "using {};", using)?;
        }
        writeln!(out)?;
        if let Some(ns) = &header.namespace {
            writeln!(out, "namespace {};", ns)?;
            writeln!(out)?;
        }

        let mut modifiers = Vec::new();
        if let Some(access) = &header.accessibility {
            modifiers.push(access.as_str());
        }
        if header.is_abstract {
            modifiers.push("abstract");
        }
        modifiers.push("partial");
        writeln!(out, "{} class {}", modifiers.join(" "), header.display_name())?;
        writeln!(out, "{{")?;

        let mut blocks: Vec<String> = Vec::new();
        let mut declarations = self.fields.clone();
        declarations.extend(self.statics.iter().cloned());
        if !declarations.is_empty() {
            blocks.push(declarations.join("\n"));
        }
        if !self.hooks.is_empty() {
            blocks.push(self.hooks.join("\n"));
        }
        blocks.extend(self.setters.iter().cloned());
        for property in &self.properties {
            blocks.push(render_property(property));
        }
        blocks.extend(self.recomputers.iter().cloned());
        blocks.extend(self.commands.iter().cloned());
        blocks.extend(self.init.iter().cloned());

        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                writeln!(out)?;
            }
            for line in block.lines() {
                if line.is_empty() {
                    writeln!(out)?;
                } else {
                    writeln!(out, "{}{}", INDENT, line)?;
                }
            }
        }

        writeln!(out, "}}")?;
        Ok(out)
    }
}

impl EmitSink for SourceSink {
    type Output = GeneratedUnit;

    fn begin_class(&mut self, header: &ClassHeader) -> CompileResult<()> {
        *self = SourceSink::default();
        self.header = Some(header.clone());
        Ok(())
    }

    fn emit_field(&mut self, field: &FieldDecl) -> CompileResult<()> {
        self.slot_types.insert(field.name.clone(), field.ty.clone());
        let line = match (field.role, &field.initializer) {
            (_, Some(init)) => format!("private {} {} = {};", field.ty, field.name, init),
            (FieldRole::LazyFlag, None) => format!("private bool {};", field.name),
            (FieldRole::CommandSlot, None) => format!("private {}? {};", field.ty, field.name),
            (FieldRole::PropertySlot | FieldRole::DerivedSlot, None) => {
                format!("private {} {} = default!;", field.ty, field.name)
            }
        };
        match field.role {
            FieldRole::CommandSlot => self.commands.push(line),
            _ => self.fields.push(line),
        }
        Ok(())
    }

    fn emit_static(&mut self, function: &StaticFunction) -> CompileResult<()> {
        let line = format!(
            "private static readonly global::System.Func<{}, {}> {} = static {} => {};",
            self.class_name()?,
            function.return_type,
            function.name,
            function.param,
            function.body
        );
        self.statics.push(line);
        Ok(())
    }

    fn declare_hook(&mut self, hook: &HookDecl) -> CompileResult<()> {
        self.hooks.push(format!(
            "partial void {}({} oldValue, {} newValue);",
            hook.name, hook.value_type, hook.value_type
        ));
        Ok(())
    }

    fn declare_property(&mut self, property: &PropertySig) -> CompileResult<()> {
        self.properties.push(PropertyBlock {
            sig: property.clone(),
            getter: None,
            setter: None,
        });
        Ok(())
    }

    fn begin_method(&mut self, sig: &MethodSig) -> CompileResult<()> {
        if let Some(open) = &self.current {
            return Err(CompileError::InternalError {
                message: format!("method '{}' begun inside '{}'", sig.name, open.sig.name),
            });
        }
        self.current = Some(OpenMethod {
            sig: sig.clone(),
            body: Vec::new(),
        });
        Ok(())
    }

    fn emit_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let mut lines = Vec::new();
        self.render_statement(stmt, 0, &mut lines)?;
        match self.current.as_mut() {
            Some(open) => {
                open.body.extend(lines);
                Ok(())
            }
            None => Err(CompileError::StatementOutsideMethod {
                statement: stmt.label().to_string(),
            }),
        }
    }

    fn end_method(&mut self) -> CompileResult<()> {
        let Some(OpenMethod { sig, body }) = self.current.take() else {
            return Err(CompileError::InternalError {
                message: "end_method without begin_method".to_string(),
            });
        };

        match &sig.kind {
            MethodKind::Getter { property } => self.property_mut(property)?.getter = Some(body),
            MethodKind::Setter { property } => self.property_mut(property)?.setter = Some(body),
            MethodKind::RaiseAndSet { .. } => self.setters.push(method_block("private void", &sig, &body)),
            MethodKind::Recompute { .. } => self.recomputers.push(method_block("private void", &sig, &body)),
            MethodKind::CommandGetter { command } => {
                let block = self
                    .properties
                    .iter()
                    .position(|p| p.sig.name == *command)
                    .map(|i| self.properties.remove(i))
                    .ok_or_else(|| CompileError::InternalError {
                        message: format!("command property '{}' was not declared", command),
                    })?;
                let mut property = block;
                property.getter = Some(body);
                self.commands.push(render_property(&property));
            }
            MethodKind::Init { is_override } => {
                let modifiers = if *is_override {
                    "protected override void"
                } else {
                    "protected void"
                };
                self.init = Some(method_block(modifiers, &sig, &body));
            }
        }
        Ok(())
    }

    fn end_class(&mut self) -> CompileResult<GeneratedUnit> {
        let text = self.render()?;
        let header = self.header.take().ok_or_else(|| CompileError::InternalError {
            message: "end_class without begin_class".to_string(),
        })?;
        let class = match &header.namespace {
            Some(ns) => format!("{}.{}", ns, header.display_name()),
            None => header.display_name(),
        };
        Ok(GeneratedUnit {
            class,
            file_name: unit_file_name(&header),
            text,
        })
    }
}

fn operand(value: &Operand) -> String {
    match value {
        Operand::Value => "value".to_string(),
        Operand::Slot(slot) => slot.clone(),
        Operand::Expr(expr) => expr.to_string(),
        Operand::Static { function } => format!("{}(this)", function),
        Operand::Method(method) => format!("{}()", method),
        Operand::Bool(b) => b.to_string(),
        Operand::HelperValue { slot, .. } => format!("{}.Value", slot),
    }
}

fn command_factory(factory: &CommandFactory) -> String {
    let create = if factory.is_async { "CreateFromTask" } else { "Create" };
    let generics: Vec<String> = [&factory.argument_type, &factory.return_type]
        .into_iter()
        .flatten()
        .map(ToString::to_string)
        .collect();
    let generics = if generics.is_empty() {
        String::new()
    } else {
        format!("<{}>", generics.join(", "))
    };
    match &factory.enablement {
        Some(property) => format!(
            "ReactiveUI.ReactiveCommand.{}{}({}, DynamicData.Binding.NotifyPropertyChangedEx.WhenValueChanged(this, static x => x.{}, true))",
            create, generics, factory.method, property
        ),
        None => format!("ReactiveUI.ReactiveCommand.{}{}({})", create, generics, factory.method),
    }
}

fn method_block(modifiers: &str, sig: &MethodSig, body: &[String]) -> String {
    let params: Vec<String> = sig.params.iter().map(|(name, ty)| format!("{} {}", ty, name)).collect();
    let mut out = format!("{} {}({})\n{{\n", modifiers, sig.name, params.join(", "));
    for line in body {
        out.push_str(INDENT);
        out.push_str(line);
        out.push('\n');
    }
    out.push('}');
    out
}

/// `return expr;` as `expr`, for expression-bodied accessors.
fn single_expression(body: &[String]) -> Option<String> {
    match body {
        [line] => {
            let trimmed = line.strip_suffix(';')?;
            Some(trimmed.strip_prefix("return ").unwrap_or(trimmed).to_string())
        }
        _ => None,
    }
}

fn render_accessor(out: &mut String, keyword: &str, body: &[String]) {
    match single_expression(body) {
        Some(expr) => out.push_str(&format!("{}{} => {};\n", INDENT, keyword, expr)),
        None => {
            out.push_str(&format!("{}{}\n{}{{\n", INDENT, keyword, INDENT));
            for line in body {
                out.push_str(&format!("{}{}{}\n", INDENT, INDENT, line));
            }
            out.push_str(&format!("{}}}\n", INDENT));
        }
    }
}

fn render_property(block: &PropertyBlock) -> String {
    let sig = &block.sig;
    let mut modifiers = Vec::new();
    if let Some(access) = &sig.accessibility {
        modifiers.push(access.clone());
    } else if sig.synthesized {
        modifiers.push("public".to_string());
    }
    if !sig.synthesized {
        modifiers.push("partial".to_string());
    }
    let prefix = if modifiers.is_empty() {
        String::new()
    } else {
        format!("{} ", modifiers.join(" "))
    };

    // A synthesized getter-only property collapses to `=> expr;`
    if sig.synthesized && block.setter.is_none() {
        if let Some(expr) = block.getter.as_deref().and_then(single_expression) {
            return format!("{}{} {} => {};", prefix, sig.ty, sig.name, expr);
        }
    }

    let mut out = format!("{}{} {}\n{{\n", prefix, sig.ty, sig.name);
    if let Some(getter) = &block.getter {
        render_accessor(&mut out, "get", getter);
    }
    if let Some(setter) = &block.setter {
        render_accessor(&mut out, "set", setter);
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, namespace: Option<&str>, type_params: &[&str]) -> ClassHeader {
        ClassHeader {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            usings: Vec::new(),
            type_params: type_params.iter().map(|s| s.to_string()).collect(),
            accessibility: Some("public".to_string()),
            is_abstract: false,
        }
    }

    #[test]
    fn test_unit_file_name() {
        assert_eq!(unit_file_name(&header("Account", Some("Demo"), &[])), "Demo.Account.reactive.g.cs");
        assert_eq!(unit_file_name(&header("Box", None, &["T", "U"])), "Box{T,U}.reactive.g.cs");
    }

    #[test]
    fn test_command_factory_shapes() {
        let mut factory = CommandFactory {
            method: "Save".to_string(),
            argument_type: None,
            return_type: None,
            is_async: false,
            enablement: None,
        };
        assert_eq!(command_factory(&factory), "ReactiveUI.ReactiveCommand.Create(Save)");

        factory.is_async = true;
        factory.argument_type = Some(TypeRef::simple("string"));
        factory.return_type = Some(TypeRef::simple("int"));
        factory.enablement = Some("CanSave".to_string());
        assert_eq!(
            command_factory(&factory),
            "ReactiveUI.ReactiveCommand.CreateFromTask<string, int>(Save, DynamicData.Binding.NotifyPropertyChangedEx.WhenValueChanged(this, static x => x.CanSave, true))"
        );
    }

    #[test]
    fn test_statement_outside_method() {
        let mut sink = SourceSink::new();
        sink.begin_class(&header("A", None, &[])).unwrap();
        let err = sink
            .emit_statement(&Stmt::RaiseChanged {
                property: "X".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, CompileError::StatementOutsideMethod { .. }));
    }

    #[test]
    fn test_single_expression() {
        assert_eq!(single_expression(&["return _x;".to_string()]).as_deref(), Some("_x"));
        assert_eq!(single_expression(&["RaiseAndSetX(value);".to_string()]).as_deref(), Some("RaiseAndSetX(value)"));
        assert_eq!(single_expression(&["a;".to_string(), "b;".to_string()]), None);
    }
}
