//! Binary-patch back-end.
//!
//! Lowers fragments to [`Instr`] sequences and collects them as
//! [`PatchEdit`]s against the class as the host compiler produced it:
//! declared accessors get their bodies replaced, everything else is added.

pub mod builder;
pub mod instr;
pub mod lower;
pub mod module;
pub mod pretty;

pub use builder::{Label, MethodBuilder};
pub use instr::{BinOp, CommandSpec, Instr, UnOp};
pub use lower::{lower_expr, Scope};
pub use module::{PatchEdit, PatchMethod, PatchModule};
pub use pretty::PrettyPrint;

use crate::error::{CompileError, CompileResult};
use crate::fragment::{
    ClassHeader, FieldDecl, HookDecl, MethodKind, MethodSig, Operand, PropertySig, StaticFunction, Stmt,
};
use crate::sink::EmitSink;
use rustc_hash::{FxHashMap, FxHashSet};

/// Backing field the host compiler generates for an auto property.
pub fn auto_field_name(property: &str) -> String {
    format!("<{}>k__BackingField", property)
}

struct OpenMethod {
    sig: MethodSig,
    params: Vec<String>,
    builder: MethodBuilder,
}

/// [`EmitSink`] producing a [`PatchModule`].
#[derive(Default)]
pub struct PatchSink {
    class: Option<String>,
    edits: Vec<PatchEdit>,
    implemented_hooks: FxHashSet<String>,
    properties: FxHashMap<String, PropertySig>,
    current: Option<OpenMethod>,
}

impl PatchSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lower_statement(&self, open: &mut OpenMethod, stmt: &Stmt) -> CompileResult<()> {
        let builder = &mut open.builder;
        match stmt {
            Stmt::ReturnIfUnchanged { slot } => {
                let changed = builder.new_label();
                builder.emit(Instr::LoadField(slot.clone()));
                builder.emit(Instr::LoadArg(0));
                builder.emit(Instr::Binary(BinOp::Eq));
                builder.emit_jump(Instr::JumpIfFalse, changed);
                builder.emit(Instr::ReturnVoid);
                builder.bind(changed);
            }
            Stmt::CaptureOld { slot } => {
                let old = builder.local("oldValue");
                builder.emit(Instr::LoadField(slot.clone()));
                builder.emit(Instr::StoreLocal(old));
            }
            Stmt::RaiseChanging { property } => builder.emit(Instr::RaiseChanging(property.clone())),
            Stmt::RaiseChanged { property } => builder.emit(Instr::RaiseChanged(property.clone())),
            Stmt::CallHook { hook } => {
                // Unimplemented hooks do not exist in compiled code
                if self.implemented_hooks.contains(hook) {
                    let old = builder.local("oldValue");
                    builder.emit(Instr::LoadLocal(old));
                    builder.emit(Instr::LoadArg(0));
                    builder.emit(Instr::CallHook {
                        name: hook.clone(),
                        argc: 2,
                    });
                }
            }
            Stmt::StoreValue { slot } => {
                builder.emit(Instr::LoadArg(0));
                builder.emit(Instr::StoreField(slot.clone()));
            }
            Stmt::CallMethod { method, pass_value } => {
                builder.emit(Instr::LoadThis);
                if *pass_value {
                    builder.emit(Instr::LoadArg(0));
                }
                builder.emit(Instr::CallMethod {
                    name: method.clone(),
                    argc: u8::from(*pass_value),
                });
                builder.emit(Instr::Pop);
            }
            Stmt::SetIfChanged { slot, value, property } => {
                let unchanged = builder.new_label();
                lower_operand(builder, value, &open.params)?;
                let fresh = builder.local("newValue");
                builder.emit(Instr::StoreLocal(fresh));
                builder.emit(Instr::LoadField(slot.clone()));
                builder.emit(Instr::LoadLocal(fresh));
                builder.emit(Instr::Binary(BinOp::Eq));
                builder.emit_jump(Instr::JumpIfTrue, unchanged);
                builder.emit(Instr::RaiseChanging(property.clone()));
                builder.emit(Instr::LoadLocal(fresh));
                builder.emit(Instr::StoreField(slot.clone()));
                builder.emit(Instr::RaiseChanged(property.clone()));
                builder.bind(unchanged);
            }
            Stmt::Store { slot, value } => {
                lower_operand(builder, value, &open.params)?;
                builder.emit(Instr::StoreField(slot.clone()));
            }
            Stmt::IfUnset { flag, then } => {
                let done = open.builder.new_label();
                open.builder.emit(Instr::LoadField(flag.clone()));
                open.builder.emit_jump(Instr::JumpIfTrue, done);
                for inner in then {
                    self.lower_statement(open, inner)?;
                }
                open.builder.bind(done);
            }
            Stmt::Return(value) => {
                lower_operand(builder, value, &open.params)?;
                builder.emit(Instr::Return);
            }
            Stmt::ReturnCommand { slot, factory } => {
                let ready = builder.new_label();
                builder.emit(Instr::LoadField(slot.clone()));
                builder.emit_jump(Instr::JumpIfNotNull, ready);
                builder.emit(Instr::NewCommand(CommandSpec {
                    method: factory.method.clone(),
                    takes_argument: factory.argument_type.is_some(),
                    is_async: factory.is_async,
                    can_execute: factory.enablement.clone(),
                }));
                builder.emit(Instr::Dup);
                builder.emit(Instr::StoreField(slot.clone()));
                builder.bind(ready);
                builder.emit(Instr::Return);
            }
            Stmt::RegisterLocaleObject {
                registry,
                grouping,
                variable,
            } => {
                let local = builder.local(variable);
                builder.emit(Instr::RegisterLocale {
                    registry: registry.clone(),
                    grouping: grouping.clone(),
                });
                builder.emit(Instr::StoreLocal(local));
            }
            Stmt::AddLocaleProperty {
                variable,
                key,
                target,
                retain,
            } => {
                let local = builder.get_local(variable).ok_or_else(|| CompileError::InternalError {
                    message: format!("locale object '{}' used before registration", variable),
                })?;
                builder.emit(Instr::LoadLocal(local));
                builder.emit(Instr::AddLocaleProperty {
                    key: key.clone(),
                    target: target.clone(),
                    retain: *retain,
                });
            }
        }
        Ok(())
    }
}

fn lower_operand(builder: &mut MethodBuilder, value: &Operand, params: &[String]) -> CompileResult<()> {
    match value {
        Operand::Value => builder.emit(Instr::LoadArg(0)),
        Operand::Slot(slot) => builder.emit(Instr::LoadField(slot.clone())),
        Operand::Expr(expr) => lower_expr(builder, expr, Scope::instance(params))?,
        Operand::Static { function } => {
            builder.emit(Instr::LoadThis);
            builder.emit(Instr::CallStatic(function.clone()));
        }
        Operand::Method(method) => {
            builder.emit(Instr::LoadThis);
            builder.emit(Instr::CallMethod {
                name: method.clone(),
                argc: 0,
            });
        }
        Operand::Bool(b) => builder.emit(Instr::PushBool(*b)),
        Operand::HelperValue { slot, ty } => {
            let present = builder.new_label();
            let end = builder.new_label();
            builder.emit(Instr::LoadField(slot.clone()));
            builder.emit_jump(Instr::JumpIfNotNull, present);
            builder.emit(Instr::PushDefault(ty.to_string()));
            builder.emit_jump(Instr::Jump, end);
            builder.bind(present);
            builder.emit(Instr::GetProperty("Value".to_string()));
            builder.bind(end);
        }
    }
    Ok(())
}

impl EmitSink for PatchSink {
    type Output = PatchModule;

    fn begin_class(&mut self, header: &ClassHeader) -> CompileResult<()> {
        *self = PatchSink::default();
        self.class = Some(header.name.clone());
        Ok(())
    }

    fn emit_field(&mut self, field: &FieldDecl) -> CompileResult<()> {
        self.edits.push(PatchEdit::AddField {
            name: field.name.clone(),
            ty: field.ty.to_string(),
            role: field.role,
        });
        Ok(())
    }

    fn emit_static(&mut self, function: &StaticFunction) -> CompileResult<()> {
        let params = vec![function.param.clone()];
        let mut builder = MethodBuilder::new(function.name.clone(), 1);
        lower_expr(&mut builder, &function.body, Scope::detached(&params))?;
        builder.emit(Instr::Return);
        self.edits.push(PatchEdit::AddStatic {
            method: builder.build()?,
        });
        Ok(())
    }

    fn declare_hook(&mut self, hook: &HookDecl) -> CompileResult<()> {
        if hook.implemented {
            self.implemented_hooks.insert(hook.name.clone());
        }
        Ok(())
    }

    fn declare_property(&mut self, property: &PropertySig) -> CompileResult<()> {
        if property.synthesized {
            self.edits.push(PatchEdit::AddProperty {
                name: property.name.clone(),
                ty: property.ty.to_string(),
                getter: format!("get_{}", property.name),
            });
        }
        self.properties.insert(property.name.clone(), property.clone());
        Ok(())
    }

    fn begin_method(&mut self, sig: &MethodSig) -> CompileResult<()> {
        if let Some(open) = &self.current {
            return Err(CompileError::InternalError {
                message: format!("method '{}' begun inside '{}'", sig.name, open.sig.name),
            });
        }
        let params: Vec<String> = sig.params.iter().map(|(name, _)| name.clone()).collect();
        self.current = Some(OpenMethod {
            sig: sig.clone(),
            builder: MethodBuilder::new(sig.name.clone(), params.len() as u16),
            params,
        });
        Ok(())
    }

    fn emit_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let Some(mut open) = self.current.take() else {
            return Err(CompileError::StatementOutsideMethod {
                statement: stmt.label().to_string(),
            });
        };
        let result = self.lower_statement(&mut open, stmt);
        self.current = Some(open);
        result
    }

    fn end_method(&mut self) -> CompileResult<()> {
        let Some(OpenMethod { sig, mut builder, .. }) = self.current.take() else {
            return Err(CompileError::InternalError {
                message: "end_method without begin_method".to_string(),
            });
        };
        if !builder.ends_in_return() {
            builder.emit(Instr::ReturnVoid);
        }
        let method = builder.build()?;

        let replaces_declared = match &sig.kind {
            MethodKind::Getter { property } | MethodKind::Setter { property } => {
                self.properties.get(property).map_or(false, |p| !p.synthesized)
            }
            _ => false,
        };
        self.edits.push(if replaces_declared {
            PatchEdit::ReplaceBody { method }
        } else {
            PatchEdit::AddMethod { method }
        });
        Ok(())
    }

    fn redirect_initializer(&mut self, property: &str, setter: &str) -> CompileResult<()> {
        self.edits.push(PatchEdit::RedirectInitializer {
            property: property.to_string(),
            setter: setter.to_string(),
        });
        Ok(())
    }

    fn end_class(&mut self) -> CompileResult<PatchModule> {
        let class = self.class.take().ok_or_else(|| CompileError::InternalError {
            message: "end_class without begin_class".to_string(),
        })?;
        Ok(PatchModule::new(class, std::mem::take(&mut self.edits)))
    }
}
