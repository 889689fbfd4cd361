//! Notification-recording interpreter.
//!
//! Runs patched class images and records every change notification, hook
//! call and command enablement change in order, so behavior can be asserted
//! against the event log.

use crate::builtins;
use crate::error::{RuntimeError, RuntimeResult};
use crate::image::{ClassImage, InitTarget};
use crate::value::{CommandId, LocaleId, ObjectId, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use rxweave_compiler::patch::{CommandSpec, Instr, PatchMethod};
use std::rc::Rc;

/// Maximum nested method calls
const MAX_CALL_DEPTH: usize = 256;

/// Observable effects, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Changing { object: ObjectId, property: String },
    Changed { object: ObjectId, property: String },
    Hook { object: ObjectId, hook: String, args: Vec<Value> },
    /// A method without a body was called
    Invoked { object: ObjectId, method: String, args: Vec<Value> },
    CanExecuteChanged { command: CommandId, can_execute: bool },
}

/// A live command object.
#[derive(Debug, Clone)]
pub struct CommandState {
    pub owner: ObjectId,
    pub spec: CommandSpec,
    pub enabled: bool,
}

/// One key to target binding of a locale registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleBinding {
    pub key: String,
    pub target: String,
    pub retain: bool,
}

/// An instance registered with a locale registry.
#[derive(Debug, Clone)]
pub struct LocaleRegistration {
    pub registry: String,
    pub grouping: Option<String>,
    pub owner: ObjectId,
    pub bindings: Vec<LocaleBinding>,
}

struct Instance {
    class: Rc<ClassImage>,
    fields: FxHashMap<String, Value>,
}

/// What the caller does with a callee's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Push,
    Discard,
}

/// One activation on the explicit call stack.
struct CallFrame {
    method: Rc<PatchMethod>,
    this: ObjectId,
    args: Vec<Value>,
    ip: usize,
    stack: Vec<Value>,
    locals: Vec<Value>,
    resume: Resume,
}

impl CallFrame {
    fn new(method: Rc<PatchMethod>, this: ObjectId, args: Vec<Value>, resume: Resume) -> Self {
        let locals = vec![Value::Null; method.local_count as usize];
        Self {
            method,
            this,
            args,
            ip: 0,
            stack: Vec::new(),
            locals,
            resume,
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> RuntimeResult<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn peek(&self) -> RuntimeResult<&Value> {
        self.stack.last().ok_or(RuntimeError::StackUnderflow)
    }

    fn pop_args(&mut self, argc: u8) -> RuntimeResult<Vec<Value>> {
        let argc = argc as usize;
        if self.stack.len() < argc {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(self.stack.split_off(self.stack.len() - argc))
    }

    fn pop_bool(&mut self) -> RuntimeResult<bool> {
        let value = self.pop()?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeError::TypeError(format!("expected bool, got {}", value.type_name())))
    }

    fn local(&self, index: u16) -> RuntimeResult<Value> {
        self.locals
            .get(index as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::TypeError(format!("local {} out of range", index)))
    }

    fn arg(&self, index: u16) -> RuntimeResult<Value> {
        self.args
            .get(index as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::TypeError(format!("{} has no argument {}", self.method.name, index)))
    }
}

/// Outcome of one instruction.
enum Flow {
    Next,
    Call(CallFrame),
    Return(Value),
}

/// A resolved member call.
enum Dispatch {
    Enter(Rc<PatchMethod>, Vec<Value>),
    Done(Value),
}

/// The interpreter.
#[derive(Default)]
pub struct Vm {
    classes: FxHashMap<String, Rc<ClassImage>>,
    objects: Vec<Instance>,
    commands: Vec<CommandState>,
    locales: Vec<LocaleRegistration>,
    events: Vec<Event>,
    refreshing: FxHashSet<CommandId>,
    depth: usize,
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a class available to [`Vm::instantiate`].
    pub fn load(&mut self, image: ClassImage) {
        tracing::debug!(class = %image.name, "class loaded");
        self.classes.insert(image.name.clone(), Rc::new(image));
    }

    /// Construct an instance: fields take their defaults, initializers run,
    /// then the init method runs if the class derives the extensible base.
    pub fn instantiate(&mut self, class: &str) -> RuntimeResult<ObjectId> {
        let image = self
            .classes
            .get(class)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownClass(class.to_string()))?;

        let fields = image
            .fields
            .iter()
            .map(|(name, ty)| (name.clone(), Value::default_for(ty)))
            .collect();
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(Instance {
            class: image.clone(),
            fields,
        });

        for init in &image.initializers {
            let value = self.run(init.code.clone(), id, Vec::new())?;
            match &init.target {
                InitTarget::Field(field) => self.store_field(id, field, value)?,
                InitTarget::Setter(setter) => {
                    self.invoke(id, setter, vec![value])?;
                }
            }
        }

        if image.derives_base && image.methods.contains_key(&image.init_method) {
            self.invoke(id, &image.init_method, Vec::new())?;
        }
        tracing::trace!(class, object = id.0, "instantiated");
        Ok(id)
    }

    /// Read a property through its getter.
    pub fn get(&mut self, object: ObjectId, property: &str) -> RuntimeResult<Value> {
        let getter = self.accessor(object, property, |p| p.getter.clone())?;
        self.invoke(object, &getter, Vec::new())
    }

    /// Write a property through its setter.
    pub fn set(&mut self, object: ObjectId, property: &str, value: impl Into<Value>) -> RuntimeResult<()> {
        let setter = self.accessor(object, property, |p| p.setter.clone())?;
        self.invoke(object, &setter, vec![value.into()])?;
        Ok(())
    }

    /// Call a method by name.
    pub fn call(&mut self, object: ObjectId, method: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        self.invoke(object, method, args)
    }

    /// The command exposed by `property`.
    pub fn command(&mut self, object: ObjectId, property: &str) -> RuntimeResult<CommandId> {
        match self.get(object, property)? {
            Value::Command(id) => Ok(id),
            other => Err(RuntimeError::TypeError(format!(
                "'{}' is {}, not a command",
                property,
                other.type_name()
            ))),
        }
    }

    pub fn can_execute(&self, command: CommandId) -> RuntimeResult<bool> {
        Ok(self.command_state(command)?.enabled)
    }

    /// Run a command's method if it is enabled.
    pub fn execute(&mut self, command: CommandId, argument: Option<Value>) -> RuntimeResult<Value> {
        let state = self.command_state(command)?.clone();
        if !state.enabled {
            return Err(RuntimeError::CommandDisabled(command.0));
        }
        let args = match (state.spec.takes_argument, argument) {
            (true, Some(arg)) => vec![arg],
            (true, None) => vec![Value::Null],
            (false, _) => Vec::new(),
        };
        self.invoke(state.owner, &state.spec.method, args)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn locale_registrations(&self) -> &[LocaleRegistration] {
        &self.locales
    }

    /// Raw field value, bypassing accessors.
    pub fn field(&self, object: ObjectId, name: &str) -> Option<&Value> {
        self.objects.get(object.0 as usize)?.fields.get(name)
    }

    fn instance(&self, object: ObjectId) -> RuntimeResult<&Instance> {
        self.objects
            .get(object.0 as usize)
            .ok_or(RuntimeError::InvalidObject(object.0))
    }

    fn command_state(&self, command: CommandId) -> RuntimeResult<&CommandState> {
        self.commands
            .get(command.0 as usize)
            .ok_or_else(|| RuntimeError::TypeError(format!("invalid command handle {}", command.0)))
    }

    fn accessor(
        &self,
        object: ObjectId,
        property: &str,
        pick: impl Fn(&crate::image::PropertyDef) -> Option<String>,
    ) -> RuntimeResult<String> {
        let class = &self.instance(object)?.class;
        class
            .property(property)
            .and_then(pick)
            .ok_or_else(|| RuntimeError::UnknownMember {
                class: class.name.clone(),
                member: property.to_string(),
            })
    }

    fn store_field(&mut self, object: ObjectId, field: &str, value: Value) -> RuntimeResult<()> {
        let instance = self
            .objects
            .get_mut(object.0 as usize)
            .ok_or(RuntimeError::InvalidObject(object.0))?;
        instance.fields.insert(field.to_string(), value);
        Ok(())
    }

    fn load_field(&self, object: ObjectId, field: &str) -> RuntimeResult<Value> {
        let instance = self.instance(object)?;
        instance
            .fields
            .get(field)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownMember {
                class: instance.class.name.clone(),
                member: field.to_string(),
            })
    }

    /// Resolve `name` on `object`. Calls without a body finish immediately.
    fn dispatch(&mut self, object: ObjectId, name: &str, args: Vec<Value>) -> RuntimeResult<Dispatch> {
        let class = self.instance(object)?.class.clone();
        if let Some(method) = class.methods.get(name) {
            return Ok(Dispatch::Enter(method.clone(), args));
        }
        if class.externs.contains(name) {
            self.events.push(Event::Invoked {
                object,
                method: name.to_string(),
                args,
            });
            return Ok(Dispatch::Done(Value::Null));
        }
        if let Some(reason) = class.opaque.get(name) {
            return Err(RuntimeError::OpaqueBody {
                method: name.to_string(),
                reason: reason.clone(),
            });
        }
        Err(RuntimeError::UnknownMember {
            class: class.name.clone(),
            member: name.to_string(),
        })
    }

    fn invoke(&mut self, object: ObjectId, name: &str, args: Vec<Value>) -> RuntimeResult<Value> {
        match self.dispatch(object, name, args)? {
            Dispatch::Enter(method, args) => self.run(method, object, args),
            Dispatch::Done(value) => Ok(value),
        }
    }

    /// Call from inside a running frame: either a new frame, or the value
    /// pushed onto `caller` right away.
    fn call_from(
        &mut self,
        caller: &mut CallFrame,
        object: ObjectId,
        name: &str,
        args: Vec<Value>,
        resume: Resume,
    ) -> RuntimeResult<Flow> {
        match self.dispatch(object, name, args)? {
            Dispatch::Enter(method, args) => Ok(Flow::Call(CallFrame::new(method, object, args, resume))),
            Dispatch::Done(value) => {
                if resume == Resume::Push {
                    caller.push(value);
                }
                Ok(Flow::Next)
            }
        }
    }

    fn push_frame(&mut self, frames: &mut Vec<CallFrame>, frame: CallFrame) -> RuntimeResult<()> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow);
        }
        self.depth += 1;
        frames.push(frame);
        Ok(())
    }

    /// Run `method` to completion. Nested calls are frames on a heap stack,
    /// so call depth is bounded by [`MAX_CALL_DEPTH`] and not by the thread.
    fn run(&mut self, method: Rc<PatchMethod>, this: ObjectId, args: Vec<Value>) -> RuntimeResult<Value> {
        let base = self.depth;
        let result = self.run_frames(CallFrame::new(method, this, args, Resume::Push));
        self.depth = base;
        result
    }

    fn run_frames(&mut self, entry: CallFrame) -> RuntimeResult<Value> {
        let mut frames = Vec::new();
        self.push_frame(&mut frames, entry)?;

        loop {
            let Some(frame) = frames.last_mut() else {
                return Ok(Value::Null);
            };
            let method = frame.method.clone();
            let flow = match method.code.get(frame.ip) {
                Some(instr) => {
                    frame.ip += 1;
                    self.step(frame, instr)?
                }
                None => Flow::Return(Value::Null),
            };

            match flow {
                Flow::Next => {}
                Flow::Call(callee) => self.push_frame(&mut frames, callee)?,
                Flow::Return(value) => {
                    self.depth -= 1;
                    let resume = frames.pop().map(|done| done.resume);
                    match frames.last_mut() {
                        Some(caller) => {
                            if resume == Some(Resume::Push) {
                                caller.push(value);
                            }
                        }
                        None => return Ok(value),
                    }
                }
            }
        }
    }

    fn step(&mut self, frame: &mut CallFrame, instr: &Instr) -> RuntimeResult<Flow> {
        let this = frame.this;
        match instr {
            Instr::PushNull => frame.push(Value::Null),
            Instr::PushBool(b) => frame.push(Value::Bool(*b)),
            Instr::PushInt(i) => frame.push(Value::Int(*i)),
            Instr::PushFloat(x) => frame.push(Value::Float(*x)),
            Instr::PushStr(s) => frame.push(Value::Str(s.clone())),
            Instr::PushDefault(ty) => frame.push(Value::default_for(ty)),
            Instr::LoadThis => frame.push(Value::Object(this)),
            Instr::LoadArg(index) => {
                let arg = frame.arg(*index)?;
                frame.push(arg);
            }
            Instr::LoadLocal(index) => {
                let value = frame.local(*index)?;
                frame.push(value);
            }
            Instr::StoreLocal(index) => {
                let value = frame.pop()?;
                let slot = frame
                    .locals
                    .get_mut(*index as usize)
                    .ok_or_else(|| RuntimeError::TypeError(format!("local {} out of range", index)))?;
                *slot = value;
            }
            Instr::LoadField(field) => frame.push(self.load_field(this, field)?),
            Instr::StoreField(field) => {
                let value = frame.pop()?;
                self.store_field(this, field, value)?;
            }
            Instr::GetProperty(name) => match frame.pop()? {
                Value::Object(object) => {
                    let getter = self.accessor(object, name, |p| p.getter.clone())?;
                    return self.call_from(frame, object, &getter, Vec::new(), Resume::Push);
                }
                Value::Str(s) => frame.push(builtins::string_member(&s, name, &[])?),
                other => {
                    return Err(RuntimeError::TypeError(format!(
                        "cannot read '{}' of {}",
                        name,
                        other.type_name()
                    )))
                }
            },
            Instr::CallMethod { name, argc } => {
                let call_args = frame.pop_args(*argc)?;
                match frame.pop()? {
                    Value::Object(object) => return self.call_from(frame, object, name, call_args, Resume::Push),
                    Value::Str(s) => frame.push(builtins::string_member(&s, name, &call_args)?),
                    other => {
                        return Err(RuntimeError::TypeError(format!(
                            "cannot call '{}' on {}",
                            name,
                            other.type_name()
                        )))
                    }
                }
            }
            Instr::CallHook { name, argc } => {
                let hook_args = frame.pop_args(*argc)?;
                self.events.push(Event::Hook {
                    object: this,
                    hook: name.clone(),
                    args: hook_args.clone(),
                });
                let implemented = self.instance(this)?.class.methods.contains_key(name);
                if implemented {
                    return self.call_from(frame, this, name, hook_args, Resume::Discard);
                }
            }
            Instr::CallStatic(name) => {
                let target = match frame.pop()? {
                    Value::Object(object) => object,
                    other => {
                        return Err(RuntimeError::TypeError(format!(
                            "static '{}' applied to {}",
                            name,
                            other.type_name()
                        )))
                    }
                };
                let class = self.instance(target)?.class.clone();
                let function = class.statics.get(name).ok_or_else(|| RuntimeError::UnknownMember {
                    class: class.name.clone(),
                    member: name.to_string(),
                })?;
                let args = vec![Value::Object(target)];
                return Ok(Flow::Call(CallFrame::new(function.clone(), target, args, Resume::Push)));
            }
            Instr::CallHost { name, argc } => {
                let host_args = frame.pop_args(*argc)?;
                frame.push(builtins::call_host(name, &host_args)?);
            }
            Instr::Unary(op) => {
                let value = frame.pop()?;
                frame.push(builtins::unary(*op, value)?);
            }
            Instr::Binary(op) => {
                let right = frame.pop()?;
                let left = frame.pop()?;
                frame.push(builtins::binary(*op, left, right)?);
            }
            Instr::Dup => {
                let value = frame.peek()?.clone();
                frame.push(value);
            }
            Instr::Pop => {
                frame.pop()?;
            }
            Instr::Jump(target) => frame.ip = *target,
            Instr::JumpIfFalse(target) => {
                if !frame.pop_bool()? {
                    frame.ip = *target;
                }
            }
            Instr::JumpIfTrue(target) => {
                if frame.pop_bool()? {
                    frame.ip = *target;
                }
            }
            Instr::JumpIfNotNull(target) => {
                if frame.peek()?.is_null() {
                    frame.pop()?;
                } else {
                    frame.ip = *target;
                }
            }
            Instr::RaiseChanging(property) => self.events.push(Event::Changing {
                object: this,
                property: property.clone(),
            }),
            Instr::RaiseChanged(property) => {
                self.events.push(Event::Changed {
                    object: this,
                    property: property.clone(),
                });
                self.refresh_commands(this, property)?;
            }
            Instr::NewCommand(spec) => {
                let command = self.new_command(this, spec)?;
                frame.push(Value::Command(command));
            }
            Instr::RegisterLocale { registry, grouping } => {
                let id = LocaleId(self.locales.len() as u32);
                self.locales.push(LocaleRegistration {
                    registry: registry.clone(),
                    grouping: grouping.clone(),
                    owner: this,
                    bindings: Vec::new(),
                });
                frame.push(Value::Locale(id));
            }
            Instr::AddLocaleProperty { key, target, retain } => {
                let Value::Locale(id) = frame.pop()? else {
                    return Err(RuntimeError::TypeError("expected a locale registration".to_string()));
                };
                let registration = self
                    .locales
                    .get_mut(id.0 as usize)
                    .ok_or_else(|| RuntimeError::TypeError(format!("invalid locale handle {}", id.0)))?;
                registration.bindings.push(LocaleBinding {
                    key: key.clone(),
                    target: target.clone(),
                    retain: *retain,
                });
            }
            Instr::Return => return Ok(Flow::Return(frame.pop()?)),
            Instr::ReturnVoid => return Ok(Flow::Return(Value::Null)),
        }
        Ok(Flow::Next)
    }

    fn new_command(&mut self, owner: ObjectId, spec: &CommandSpec) -> RuntimeResult<CommandId> {
        let enabled = match &spec.can_execute {
            Some(property) => self.enablement(owner, property)?,
            None => true,
        };
        let id = CommandId(self.commands.len() as u32);
        self.commands.push(CommandState {
            owner,
            spec: spec.clone(),
            enabled,
        });
        tracing::trace!(command = id.0, method = %spec.method, enabled, "command created");
        Ok(id)
    }

    fn enablement(&mut self, owner: ObjectId, property: &str) -> RuntimeResult<bool> {
        let value = self.get(owner, property)?;
        value.as_bool().ok_or_else(|| {
            RuntimeError::TypeError(format!("'{}' gates a command but is {}", property, value.type_name()))
        })
    }

    /// Re-evaluate commands gated on `property` of `object`.
    fn refresh_commands(&mut self, object: ObjectId, property: &str) -> RuntimeResult<()> {
        let gated: Vec<CommandId> = self
            .commands
            .iter()
            .enumerate()
            .filter(|(_, c)| c.owner == object && c.spec.can_execute.as_deref() == Some(property))
            .map(|(i, _)| CommandId(i as u32))
            .collect();

        for command in gated {
            if !self.refreshing.insert(command) {
                continue;
            }
            let result = self.enablement(object, property);
            self.refreshing.remove(&command);
            let can_execute = result?;

            let state = &mut self.commands[command.0 as usize];
            if state.enabled != can_execute {
                state.enabled = can_execute;
                self.events.push(Event::CanExecuteChanged { command, can_execute });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxweave_syntax::{parse_source, ReactiveConventions};

    fn vm_with(source: &str) -> (Vm, String) {
        let file = parse_source(source).unwrap();
        let image = ClassImage::baseline(&file.classes[0], &ReactiveConventions::default()).unwrap();
        let name = image.name.clone();
        let mut vm = Vm::new();
        vm.load(image);
        (vm, name)
    }

    #[test]
    fn test_unpatched_auto_property() {
        let (mut vm, class) = vm_with("partial class A { int X { get; set; } = 4; int Twice => X * 2; }");
        let a = vm.instantiate(&class).unwrap();
        assert_eq!(vm.get(a, "Twice").unwrap(), Value::Int(8));
        vm.set(a, "X", 5i64).unwrap();
        assert_eq!(vm.get(a, "Twice").unwrap(), Value::Int(10));
        assert!(vm.events().is_empty());
    }

    #[test]
    fn test_extern_call_is_recorded() {
        let (mut vm, class) = vm_with("partial class A { void Ping(int n); int Go() => Ping(3); }");
        let a = vm.instantiate(&class).unwrap();
        vm.call(a, "Go", Vec::new()).unwrap();
        assert_eq!(
            vm.events(),
            &[Event::Invoked {
                object: a,
                method: "Ping".into(),
                args: vec![Value::Int(3)],
            }]
        );
    }

    #[test]
    fn test_opaque_body_errors() {
        let (mut vm, class) = vm_with("partial class A { int X { get; set; } bool Z => this.To(static x => x.X == 0); }");
        let a = vm.instantiate(&class).unwrap();
        assert!(matches!(vm.get(a, "Z"), Err(RuntimeError::OpaqueBody { .. })));
    }

    #[test]
    fn test_unbounded_recursion_overflows() {
        let (mut vm, class) = vm_with("partial class A { int Loop() => Loop(); }");
        let a = vm.instantiate(&class).unwrap();
        assert!(matches!(vm.call(a, "Loop", Vec::new()), Err(RuntimeError::StackOverflow)));
    }

    #[test]
    fn test_mutual_getter_recursion_on_small_thread() {
        // Far less native stack than MAX_CALL_DEPTH nested Rust calls would need
        let worker = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let (mut vm, class) = vm_with("partial class A { int P => Q; int Q => P; }");
                let a = vm.instantiate(&class).unwrap();
                matches!(vm.get(a, "P"), Err(RuntimeError::StackOverflow))
            })
            .unwrap();
        assert!(worker.join().unwrap());
    }

    #[test]
    fn test_depth_resets_after_overflow() {
        let (mut vm, class) = vm_with("partial class A { int Loop() => Loop(); int One() => 1; }");
        let a = vm.instantiate(&class).unwrap();
        assert!(vm.call(a, "Loop", Vec::new()).is_err());
        assert_eq!(vm.call(a, "One", Vec::new()).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_unknown_class() {
        let mut vm = Vm::new();
        assert!(matches!(vm.instantiate("Nope"), Err(RuntimeError::UnknownClass(_))));
    }
}
