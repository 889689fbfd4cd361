//! Back-end neutral member fragments.
//!
//! The emitter describes every generated member with these types and hands
//! them to an [`EmitSink`](crate::sink::EmitSink). Statements are written in
//! terms of the class's own vocabulary (slots, properties, hooks, commands),
//! so each back-end decides how a slot is stored and how a notification is
//! raised.

use rxweave_syntax::ast::{Expr, TypeRef};
use serde::{Deserialize, Serialize};

/// The class that receives the generated members.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassHeader {
    pub name: String,
    pub namespace: Option<String>,
    pub usings: Vec<String>,
    pub type_params: Vec<String>,
    pub accessibility: Option<String>,
    pub is_abstract: bool,
}

impl ClassHeader {
    /// `Name` or `Name<T, U>`
    pub fn display_name(&self) -> String {
        if self.type_params.is_empty() {
            self.name.clone()
        } else {
            format!("{}<{}>", self.name, self.type_params.join(", "))
        }
    }
}

/// What a generated field stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldRole {
    /// Backing slot of a mutable property
    PropertySlot,
    /// Cached value of a derived property
    DerivedSlot,
    /// "Has been computed" flag of a lazy derived property
    LazyFlag,
    /// Memoized command instance
    CommandSlot,
}

/// A generated instance field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub role: FieldRole,
    /// Initial value carried over from the property declaration
    pub initializer: Option<Expr>,
}

/// A hoisted pure function, stored as a class-level delegate.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFunction {
    pub name: String,
    pub param: String,
    pub body: Expr,
    pub return_type: TypeRef,
}

/// An `On{P}Changing` / `On{P}Changed` extension hook.
#[derive(Debug, Clone, PartialEq)]
pub struct HookDecl {
    pub name: String,
    pub value_type: TypeRef,
    /// The class provides a body for it
    pub implemented: bool,
}

/// A property whose accessors are generated or replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySig {
    pub name: String,
    pub ty: TypeRef,
    pub accessibility: Option<String>,
    /// Not declared by the class
    pub synthesized: bool,
    pub has_setter: bool,
}

/// Role of a generated method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodKind {
    Getter { property: String },
    Setter { property: String },
    /// `RaiseAndSet{P}`
    RaiseAndSet { property: String },
    /// `Recompute{D}`
    Recompute { property: String },
    CommandGetter { command: String },
    /// The initialization entry point
    Init { is_override: bool },
}

/// Signature of a generated method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub kind: MethodKind,
    pub params: Vec<(String, TypeRef)>,
    /// `None` for void
    pub return_type: Option<TypeRef>,
}

impl MethodSig {
    /// A getter returning `ty`.
    pub fn getter(property: &str, ty: &TypeRef) -> Self {
        MethodSig {
            name: format!("get_{}", property),
            kind: MethodKind::Getter {
                property: property.to_string(),
            },
            params: Vec::new(),
            return_type: Some(ty.clone()),
        }
    }

    /// A setter taking `value`.
    pub fn setter(property: &str, ty: &TypeRef) -> Self {
        MethodSig {
            name: format!("set_{}", property),
            kind: MethodKind::Setter {
                property: property.to_string(),
            },
            params: vec![("value".to_string(), ty.clone())],
            return_type: None,
        }
    }
}

/// Value read by a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// The method's `value` parameter
    Value,
    /// A field of `this`
    Slot(String),
    /// A getter expression evaluated against `this`
    Expr(Expr),
    /// A hoisted function applied to `this`
    Static { function: String },
    /// A zero-argument method of `this`
    Method(String),
    Bool(bool),
    /// `Value` of the observable helper in a slot, or the type's default
    /// while the slot is still empty
    HelperValue { slot: String, ty: TypeRef },
}

/// How a command is constructed on first access.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFactory {
    pub method: String,
    pub argument_type: Option<TypeRef>,
    pub return_type: Option<TypeRef>,
    pub is_async: bool,
    /// Boolean property driving can-execute
    pub enablement: Option<String>,
}

/// One statement of a generated method body.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Return early when `value` equals the slot
    ReturnIfUnchanged { slot: String },
    /// Remember the slot as `oldValue`
    CaptureOld { slot: String },
    RaiseChanging { property: String },
    RaiseChanged { property: String },
    /// Invoke a change hook with `oldValue` and `value`
    CallHook { hook: String },
    /// Store `value` into the slot
    StoreValue { slot: String },
    CallMethod { method: String, pass_value: bool },
    /// Store and notify only when the value differs from the slot
    SetIfChanged { slot: String, value: Operand, property: String },
    Store { slot: String, value: Operand },
    IfUnset { flag: String, then: Vec<Stmt> },
    Return(Operand),
    /// Return the memoized command, creating it on first access
    ReturnCommand { slot: String, factory: CommandFactory },
    /// Register a locale object with a registry and name it `variable`
    RegisterLocaleObject {
        registry: String,
        grouping: Option<String>,
        variable: String,
    },
    AddLocaleProperty {
        variable: String,
        key: String,
        target: String,
        retain: bool,
    },
}

impl Stmt {
    /// Short name used in traces and errors.
    pub fn label(&self) -> &'static str {
        match self {
            Stmt::ReturnIfUnchanged { .. } => "return-if-unchanged",
            Stmt::CaptureOld { .. } => "capture-old",
            Stmt::RaiseChanging { .. } => "raise-changing",
            Stmt::RaiseChanged { .. } => "raise-changed",
            Stmt::CallHook { .. } => "call-hook",
            Stmt::StoreValue { .. } => "store-value",
            Stmt::CallMethod { .. } => "call-method",
            Stmt::SetIfChanged { .. } => "set-if-changed",
            Stmt::Store { .. } => "store",
            Stmt::IfUnset { .. } => "if-unset",
            Stmt::Return(_) => "return",
            Stmt::ReturnCommand { .. } => "return-command",
            Stmt::RegisterLocaleObject { .. } => "register-locale-object",
            Stmt::AddLocaleProperty { .. } => "add-locale-property",
        }
    }
}
