//! Patch instruction set.
//!
//! A small stack machine. Every instruction that reads the instance works
//! on `this` unless it pops an explicit receiver. Jump targets are absolute
//! instruction indices, resolved when a method is built.

use rxweave_syntax::ast::{BinaryOp, UnaryOp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    Neg,
}

impl From<UnaryOp> for UnOp {
    fn from(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Not => UnOp::Not,
            UnaryOp::Negate => UnOp::Neg,
        }
    }
}

/// Strict binary operators. `&&`, `||` and `??` lower to jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    /// The strict counterpart of a source operator.
    pub fn from_source(op: BinaryOp) -> Option<BinOp> {
        Some(match op {
            BinaryOp::Add => BinOp::Add,
            BinaryOp::Subtract => BinOp::Sub,
            BinaryOp::Multiply => BinOp::Mul,
            BinaryOp::Divide => BinOp::Div,
            BinaryOp::Modulo => BinOp::Mod,
            BinaryOp::Equal => BinOp::Eq,
            BinaryOp::NotEqual => BinOp::Ne,
            BinaryOp::Less => BinOp::Lt,
            BinaryOp::LessEqual => BinOp::Le,
            BinaryOp::Greater => BinOp::Gt,
            BinaryOp::GreaterEqual => BinOp::Ge,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => return None,
        })
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
        }
    }
}

/// Construction parameters of a command object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Method run on execution
    pub method: String,
    pub takes_argument: bool,
    pub is_async: bool,
    /// Boolean property gating execution
    pub can_execute: Option<String>,
}

/// One instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    PushNull,
    PushBool(bool),
    PushInt(i64),
    PushFloat(f64),
    PushStr(String),
    /// Default value of a declared type
    PushDefault(String),
    LoadThis,
    LoadArg(u16),
    LoadLocal(u16),
    StoreLocal(u16),
    /// Push a field of `this`
    LoadField(String),
    /// Pop a value into a field of `this`
    StoreField(String),
    /// Pop a receiver, push one of its properties
    GetProperty(String),
    /// Pop `argc` arguments and a receiver, push the result
    CallMethod { name: String, argc: u8 },
    /// Call a change hook of `this` with `argc` popped arguments
    CallHook { name: String, argc: u8 },
    /// Pop the instance, apply a hoisted function to it
    CallStatic(String),
    /// Pop `argc` arguments, call a host helper such as `string.IsNullOrEmpty`
    CallHost { name: String, argc: u8 },
    Unary(UnOp),
    Binary(BinOp),
    Dup,
    Pop,
    Jump(usize),
    /// Pop; jump when false
    JumpIfFalse(usize),
    /// Pop; jump when true
    JumpIfTrue(usize),
    /// Peek; jump when not null, otherwise pop
    JumpIfNotNull(usize),
    RaiseChanging(String),
    RaiseChanged(String),
    /// Push a new command bound to `this`
    NewCommand(CommandSpec),
    /// Register `this` with a locale registry and push the registration
    RegisterLocale { registry: String, grouping: Option<String> },
    /// Pop a registration, add a key to target binding to it
    AddLocaleProperty { key: String, target: String, retain: bool },
    Return,
    ReturnVoid,
}

impl Instr {
    /// Jump target, if this is a jump.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Instr::Jump(t) | Instr::JumpIfFalse(t) | Instr::JumpIfTrue(t) | Instr::JumpIfNotNull(t) => Some(*t),
            _ => None,
        }
    }

    /// Rewrite the jump target, if this is a jump.
    pub fn set_jump_target(&mut self, target: usize) {
        if let Instr::Jump(t) | Instr::JumpIfFalse(t) | Instr::JumpIfTrue(t) | Instr::JumpIfNotNull(t) = self {
            *t = target;
        }
    }

    /// Whether execution never falls through to the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instr::Return | Instr::ReturnVoid | Instr::Jump(_))
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::PushNull => write!(f, "push.null"),
            Instr::PushBool(b) => write!(f, "push.bool {}", b),
            Instr::PushInt(i) => write!(f, "push.int {}", i),
            Instr::PushFloat(x) => write!(f, "push.float {:?}", x),
            Instr::PushStr(s) => write!(f, "push.str {:?}", s),
            Instr::PushDefault(ty) => write!(f, "push.default {}", ty),
            Instr::LoadThis => write!(f, "load.this"),
            Instr::LoadArg(i) => write!(f, "load.arg {}", i),
            Instr::LoadLocal(i) => write!(f, "load.local {}", i),
            Instr::StoreLocal(i) => write!(f, "store.local {}", i),
            Instr::LoadField(name) => write!(f, "load.field {}", name),
            Instr::StoreField(name) => write!(f, "store.field {}", name),
            Instr::GetProperty(name) => write!(f, "get.prop {}", name),
            Instr::CallMethod { name, argc } => write!(f, "call {}/{}", name, argc),
            Instr::CallHook { name, argc } => write!(f, "call.hook {}/{}", name, argc),
            Instr::CallStatic(name) => write!(f, "call.static {}", name),
            Instr::CallHost { name, argc } => write!(f, "call.host {}/{}", name, argc),
            Instr::Unary(UnOp::Not) => write!(f, "not"),
            Instr::Unary(UnOp::Neg) => write!(f, "neg"),
            Instr::Binary(op) => write!(f, "{}", op.mnemonic()),
            Instr::Dup => write!(f, "dup"),
            Instr::Pop => write!(f, "pop"),
            Instr::Jump(t) => write!(f, "jmp @{}", t),
            Instr::JumpIfFalse(t) => write!(f, "jmp.false @{}", t),
            Instr::JumpIfTrue(t) => write!(f, "jmp.true @{}", t),
            Instr::JumpIfNotNull(t) => write!(f, "jmp.notnull @{}", t),
            Instr::RaiseChanging(p) => write!(f, "raise.changing {}", p),
            Instr::RaiseChanged(p) => write!(f, "raise.changed {}", p),
            Instr::NewCommand(spec) => {
                write!(f, "new.command {}", spec.method)?;
                if spec.takes_argument {
                    write!(f, " arg")?;
                }
                if spec.is_async {
                    write!(f, " async")?;
                }
                if let Some(p) = &spec.can_execute {
                    write!(f, " when {}", p)?;
                }
                Ok(())
            }
            Instr::RegisterLocale { registry, grouping } => match grouping {
                Some(g) => write!(f, "locale.register {} {}", registry, g),
                None => write!(f, "locale.register {}", registry),
            },
            Instr::AddLocaleProperty { key, target, retain } => {
                write!(f, "locale.add {} -> {}", key, target)?;
                if *retain {
                    write!(f, " retain")?;
                }
                Ok(())
            }
            Instr::Return => write!(f, "ret"),
            Instr::ReturnVoid => write!(f, "ret.void"),
        }
    }
}
