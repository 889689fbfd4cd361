//! Emission sink trait.

use crate::error::CompileResult;
use crate::fragment::{ClassHeader, FieldDecl, HookDecl, MethodSig, PropertySig, StaticFunction, Stmt};

/// Receives the fragments of one class, in emission order.
///
/// Every class is bracketed by [`begin_class`](EmitSink::begin_class) and
/// [`end_class`](EmitSink::end_class). Statements are only emitted between
/// [`begin_method`](EmitSink::begin_method) and
/// [`end_method`](EmitSink::end_method).
pub trait EmitSink {
    /// Finished product of the sink.
    type Output;

    fn begin_class(&mut self, header: &ClassHeader) -> CompileResult<()>;

    fn emit_field(&mut self, field: &FieldDecl) -> CompileResult<()>;

    fn emit_static(&mut self, function: &StaticFunction) -> CompileResult<()>;

    fn declare_hook(&mut self, hook: &HookDecl) -> CompileResult<()>;

    /// Announce a property before its accessors are emitted.
    fn declare_property(&mut self, property: &PropertySig) -> CompileResult<()>;

    fn begin_method(&mut self, sig: &MethodSig) -> CompileResult<()>;

    fn emit_statement(&mut self, stmt: &Stmt) -> CompileResult<()>;

    fn end_method(&mut self) -> CompileResult<()>;

    /// Route the declared initializer of `property` through its setter.
    fn redirect_initializer(&mut self, _property: &str, _setter: &str) -> CompileResult<()> {
        Ok(())
    }

    fn end_class(&mut self) -> CompileResult<Self::Output>;
}
