//! rxweave Compiler - ClassModel to generated members
//!
//! One emission pipeline ([`CodeEmitter`]) drives two back-ends through the
//! [`EmitSink`] trait:
//!
//! - [`SourceSink`] renders a C# partial class per model
//! - [`PatchSink`] lowers to a stack-machine [`PatchModule`]
//!
//! Both receive the same fragments, so the generated members behave the same
//! whichever back-end materializes them.

pub mod emitter;
pub mod error;
pub mod fragment;
pub mod patch;
pub mod sink;
pub mod source;

pub use emitter::{emit_class, CodeEmitter, EmitStage};
pub use error::{CompileError, CompileResult};
pub use patch::{PatchEdit, PatchMethod, PatchModule, PatchSink, PrettyPrint};
pub use sink::EmitSink;
pub use source::{GeneratedUnit, SourceSink};

use rxweave_checker::ClassModel;

/// Generate the source unit for one class.
pub fn compile_source(model: &ClassModel) -> CompileResult<GeneratedUnit> {
    emit_class(model, &mut SourceSink::new())
}

/// Generate the patch module for one class.
pub fn compile_patch(model: &ClassModel) -> CompileResult<PatchModule> {
    emit_class(model, &mut PatchSink::new())
}
