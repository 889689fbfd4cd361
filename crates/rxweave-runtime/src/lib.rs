//! rxweave runtime
//!
//! Loads [`PatchModule`]s onto class images and executes them, recording
//! change notifications in order. This is how patch output is verified
//! without a managed host:
//!
//! ```ignore
//! let mut image = ClassImage::baseline(class, set.conventions())?;
//! image.apply(&compile_patch(&model)?)?;
//! let mut vm = Vm::new();
//! vm.load(image);
//! let account = vm.instantiate("Account")?;
//! vm.set(account, "Name", "ada")?;
//! for event in vm.take_events() { println!("{:?}", event); }
//! ```

pub mod builtins;
pub mod error;
pub mod image;
pub mod value;
pub mod vm;

pub use error::{RuntimeError, RuntimeResult};
pub use image::{ClassImage, InitTarget, PropertyDef};
pub use value::{CommandId, LocaleId, ObjectId, Value};
pub use vm::{CommandState, Event, LocaleBinding, LocaleRegistration, Vm};

use rxweave_compiler::PatchModule;
use rxweave_syntax::{ClassDecl, ReactiveConventions};

/// Baseline image of `class` with `module` applied.
pub fn patched_image(
    class: &ClassDecl,
    conventions: &ReactiveConventions,
    module: &PatchModule,
) -> RuntimeResult<ClassImage> {
    let mut image = ClassImage::baseline(class, conventions)?;
    image.apply(module)?;
    Ok(image)
}
