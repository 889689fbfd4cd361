//! rxweave annotation analysis
//!
//! Turns annotated class declarations into typed [`ClassModel`]s:
//!
//! - **extract**: raw attributes to normalized annotation records
//! - **graph**: source to derived dependency graph, cycle rejection
//! - **commands** / **locale**: command enablement and locale grouping
//! - **diagnostic** / **reporter**: positioned findings with stable codes
//!
//! # Usage
//!
//! ```ignore
//! use rxweave_checker::Analyzer;
//! use rxweave_syntax::DeclarationSet;
//!
//! let set = DeclarationSet::parse("models.rxd", source)?;
//! let analysis = Analyzer::new().analyze(&set);
//! for model in &analysis.models {
//!     println!("{}: {} derived values", model.name, model.derived.len());
//! }
//! ```

pub mod analyzer;
pub mod commands;
pub mod diagnostic;
pub mod error;
pub mod extract;
pub mod graph;
pub mod locale;
pub mod model;
mod names;
pub mod reporter;
pub mod shapes;

pub use analyzer::{Analysis, Analyzer};
pub use diagnostic::{create_files, error_code, Diagnostic, ErrorCode, JsonDiagnostic};
pub use error::{CheckError, EnablementIssue};
pub use extract::{AnnotationRecord, MetadataExtractor};
pub use model::{
    CachePolicy, ClassModel, CommandDescriptor, DerivedId, DerivedPropertyDescriptor, PropertyDescriptor, PropertyId,
    Recompute, StaticFnId,
};
pub use reporter::ValidationReporter;
pub use shapes::{AnnotationKind, ShapeRegistry};
