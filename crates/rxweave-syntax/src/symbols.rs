//! Read-only symbol table over parsed declarations.
//!
//! The analysis pipeline never touches the parser directly; it asks a
//! [`SymbolTable`] for classes, members, and the structural facts that decide
//! whether a class is processed at all.

use crate::ast::{ClassDecl, Modifier, SourceFile};
use crate::parser::parse_source;
use crate::SyntaxError;
use rustc_hash::FxHashMap;

/// Naming conventions that identify reactive classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactiveConventions {
    /// Interface marking a class as a valid extension point
    pub interface: String,
    /// Base type owning the virtual initialization hook
    pub extensible_base: String,
    /// Name of the generated initialization entry point
    pub init_method: String,
}

impl Default for ReactiveConventions {
    fn default() -> Self {
        Self {
            interface: "IReactiveObject".to_string(),
            extensible_base: "ReactiveObjectBase".to_string(),
            init_method: "InitializeReactiveObject".to_string(),
        }
    }
}

/// Structural facts and declarations supplied to the analysis pipeline.
pub trait SymbolTable {
    /// Display name of the declaration source (usually a path).
    fn source_name(&self) -> &str;

    /// Full source text, for diagnostics.
    fn source_text(&self) -> &str;

    /// `using` directives in effect for every class.
    fn usings(&self) -> &[String];

    /// Enclosing namespace.
    fn namespace(&self) -> Option<&str>;

    /// Classes in declaration order.
    fn classes(&self) -> &[ClassDecl];

    /// Find a class by name.
    fn class(&self, name: &str) -> Option<&ClassDecl>;

    /// Naming conventions used to classify classes.
    fn conventions(&self) -> &ReactiveConventions;

    /// Whether the class implements the reactive interface (or derives from
    /// the extensible base, which implements it).
    fn is_extension_point(&self, class: &ClassDecl) -> bool {
        let conventions = self.conventions();
        class.derives_from(&conventions.interface) || class.derives_from(&conventions.extensible_base)
    }

    /// Whether members may be added to the class (it is `partial`).
    fn is_open_for_extension(&self, class: &ClassDecl) -> bool {
        class.has_modifier(Modifier::Partial)
    }

    /// Whether the class derives from the base owning the virtual init hook.
    fn derives_extensible_base(&self, class: &ClassDecl) -> bool {
        class.derives_from(&self.conventions().extensible_base)
    }
}

/// A symbol table backed by one parsed declaration file.
#[derive(Debug, Clone)]
pub struct DeclarationSet {
    name: String,
    source: String,
    file: SourceFile,
    by_name: FxHashMap<String, usize>,
    conventions: ReactiveConventions,
}

impl DeclarationSet {
    /// Parse `source` and index its classes.
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Result<Self, SyntaxError> {
        let name = name.into();
        let source = source.into();
        let file = parse_source(&source)?;
        tracing::debug!(source = %name, classes = file.classes.len(), "parsed declarations");
        Ok(Self::from_file(name, source, file))
    }

    /// Wrap an already-parsed file.
    pub fn from_file(name: impl Into<String>, source: impl Into<String>, file: SourceFile) -> Self {
        let by_name = file
            .classes
            .iter()
            .enumerate()
            .map(|(i, class)| (class.name.clone(), i))
            .collect();
        Self {
            name: name.into(),
            source: source.into(),
            file,
            by_name,
            conventions: ReactiveConventions::default(),
        }
    }

    /// Replace the naming conventions.
    pub fn with_conventions(mut self, conventions: ReactiveConventions) -> Self {
        self.conventions = conventions;
        self
    }

    /// The parsed file.
    pub fn file(&self) -> &SourceFile {
        &self.file
    }
}

impl SymbolTable for DeclarationSet {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn source_text(&self) -> &str {
        &self.source
    }

    fn usings(&self) -> &[String] {
        &self.file.usings
    }

    fn namespace(&self) -> Option<&str> {
        self.file.namespace.as_deref()
    }

    fn classes(&self) -> &[ClassDecl] {
        &self.file.classes
    }

    fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.by_name.get(name).map(|&i| &self.file.classes[i])
    }

    fn conventions(&self) -> &ReactiveConventions {
        &self.conventions
    }
}
