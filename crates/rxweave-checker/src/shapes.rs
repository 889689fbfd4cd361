//! Constructor shapes of the recognized annotations.
//!
//! Positional attribute arguments carry no names; the extractor binds them
//! to parameter names by matching them against these shapes, the same way a
//! compiler resolves an attribute constructor overload.

use rxweave_syntax::ast::AttrValue;
use std::fmt;

/// Annotation kinds the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotationKind {
    /// Notifying mutable property
    Reactive,
    /// Value derived from other properties
    Derived,
    /// Command factory for a method
    Command,
    /// Locale-dependent property
    Localized,
    /// Extra change announcements for other properties
    NotifyFor,
    /// Read-only value fed by an observable helper built at init
    ObservableAsProperty,
}

impl AnnotationKind {
    /// Attribute name as written in declarations.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Reactive => "Reactive",
            AnnotationKind::Derived => "Derived",
            AnnotationKind::Command => "Command",
            AnnotationKind::Localized => "Localized",
            AnnotationKind::NotifyFor => "NotifyFor",
            AnnotationKind::ObservableAsProperty => "ObservableAsProperty",
        }
    }

    /// Look up a kind by attribute name.
    pub fn from_name(name: &str) -> Option<AnnotationKind> {
        let short = name.rsplit('.').next().unwrap_or(name);
        Some(match short {
            "Reactive" => AnnotationKind::Reactive,
            "Derived" => AnnotationKind::Derived,
            "Command" => AnnotationKind::Command,
            "Localized" => AnnotationKind::Localized,
            "NotifyFor" => AnnotationKind::NotifyFor,
            "ObservableAsProperty" => AnnotationKind::ObservableAsProperty,
            _ => return None,
        })
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of an annotation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Bool,
    Str,
    /// Enum constant written as `Enum.Variant`
    Enum {
        name: &'static str,
        variants: &'static [&'static str],
    },
}

impl ArgType {
    /// Whether `value` is a constant of this type.
    pub fn accepts(&self, value: &AttrValue) -> bool {
        match (self, value) {
            (ArgType::Bool, AttrValue::Bool(_)) => true,
            (ArgType::Str, AttrValue::Str(_)) => true,
            (ArgType::Str, AttrValue::Null) => true,
            (ArgType::Enum { name, variants }, AttrValue::Path(path)) => {
                path.len() >= 2
                    && path[path.len() - 2] == *name
                    && variants.contains(&path[path.len() - 1].as_str())
            }
            _ => false,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Bool => f.write_str("bool"),
            ArgType::Str => f.write_str("string"),
            ArgType::Enum { name, .. } => f.write_str(name),
        }
    }
}

/// How many arguments a parameter binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Required,
    Optional,
    /// `params T[]`: binds every remaining positional argument
    Variadic,
}

/// One constructor parameter or settable named property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamShape {
    pub name: &'static str,
    pub ty: ArgType,
    pub arity: Arity,
}

const fn param(name: &'static str, ty: ArgType, arity: Arity) -> ParamShape {
    ParamShape { name, ty, arity }
}

/// Declared shape of one annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationShape {
    pub kind: AnnotationKind,
    /// Constructor overloads in resolution order
    pub constructors: &'static [&'static [ParamShape]],
    /// Named (property-style) arguments
    pub named: &'static [ParamShape],
}

/// Cache policy enum as written in declarations.
pub const CACHE_MODE: ArgType = ArgType::Enum {
    name: "CacheMode",
    variants: &["Disabled", "EagerAtInit", "LazyOnFirstAccess"],
};

const REACTIVE: AnnotationShape = AnnotationShape {
    kind: AnnotationKind::Reactive,
    constructors: &[&[], &[param("Check", ArgType::Bool, Arity::Required)]],
    named: &[param("Check", ArgType::Bool, Arity::Optional)],
};

const DERIVED: AnnotationShape = AnnotationShape {
    kind: AnnotationKind::Derived,
    constructors: &[
        &[param("Sources", ArgType::Str, Arity::Variadic)],
        &[
            param("CacheMode", CACHE_MODE, Arity::Required),
            param("Sources", ArgType::Str, Arity::Variadic),
        ],
    ],
    named: &[
        param("CacheMode", CACHE_MODE, Arity::Optional),
        param("NotifyOnInitialValue", ArgType::Bool, Arity::Optional),
        param("Property", ArgType::Str, Arity::Optional),
    ],
};

const COMMAND: AnnotationShape = AnnotationShape {
    kind: AnnotationKind::Command,
    constructors: &[&[]],
    named: &[param("CanExecute", ArgType::Str, Arity::Optional)],
};

const LOCALIZED: AnnotationShape = AnnotationShape {
    kind: AnnotationKind::Localized,
    constructors: &[&[
        param("ResourceName", ArgType::Str, Arity::Required),
        param("KeyPropertyName", ArgType::Str, Arity::Required),
        param("ObjectName", ArgType::Str, Arity::Optional),
        param("Retain", ArgType::Bool, Arity::Optional),
    ]],
    named: &[
        param("ObjectName", ArgType::Str, Arity::Optional),
        param("Retain", ArgType::Bool, Arity::Optional),
    ],
};

const NOTIFY_FOR: AnnotationShape = AnnotationShape {
    kind: AnnotationKind::NotifyFor,
    constructors: &[&[param("Targets", ArgType::Str, Arity::Variadic)]],
    named: &[],
};

const OBSERVABLE_AS_PROPERTY: AnnotationShape = AnnotationShape {
    kind: AnnotationKind::ObservableAsProperty,
    constructors: &[&[]],
    named: &[],
};

/// Lookup of annotation shapes by attribute name.
#[derive(Debug, Clone)]
pub struct ShapeRegistry {
    shapes: Vec<AnnotationShape>,
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self {
            shapes: vec![REACTIVE, DERIVED, COMMAND, LOCALIZED, NOTIFY_FOR, OBSERVABLE_AS_PROPERTY],
        }
    }
}

impl ShapeRegistry {
    /// Registry of the built-in annotations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape for an attribute name, if it is one of ours.
    pub fn lookup(&self, name: &str) -> Option<&AnnotationShape> {
        let kind = AnnotationKind::from_name(name)?;
        self.shapes.iter().find(|shape| shape.kind == kind)
    }
}

impl AnnotationShape {
    /// Largest positional argument count any constructor accepts.
    pub fn max_positional(&self) -> Option<usize> {
        let mut max = 0;
        for ctor in self.constructors {
            if ctor.iter().any(|p| p.arity == Arity::Variadic) {
                return None;
            }
            max = max.max(ctor.len());
        }
        Some(max)
    }

    /// Bind positional arguments to parameter names using the first
    /// constructor that accepts them.
    pub fn bind_positional(&self, values: &[AttrValue]) -> Option<Vec<(String, AttrValue)>> {
        self.constructors.iter().find_map(|ctor| bind_constructor(ctor, values))
    }

    /// Declared named argument.
    pub fn named_param(&self, name: &str) -> Option<&ParamShape> {
        self.named.iter().find(|p| p.name == name)
    }
}

fn bind_constructor(ctor: &[ParamShape], values: &[AttrValue]) -> Option<Vec<(String, AttrValue)>> {
    let mut bound = Vec::with_capacity(ctor.len());
    let mut next = 0;

    for param in ctor {
        match param.arity {
            Arity::Required => {
                let value = values.get(next)?;
                if !param.ty.accepts(value) {
                    return None;
                }
                bound.push((param.name.to_string(), value.clone()));
                next += 1;
            }
            Arity::Optional => {
                let Some(value) = values.get(next) else {
                    continue;
                };
                if !param.ty.accepts(value) {
                    return None;
                }
                bound.push((param.name.to_string(), value.clone()));
                next += 1;
            }
            Arity::Variadic => {
                let rest = &values[next.min(values.len())..];
                if !rest.iter().all(|v| param.ty.accepts(v)) {
                    return None;
                }
                bound.push((param.name.to_string(), AttrValue::Array(rest.to_vec())));
                next = values.len();
            }
        }
    }

    if next == values.len() {
        Some(bound)
    } else {
        None
    }
}
