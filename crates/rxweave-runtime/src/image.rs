//! Class images.
//!
//! A [`ClassImage`] is a class as the host compiler would have produced it
//! from the declaration alone: auto properties store into
//! `<Name>k__BackingField`, expression bodies are lowered as written, and
//! methods without a body are external. Bodies the instruction set cannot
//! express (projection lambdas) are kept opaque until a patch replaces them.
//! Patch modules are applied on top.

use crate::error::{RuntimeError, RuntimeResult};
use rustc_hash::{FxHashMap, FxHashSet};
use rxweave_compiler::CompileError;
use rxweave_compiler::patch::{auto_field_name, lower_expr, Instr, MethodBuilder, PatchEdit, PatchMethod, PatchModule, Scope};
use rxweave_syntax::ast::{ClassDecl, Expr, MemberKind};
use rxweave_syntax::ReactiveConventions;
use std::rc::Rc;

/// Accessor methods of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub ty: String,
    pub getter: Option<String>,
    pub setter: Option<String>,
}

/// Where a declared initializer stores its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitTarget {
    Field(String),
    Setter(String),
}

/// A property initializer run at construction.
#[derive(Debug, Clone)]
pub struct Initializer {
    pub property: String,
    pub code: Rc<PatchMethod>,
    pub target: InitTarget,
}

/// A loadable class.
#[derive(Debug, Clone)]
pub struct ClassImage {
    pub name: String,
    /// Derives from the base that calls the init hook at construction
    pub derives_base: bool,
    pub init_method: String,
    /// Field name to declared type, in declaration order
    pub fields: Vec<(String, String)>,
    pub properties: FxHashMap<String, PropertyDef>,
    pub methods: FxHashMap<String, Rc<PatchMethod>>,
    pub statics: FxHashMap<String, Rc<PatchMethod>>,
    /// Declared methods without a body
    pub externs: FxHashSet<String>,
    /// Declared bodies that could not be lowered, with the reason
    pub opaque: FxHashMap<String, String>,
    pub initializers: Vec<Initializer>,
}

impl ClassImage {
    /// The unpatched class for `class`.
    pub fn baseline(class: &ClassDecl, conventions: &ReactiveConventions) -> RuntimeResult<ClassImage> {
        let mut image = ClassImage {
            name: class.name.clone(),
            derives_base: class.derives_from(&conventions.extensible_base),
            init_method: conventions.init_method.clone(),
            fields: Vec::new(),
            properties: FxHashMap::default(),
            methods: FxHashMap::default(),
            statics: FxHashMap::default(),
            externs: FxHashSet::default(),
            opaque: FxHashMap::default(),
            initializers: Vec::new(),
        };

        for member in &class.members {
            match &member.kind {
                MemberKind::Property(prop) => {
                    let ty = prop.ty.to_string();
                    let auto = auto_field_name(&member.name);
                    let is_auto = prop.getter.as_ref().map_or(false, |g| g.body.is_none());
                    if is_auto {
                        image.fields.push((auto.clone(), ty.clone()));
                    }

                    let getter = match &prop.getter {
                        Some(accessor) => {
                            let name = format!("get_{}", member.name);
                            match &accessor.body {
                                Some(body) => image.define(&name, &[], body)?,
                                None => {
                                    let method = PatchMethod {
                                        name: name.clone(),
                                        param_count: 0,
                                        local_count: 0,
                                        code: vec![Instr::LoadField(auto.clone()), Instr::Return],
                                    };
                                    image.methods.insert(name.clone(), Rc::new(method));
                                }
                            }
                            Some(name)
                        }
                        None => None,
                    };

                    let setter = match &prop.setter {
                        Some(_) => {
                            let name = format!("set_{}", member.name);
                            let method = PatchMethod {
                                name: name.clone(),
                                param_count: 1,
                                local_count: 0,
                                code: vec![Instr::LoadArg(0), Instr::StoreField(auto.clone()), Instr::ReturnVoid],
                            };
                            image.methods.insert(name.clone(), Rc::new(method));
                            Some(name)
                        }
                        None => None,
                    };

                    if let Some(init) = &prop.initializer {
                        let code = lower_body(&format!("init_{}", member.name), &[], init)?;
                        image.initializers.push(Initializer {
                            property: member.name.clone(),
                            code: Rc::new(code),
                            target: InitTarget::Field(auto),
                        });
                    }

                    image.properties.insert(member.name.clone(), PropertyDef { ty, getter, setter });
                }
                MemberKind::Method(method) => match &method.body {
                    Some(body) => {
                        let params: Vec<String> = method.params.iter().map(|p| p.name.clone()).collect();
                        image.define(&member.name, &params, body)?;
                    }
                    None => {
                        image.externs.insert(member.name.clone());
                    }
                },
            }
        }

        Ok(image)
    }

    /// Apply a patch module after checking its integrity.
    pub fn apply(&mut self, module: &PatchModule) -> RuntimeResult<()> {
        let actual = module.compute_checksum();
        if actual != module.checksum {
            return Err(RuntimeError::ChecksumMismatch {
                expected: module.checksum,
                actual,
            });
        }
        if module.class != self.name {
            return Err(self.patch_error(format!("module targets '{}'", module.class)));
        }

        for edit in &module.edits {
            match edit {
                PatchEdit::AddField { name, ty, .. } => {
                    if self.fields.iter().any(|(existing, _)| existing == name) {
                        return Err(self.patch_error(format!("field '{}' already exists", name)));
                    }
                    self.fields.push((name.clone(), ty.clone()));
                }
                PatchEdit::AddStatic { method } => {
                    self.statics.insert(method.name.clone(), Rc::new(method.clone()));
                }
                PatchEdit::AddProperty { name, ty, getter } => {
                    if self.properties.contains_key(name) {
                        return Err(self.patch_error(format!("property '{}' already exists", name)));
                    }
                    self.properties.insert(
                        name.clone(),
                        PropertyDef {
                            ty: ty.clone(),
                            getter: Some(getter.clone()),
                            setter: None,
                        },
                    );
                }
                PatchEdit::AddMethod { method } => {
                    if self.methods.contains_key(&method.name) || self.opaque.contains_key(&method.name) {
                        return Err(self.patch_error(format!("method '{}' already exists", method.name)));
                    }
                    self.methods.insert(method.name.clone(), Rc::new(method.clone()));
                }
                PatchEdit::ReplaceBody { method } => {
                    let opaque = self.opaque.remove(&method.name).is_some();
                    if !opaque && !self.methods.contains_key(&method.name) {
                        return Err(self.patch_error(format!("no method '{}' to replace", method.name)));
                    }
                    self.methods.insert(method.name.clone(), Rc::new(method.clone()));
                }
                PatchEdit::RedirectInitializer { property, setter } => {
                    let Some(init) = self.initializers.iter_mut().find(|i| i.property == *property) else {
                        return Err(self.patch_error(format!("'{}' has no initializer", property)));
                    };
                    init.target = InitTarget::Setter(setter.clone());
                }
            }
        }

        tracing::debug!(class = %self.name, edits = module.edits.len(), "patch applied");
        Ok(())
    }

    /// Lower a declared body, keeping it opaque if it has no instruction form.
    fn define(&mut self, name: &str, params: &[String], body: &Expr) -> RuntimeResult<()> {
        match lower_body(name, params, body) {
            Ok(method) => {
                self.methods.insert(name.to_string(), Rc::new(method));
                Ok(())
            }
            Err(RuntimeError::Compile(CompileError::UnsupportedExpression { reason, .. })) => {
                tracing::debug!(class = %self.name, method = name, %reason, "body kept opaque");
                self.opaque.insert(name.to_string(), reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.get(name)
    }

    fn patch_error(&self, reason: String) -> RuntimeError {
        RuntimeError::Patch {
            class: self.name.clone(),
            reason,
        }
    }
}

fn lower_body(name: &str, params: &[String], body: &Expr) -> RuntimeResult<PatchMethod> {
    let mut builder = MethodBuilder::new(name, params.len() as u16);
    lower_expr(&mut builder, body, Scope::instance(params))?;
    builder.emit(Instr::Return);
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxweave_syntax::parse_source;

    fn image(source: &str) -> ClassImage {
        let file = parse_source(source).unwrap();
        ClassImage::baseline(&file.classes[0], &ReactiveConventions::default()).unwrap()
    }

    #[test]
    fn test_baseline_auto_property() {
        let image = image("partial class A : ReactiveObjectBase { int X { get; set; } = 3; int Y => X + 1; void Go(); }");
        assert!(image.derives_base);
        assert_eq!(image.fields, vec![("<X>k__BackingField".to_string(), "int".to_string())]);
        assert_eq!(image.property("X").and_then(|p| p.setter.as_deref()), Some("set_X"));
        assert!(image.methods.contains_key("get_Y"));
        assert!(image.externs.contains("Go"));
        assert!(image.opaque.is_empty());
        assert_eq!(image.initializers[0].target, InitTarget::Field("<X>k__BackingField".into()));
    }

    #[test]
    fn test_projection_body_is_opaque_until_replaced() {
        let mut image = image("partial class A { int X { get; set; } bool Same => this.To(static x => x.X == 0); }");
        assert!(image.opaque.contains_key("get_Same"));
        assert!(!image.methods.contains_key("get_Same"));

        let module = PatchModule::new(
            "A",
            vec![PatchEdit::ReplaceBody {
                method: PatchMethod {
                    name: "get_Same".into(),
                    param_count: 0,
                    local_count: 0,
                    code: vec![Instr::PushBool(true), Instr::Return],
                },
            }],
        );
        image.apply(&module).unwrap();
        assert!(image.opaque.is_empty());
        assert!(image.methods.contains_key("get_Same"));
    }

    #[test]
    fn test_tampered_module_is_rejected() {
        let mut image = image("partial class A { int X { get; set; } }");
        let mut module = PatchModule::new("A", Vec::new());
        module.checksum ^= 1;
        assert!(matches!(image.apply(&module), Err(RuntimeError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_replace_requires_existing_method() {
        let mut image = image("partial class A { int X { get; set; } }");
        let module = PatchModule::new(
            "A",
            vec![PatchEdit::ReplaceBody {
                method: PatchMethod {
                    name: "get_Missing".into(),
                    param_count: 0,
                    local_count: 0,
                    code: vec![Instr::PushNull, Instr::Return],
                },
            }],
        );
        assert!(matches!(image.apply(&module), Err(RuntimeError::Patch { .. })));
    }
}
