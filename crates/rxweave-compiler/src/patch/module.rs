//! Patch modules: ordered edits against a compiled class.

use super::instr::Instr;
use super::pretty::PrettyPrint;
use crate::error::CompileResult;
use crate::fragment::FieldRole;
use serde::{Deserialize, Serialize};

/// A compiled method body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchMethod {
    pub name: String,
    pub param_count: u16,
    pub local_count: u16,
    pub code: Vec<Instr>,
}

/// One edit applied to a class image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatchEdit {
    AddField {
        name: String,
        ty: String,
        role: FieldRole,
    },
    /// A hoisted function taking the instance as its only argument
    AddStatic { method: PatchMethod },
    /// A property the class does not declare
    AddProperty {
        name: String,
        ty: String,
        getter: String,
    },
    AddMethod { method: PatchMethod },
    /// Replace the body of an existing accessor
    ReplaceBody { method: PatchMethod },
    /// The declared initializer of `property` goes through `setter`
    /// instead of the compiler's auto field
    RedirectInitializer { property: String, setter: String },
}

impl PatchEdit {
    pub fn kind(&self) -> &'static str {
        match self {
            PatchEdit::AddField { .. } => "add-field",
            PatchEdit::AddStatic { .. } => "add-static",
            PatchEdit::AddProperty { .. } => "add-property",
            PatchEdit::AddMethod { .. } => "add-method",
            PatchEdit::ReplaceBody { .. } => "replace-body",
            PatchEdit::RedirectInitializer { .. } => "redirect-initializer",
        }
    }
}

/// Every edit for one class, with a checksum over the edit listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchModule {
    pub class: String,
    pub edits: Vec<PatchEdit>,
    pub checksum: u32,
}

impl PatchModule {
    pub fn new(class: impl Into<String>, edits: Vec<PatchEdit>) -> Self {
        let mut module = PatchModule {
            class: class.into(),
            edits,
            checksum: 0,
        };
        module.checksum = module.compute_checksum();
        module
    }

    /// CRC32 of the canonical edit listing.
    pub fn compute_checksum(&self) -> u32 {
        crc32fast::hash(self.listing().as_bytes())
    }

    /// Whether the stored checksum matches the edits.
    pub fn is_intact(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    /// Canonical listing of the edits, without the checksum trailer.
    pub fn listing(&self) -> String {
        let mut out = format!("; patch {}\n", self.class);
        for edit in &self.edits {
            out.push_str(&edit.pretty_print());
        }
        out
    }

    /// Look up an added or replaced method by name.
    pub fn method(&self, name: &str) -> Option<&PatchMethod> {
        self.edits.iter().find_map(|edit| match edit {
            PatchEdit::AddMethod { method } | PatchEdit::ReplaceBody { method } | PatchEdit::AddStatic { method }
                if method.name == name =>
            {
                Some(method)
            }
            _ => None,
        })
    }

    pub fn to_json(&self) -> CompileResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> CompileResult<PatchModule> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatchModule {
        PatchModule::new(
            "Account",
            vec![
                PatchEdit::AddField {
                    name: "_id".into(),
                    ty: "string".into(),
                    role: FieldRole::PropertySlot,
                },
                PatchEdit::ReplaceBody {
                    method: PatchMethod {
                        name: "get_Id".into(),
                        param_count: 0,
                        local_count: 0,
                        code: vec![Instr::LoadField("_id".into()), Instr::Return],
                    },
                },
            ],
        )
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let mut module = sample();
        assert!(module.is_intact());
        module.edits.pop();
        assert!(!module.is_intact());
    }

    #[test]
    fn test_json_keeps_checksum() {
        let module = sample();
        let back = PatchModule::from_json(&module.to_json().unwrap()).unwrap();
        assert_eq!(back, module);
        assert!(back.is_intact());
    }

    #[test]
    fn test_method_lookup() {
        assert!(sample().method("get_Id").is_some());
        assert!(sample().method("set_Id").is_none());
    }
}
