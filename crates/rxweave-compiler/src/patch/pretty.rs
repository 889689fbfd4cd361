//! Pretty-printing for patch modules
//!
//! The edit listing doubles as the checksum input, so its format is part
//! of the module contract.

use super::module::{PatchEdit, PatchMethod, PatchModule};
use crate::fragment::FieldRole;

/// Trait for pretty-printing patch constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for PatchMethod {
    fn pretty_print(&self) -> String {
        let mut output = format!(
            "{}({}) locals={}\n",
            self.name, self.param_count, self.local_count
        );
        for (i, instr) in self.code.iter().enumerate() {
            output.push_str(&format!("  {:04} {}\n", i, instr));
        }
        output
    }
}

impl PrettyPrint for PatchEdit {
    fn pretty_print(&self) -> String {
        match self {
            PatchEdit::AddField { name, ty, role } => {
                let role = match role {
                    FieldRole::PropertySlot => "property-slot",
                    FieldRole::DerivedSlot => "derived-slot",
                    FieldRole::LazyFlag => "lazy-flag",
                    FieldRole::CommandSlot => "command-slot",
                };
                format!("field {}: {} ({})\n", name, ty, role)
            }
            PatchEdit::AddStatic { method } => format!("static {}", method.pretty_print()),
            PatchEdit::AddProperty { name, ty, getter } => format!("property {}: {} get={}\n", name, ty, getter),
            PatchEdit::AddMethod { method } => format!("method {}", method.pretty_print()),
            PatchEdit::ReplaceBody { method } => format!("replace {}", method.pretty_print()),
            PatchEdit::RedirectInitializer { property, setter } => format!("redirect {} -> {}\n", property, setter),
        }
    }
}

impl PrettyPrint for PatchModule {
    fn pretty_print(&self) -> String {
        let mut output = self.listing();
        output.push_str(&format!("; checksum {:#010x}\n", self.checksum));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::instr::Instr;

    #[test]
    fn test_method_listing() {
        let method = PatchMethod {
            name: "get_Verified".into(),
            param_count: 0,
            local_count: 0,
            code: vec![Instr::LoadField("_verified".into()), Instr::Return],
        };
        assert_eq!(
            method.pretty_print(),
            "get_Verified(0) locals=0\n  0000 load.field _verified\n  0001 ret\n"
        );
    }

    #[test]
    fn test_module_trailer() {
        let module = PatchModule::new("A", Vec::new());
        let text = module.pretty_print();
        assert!(text.starts_with("; patch A\n"));
        assert!(text.ends_with(&format!("; checksum {:#010x}\n", module.checksum)));
    }
}
