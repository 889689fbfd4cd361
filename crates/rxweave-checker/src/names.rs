//! Member names already claimed in a class, declared or generated.

use rustc_hash::FxHashMap;
use rxweave_syntax::ast::ClassDecl;
use rxweave_syntax::Span;

#[derive(Debug, Clone, Default)]
pub(crate) struct ReservedNames {
    names: FxHashMap<String, Span>,
}

impl ReservedNames {
    /// Every declared member name; the first declaration owns a name.
    pub(crate) fn from_class(class: &ClassDecl) -> Self {
        let mut names = FxHashMap::default();
        for member in &class.members {
            names.entry(member.name.clone()).or_insert(member.name_span);
        }
        Self { names }
    }

    /// Claim `name` for a generated member, or return the owner's span.
    pub(crate) fn claim(&mut self, name: &str, span: Span) -> Result<(), Span> {
        if let Some(&existing) = self.names.get(name) {
            return Err(existing);
        }
        self.names.insert(name.to_string(), span);
        Ok(())
    }

    /// Claim every name or none of them.
    pub(crate) fn claim_all(&mut self, names: &[&str], span: Span) -> Result<(), (String, Span)> {
        for name in names {
            if let Some(&existing) = self.names.get(*name) {
                return Err((name.to_string(), existing));
            }
        }
        for name in names {
            self.names.insert(name.to_string(), span);
        }
        Ok(())
    }
}
