//! Method body builder with label resolution.

use super::instr::Instr;
use super::module::PatchMethod;
use crate::error::{CompileError, CompileResult};

/// Placeholder for a jump target that is not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Builds one method body.
#[derive(Debug)]
pub struct MethodBuilder {
    name: String,
    param_count: u16,
    code: Vec<Instr>,
    locals: Vec<String>,
    labels: Vec<Option<usize>>,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>, param_count: u16) -> Self {
        Self {
            name: name.into(),
            param_count,
            code: Vec::new(),
            locals: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the local called `name`, allocating it on first use.
    pub fn local(&mut self, name: &str) -> u16 {
        if let Some(index) = self.get_local(name) {
            return index;
        }
        self.locals.push(name.to_string());
        (self.locals.len() - 1) as u16
    }

    pub fn get_local(&self, name: &str) -> Option<u16> {
        self.locals.iter().position(|l| l == name).map(|i| i as u16)
    }

    pub fn emit(&mut self, instr: Instr) {
        self.code.push(instr);
    }

    pub fn current_position(&self) -> usize {
        self.code.len()
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the next instruction.
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.code.len());
    }

    /// Emit a jump whose target is `label`. The label id is stored until
    /// [`build`](MethodBuilder::build) resolves it.
    pub fn emit_jump(&mut self, jump: fn(usize) -> Instr, label: Label) {
        self.code.push(jump(label.0));
    }

    /// Whether the last instruction ends the method.
    pub fn ends_in_return(&self) -> bool {
        matches!(self.code.last(), Some(Instr::Return | Instr::ReturnVoid))
    }

    pub fn build(mut self) -> CompileResult<PatchMethod> {
        for instr in &mut self.code {
            if let Some(label) = instr.jump_target() {
                let target = self
                    .labels
                    .get(label)
                    .copied()
                    .flatten()
                    .ok_or(CompileError::UnboundLabel { label })?;
                instr.set_jump_target(target);
            }
        }
        Ok(PatchMethod {
            name: self.name,
            param_count: self.param_count,
            local_count: self.locals.len() as u16,
            code: self.code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_resolve_forward() {
        let mut builder = MethodBuilder::new("get_X", 0);
        let done = builder.new_label();
        builder.emit(Instr::LoadField("_xInitialized".into()));
        builder.emit_jump(Instr::JumpIfTrue, done);
        builder.emit(Instr::PushInt(1));
        builder.emit(Instr::StoreField("_x".into()));
        builder.bind(done);
        builder.emit(Instr::LoadField("_x".into()));
        builder.emit(Instr::Return);

        let method = builder.build().unwrap();
        assert_eq!(method.code[1], Instr::JumpIfTrue(4));
    }

    #[test]
    fn test_unbound_label_is_an_error() {
        let mut builder = MethodBuilder::new("m", 0);
        let label = builder.new_label();
        builder.emit_jump(Instr::Jump, label);
        assert!(matches!(builder.build(), Err(CompileError::UnboundLabel { .. })));
    }

    #[test]
    fn test_locals_are_reused_by_name() {
        let mut builder = MethodBuilder::new("m", 1);
        assert_eq!(builder.local("oldValue"), 0);
        assert_eq!(builder.local("tmp"), 1);
        assert_eq!(builder.local("oldValue"), 0);
    }
}
