//! Command descriptors and enablement binding.

use crate::error::{CheckError, EnablementIssue};
use crate::extract::AnnotationRecord;
use crate::model::{slot_name, CommandDescriptor, Enablement, MemberTable, PropertyRole};
use crate::names::ReservedNames;
use crate::reporter::ValidationReporter;
use crate::shapes::AnnotationKind;
use rxweave_syntax::ast::{ClassDecl, MemberDecl, MemberKind, TypeRef};

/// Scans annotated methods and resolves their `CanExecute` references.
pub struct CommandBindingResolver<'a> {
    members: &'a MemberTable,
    reserved: &'a mut ReservedNames,
    reporter: &'a mut ValidationReporter,
}

impl<'a> CommandBindingResolver<'a> {
    pub(crate) fn new(members: &'a MemberTable, reserved: &'a mut ReservedNames, reporter: &'a mut ValidationReporter) -> Self {
        Self {
            members,
            reserved,
            reporter,
        }
    }

    /// Descriptors in declaration order. `records` is parallel to the members.
    pub(crate) fn resolve(mut self, class: &ClassDecl, records: &[Vec<AnnotationRecord>]) -> Vec<CommandDescriptor> {
        class
            .members
            .iter()
            .zip(records)
            .filter_map(|(member, member_records)| {
                let record = member_records.iter().find(|r| r.kind == AnnotationKind::Command)?;
                self.describe(member, record)
            })
            .collect()
    }

    fn describe(&mut self, member: &MemberDecl, record: &AnnotationRecord) -> Option<CommandDescriptor> {
        let MemberKind::Method(method) = &member.kind else {
            self.reporter.report(CheckError::InvalidAnnotationArguments {
                annotation: record.kind.to_string(),
                member: member.name.clone(),
                reason: "[Command] applies to methods only".to_string(),
                span: record.span,
            });
            return None;
        };

        if method.params.len() > 1 {
            self.reporter.report(CheckError::TooManyCommandParameters {
                method: member.name.clone(),
                count: method.params.len(),
                span: member.name_span,
            });
            return None;
        }

        let property_name = format!("{}Command", member.name);
        let slot = slot_name(&property_name);
        if let Err(original) = self.reserved.claim(&property_name, member.name_span) {
            self.reporter.report(CheckError::DuplicateTarget {
                name: property_name,
                span: member.name_span,
                original,
            });
            return None;
        }
        if let Err(existing) = self.reserved.claim(&slot, member.name_span) {
            self.reporter.report(CheckError::SlotCollision {
                property: property_name,
                slot,
                span: member.name_span,
                existing,
            });
            return None;
        }

        let (is_async, return_type) = unwrap_task(&method.return_type);
        let enablement = record.get_str("CanExecute").and_then(|name| self.bind(&member.name, name, record));

        tracing::debug!(command = %property_name, is_async, bound = enablement.is_some(), "described command");
        Some(CommandDescriptor {
            method: member.name.clone(),
            property_name,
            slot,
            argument_type: method.params.first().map(|p| p.ty.clone()),
            return_type,
            is_async,
            enablement,
            span: member.name_span,
        })
    }

    fn bind(&mut self, command: &str, name: &str, record: &AnnotationRecord) -> Option<Enablement> {
        let issue = match self.members.resolve(name) {
            None => EnablementIssue::Unresolved,
            Some(id) => {
                let info = self.members.get(id);
                if !info.ty.is_bool() {
                    EnablementIssue::NotBoolean
                } else if matches!(info.role, PropertyRole::Plain) {
                    EnablementIssue::NotObservable
                } else {
                    return Some(Enablement {
                        property: id,
                        name: name.to_string(),
                    });
                }
            }
        };

        tracing::warn!(command, property = name, ?issue, "command degraded to always enabled");
        self.reporter.report(CheckError::InvalidEnablement {
            command: command.to_string(),
            property: name.to_string(),
            issue,
            span: record.span,
        });
        None
    }
}

/// Split `Task`/`Task<T>` into (is async, result type).
fn unwrap_task(ty: &TypeRef) -> (bool, Option<TypeRef>) {
    match ty.base_name() {
        "Task" | "ValueTask" => (true, ty.args.first().cloned()),
        _ if ty.is_void() => (false, None),
        _ => (false, Some(ty.clone())),
    }
}
