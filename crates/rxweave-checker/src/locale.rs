//! Locale binding grouping.

use crate::error::CheckError;
use crate::extract::AnnotationRecord;
use crate::model::{LocaleBindingDescriptor, LocaleGrouping, LocaleRegistryGroup, MemberTable};
use crate::reporter::ValidationReporter;
use crate::shapes::AnnotationKind;
use rxweave_syntax::ast::{ClassDecl, MemberDecl, MemberKind};

/// Groups `[Localized]` bindings by registry, then by object grouping.
pub struct LocaleBindingResolver<'a> {
    members: &'a MemberTable,
    reporter: &'a mut ValidationReporter,
}

impl<'a> LocaleBindingResolver<'a> {
    pub(crate) fn new(members: &'a MemberTable, reporter: &'a mut ValidationReporter) -> Self {
        Self { members, reporter }
    }

    /// Registry groups in first-seen order. `records` is parallel to the members.
    pub(crate) fn resolve(mut self, class: &ClassDecl, records: &[Vec<AnnotationRecord>]) -> Vec<LocaleRegistryGroup> {
        let mut groups: Vec<LocaleRegistryGroup> = Vec::new();

        for (member, member_records) in class.members.iter().zip(records) {
            let Some(record) = member_records.iter().find(|r| r.kind == AnnotationKind::Localized) else {
                continue;
            };
            let Some(binding) = self.describe(member, record) else {
                continue;
            };
            insert(&mut groups, binding);
        }

        groups
    }

    fn describe(&mut self, member: &MemberDecl, record: &AnnotationRecord) -> Option<LocaleBindingDescriptor> {
        let MemberKind::Property(prop) = &member.kind else {
            self.reporter.report(CheckError::InvalidAnnotationArguments {
                annotation: record.kind.to_string(),
                member: member.name.clone(),
                reason: "[Localized] applies to properties only".to_string(),
                span: record.span,
            });
            return None;
        };

        if prop.setter.is_some() {
            self.reporter.report(CheckError::LocaleHasSetter {
                property: member.name.clone(),
                span: member.name_span,
            });
            return None;
        }

        let (Some(registry), Some(key_name)) = (record.get_str("ResourceName"), record.get_str("KeyPropertyName")) else {
            self.reporter.report(CheckError::InvalidAnnotationArguments {
                annotation: record.kind.to_string(),
                member: member.name.clone(),
                reason: "resource and key names must be non-empty".to_string(),
                span: record.span,
            });
            return None;
        };

        let Some(key) = self.members.resolve(key_name) else {
            self.reporter.report(CheckError::UnknownLocaleKey {
                property: member.name.clone(),
                key: key_name.to_string(),
                span: record.span,
            });
            return None;
        };
        let target = self.members.resolve(&member.name)?;

        Some(LocaleBindingDescriptor {
            key,
            key_name: key_name.to_string(),
            target,
            target_name: member.name.clone(),
            registry: registry.to_string(),
            grouping: record.get_str("ObjectName").map(str::to_string),
            retain_value_on_key_change: record.get_bool("Retain", false),
            span: member.name_span,
        })
    }
}

fn insert(groups: &mut Vec<LocaleRegistryGroup>, binding: LocaleBindingDescriptor) {
    let group = match groups.iter().position(|g| g.registry == binding.registry) {
        Some(i) => &mut groups[i],
        None => {
            groups.push(LocaleRegistryGroup {
                registry: binding.registry.clone(),
                groupings: Vec::new(),
            });
            let last = groups.len() - 1;
            &mut groups[last]
        }
    };

    match group.groupings.iter_mut().find(|g| g.name == binding.grouping) {
        Some(grouping) => grouping.bindings.push(binding),
        None => group.groupings.push(LocaleGrouping {
            name: binding.grouping.clone(),
            bindings: vec![binding],
        }),
    }
}
