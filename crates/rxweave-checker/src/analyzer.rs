//! Per-class analysis pipeline.
//!
//! Runs extraction, mutable property scanning, graph construction, command
//! binding and locale grouping in that order, and produces one
//! [`ClassModel`] per accepted class. Findings accumulate in a
//! [`ValidationReporter`]; only a class that cannot receive members is
//! dropped as a whole.

use crate::commands::CommandBindingResolver;
use crate::error::CheckError;
use crate::extract::{AnnotationRecord, MetadataExtractor};
use crate::graph::DependencyGraphBuilder;
use crate::locale::LocaleBindingResolver;
use crate::model::{slot_name, ClassModel, MemberTable, PropertyDescriptor, PropertyRole};
use crate::names::ReservedNames;
use crate::reporter::ValidationReporter;
use crate::shapes::AnnotationKind;
use rxweave_syntax::ast::{ClassDecl, MemberDecl, MemberKind, Modifier};
use rxweave_syntax::SymbolTable;
use tracing::instrument;

/// Result of analyzing every class of a symbol table.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Models of the classes that will receive generated members
    pub models: Vec<ClassModel>,
    /// Every finding, in report order
    pub reporter: ValidationReporter,
}

impl Analysis {
    pub fn errors(&self) -> &[CheckError] {
        self.reporter.errors()
    }

    pub fn has_errors(&self) -> bool {
        self.reporter.has_errors()
    }
}

/// Builds [`ClassModel`]s from a [`SymbolTable`].
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    extractor: MetadataExtractor,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extractor(extractor: MetadataExtractor) -> Self {
        Self { extractor }
    }

    /// Analyze every class in declaration order.
    pub fn analyze(&self, table: &dyn SymbolTable) -> Analysis {
        let mut analysis = Analysis::default();
        for class in table.classes() {
            if let Some(model) = self.analyze_class(table, class, &mut analysis.reporter) {
                analysis.models.push(model);
            }
        }
        let (errors, warnings) = analysis.reporter.counts();
        tracing::info!(
            source = table.source_name(),
            classes = analysis.models.len(),
            errors,
            warnings,
            "analysis finished"
        );
        analysis
    }

    /// Analyze one class. Returns `None` when the class is not processed.
    #[instrument(skip_all, fields(class = %class.name))]
    pub fn analyze_class(&self, table: &dyn SymbolTable, class: &ClassDecl, reporter: &mut ValidationReporter) -> Option<ClassModel> {
        if !table.is_extension_point(class) {
            tracing::debug!("not a reactive class, skipped");
            return None;
        }
        if !table.is_open_for_extension(class) {
            reporter.report(CheckError::NotExtensible {
                class: class.name.clone(),
                span: class.name_span,
            });
            return None;
        }

        let mut reserved = ReservedNames::from_class(class);
        let mut members = member_table(class, reporter);
        let records = self.extractor.extract_all(&class.members, reporter);

        let mutable_properties = scan_mutable(class, &records, &mut members, &mut reserved, reporter);
        let section = DependencyGraphBuilder::new(class, &mut members, &mut reserved, reporter).build(&records);
        let commands = CommandBindingResolver::new(&members, &mut reserved, reporter).resolve(class, &records);
        let locale_groups = LocaleBindingResolver::new(&members, reporter).resolve(class, &records);

        let conventions = table.conventions();
        let model = ClassModel {
            name: class.name.clone(),
            namespace: table.namespace().map(str::to_string),
            usings: table.usings().to_vec(),
            type_params: class.type_params.clone(),
            accessibility: accessibility(&class.modifiers),
            is_abstract: class.has_modifier(Modifier::Abstract),
            is_extensible_base: table.derives_extensible_base(class),
            init_method: conventions.init_method.clone(),
            members,
            mutable_properties,
            derived: section.derived,
            graph: section.graph,
            statics: section.statics,
            commands,
            locale_groups,
            declared_hooks: declared_hooks(class),
            span: class.name_span,
        };

        tracing::debug!(
            mutable = model.mutable_properties.len(),
            derived = model.derived.len(),
            commands = model.commands.len(),
            "class model built"
        );
        Some(model)
    }
}

fn accessibility(modifiers: &[Modifier]) -> Option<String> {
    modifiers
        .iter()
        .find(|m| m.is_accessibility())
        .map(|m| m.as_str().to_string())
}

/// Every declared property; later declarations of a taken name are reported.
fn member_table(class: &ClassDecl, reporter: &mut ValidationReporter) -> MemberTable {
    let mut members = MemberTable::new();
    for member in &class.members {
        let MemberKind::Property(prop) = &member.kind else {
            continue;
        };
        match members.insert(&member.name, prop.ty.clone(), prop.setter.is_some(), false, member.name_span) {
            Ok(id) => members.set_accessibility(id, accessibility(&member.modifiers)),
            Err(existing) => reporter.report(CheckError::DuplicateTarget {
                name: member.name.clone(),
                span: member.name_span,
                original: members.get(existing).span,
            }),
        }
    }
    members
}

fn scan_mutable(
    class: &ClassDecl,
    records: &[Vec<AnnotationRecord>],
    members: &mut MemberTable,
    reserved: &mut ReservedNames,
    reporter: &mut ValidationReporter,
) -> Vec<PropertyDescriptor> {
    let mut out = Vec::new();

    for (member, member_records) in class.members.iter().zip(records) {
        let Some(record) = member_records.iter().find(|r| r.kind == AnnotationKind::Reactive) else {
            continue;
        };
        if let Some(descriptor) = describe_mutable(member, record, members, reserved, reporter) {
            members.set_role(descriptor.id, PropertyRole::Mutable);
            out.push(descriptor);
        }
    }

    out
}

fn describe_mutable(
    member: &MemberDecl,
    record: &AnnotationRecord,
    members: &MemberTable,
    reserved: &mut ReservedNames,
    reporter: &mut ValidationReporter,
) -> Option<PropertyDescriptor> {
    let MemberKind::Property(prop) = &member.kind else {
        reporter.report(CheckError::InvalidAnnotationArguments {
            annotation: record.kind.to_string(),
            member: member.name.clone(),
            reason: "[Reactive] applies to properties only".to_string(),
            span: record.span,
        });
        return None;
    };

    let Some(setter) = &prop.setter else {
        reporter.report(CheckError::MissingSetter {
            property: member.name.clone(),
            annotation: record.kind.to_string(),
            span: member.name_span,
        });
        return None;
    };

    if setter.body.is_some() || prop.getter_body().is_some() {
        reporter.report(CheckError::UnsupportedBody {
            member: member.name.clone(),
            reason: "reactive properties must use auto accessors".to_string(),
            span: member.name_span,
        });
        return None;
    }

    let id = members.resolve(&member.name)?;
    // A duplicate declaration keeps the first one's handle
    if members.get(id).span != member.name_span {
        return None;
    }

    let slot = slot_name(&member.name);
    let raise_and_set = format!("RaiseAndSet{}", member.name);
    if let Err((taken, existing)) = reserved.claim_all(&[slot.as_str(), raise_and_set.as_str()], member.name_span) {
        reporter.report(CheckError::SlotCollision {
            property: member.name.clone(),
            slot: taken,
            span: member.name_span,
            existing,
        });
        return None;
    }

    Some(PropertyDescriptor {
        id,
        name: member.name.clone(),
        declared_type: prop.ty.clone(),
        has_setter: true,
        skip_equality_check: !record.get_bool("Check", true),
        initializer: prop.initializer.clone(),
        slot,
        span: member.name_span,
    })
}

/// Names of the `On{Name}Changing`/`On{Name}Changed` hooks the class implements.
fn declared_hooks(class: &ClassDecl) -> Vec<String> {
    class
        .members
        .iter()
        .filter(|m| matches!(&m.kind, MemberKind::Method(method) if method.body.is_some()))
        .filter(|m| m.name.starts_with("On") && (m.name.ends_with("Changing") || m.name.ends_with("Changed")))
        .map(|m| m.name.clone())
        .collect()
}
