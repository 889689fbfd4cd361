//! Dependency graph construction for derived values.
//!
//! Derived annotations are staged first, `NotifyFor` edges are merged into
//! the staged targets, circular source chains are rejected, and only then
//! are descriptor handles assigned.

use crate::error::CheckError;
use crate::extract::AnnotationRecord;
use crate::model::{
    slot_name, CachePolicy, DependencyGraph, DerivedId, DerivedOrigin, DerivedPropertyDescriptor, DerivedSlot,
    MemberTable, PropertyId, PropertyRole, Recompute, StaticTable,
};
use crate::names::ReservedNames;
use crate::reporter::ValidationReporter;
use crate::shapes::AnnotationKind;
use rxweave_syntax::ast::{ClassDecl, Expr, ExprKind, MemberDecl, MemberKind, TypeRef, HOST_RECEIVERS};
use rxweave_syntax::Span;

/// Derived values of one class with their graph and static table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedSection {
    pub derived: Vec<DerivedPropertyDescriptor>,
    pub graph: DependencyGraph,
    pub statics: StaticTable,
}

/// Body of a staged derived value before handles are assigned.
#[derive(Debug, Clone)]
enum StagedRecompute {
    Inline(Expr),
    Projection { param: String, body: Expr, name: String },
    Method(String),
}

#[derive(Debug, Clone)]
struct Staged {
    property: PropertyId,
    name: String,
    declared_type: TypeRef,
    origin: DerivedOrigin,
    recompute: Option<StagedRecompute>,
    cache: CachePolicy,
    notify_on_initial_value: bool,
    slot: Option<DerivedSlot>,
    sources: Vec<PropertyId>,
    span: Span,
}

/// Builds [`DerivedSection`]s from `Derived` and `NotifyFor` annotations.
pub struct DependencyGraphBuilder<'a> {
    class: &'a ClassDecl,
    members: &'a mut MemberTable,
    reserved: &'a mut ReservedNames,
    reporter: &'a mut ValidationReporter,
    staged: Vec<Staged>,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub(crate) fn new(
        class: &'a ClassDecl,
        members: &'a mut MemberTable,
        reserved: &'a mut ReservedNames,
        reporter: &'a mut ValidationReporter,
    ) -> Self {
        Self {
            class,
            members,
            reserved,
            reporter,
            staged: Vec::new(),
        }
    }

    /// Build the section. `records` is parallel to the class members.
    pub(crate) fn build(mut self, records: &[Vec<AnnotationRecord>]) -> DerivedSection {
        let class = self.class;

        for (member, member_records) in class.members.iter().zip(records) {
            let derived = member_records.iter().find(|r| r.kind == AnnotationKind::Derived);
            let observable = member_records.iter().find(|r| r.kind == AnnotationKind::ObservableAsProperty);
            match (derived, observable) {
                (Some(_), Some(record)) => self.reporter.report(CheckError::InvalidAnnotationArguments {
                    annotation: record.kind.to_string(),
                    member: member.name.clone(),
                    reason: "cannot be combined with [Derived]".to_string(),
                    span: record.span,
                }),
                (Some(record), None) => self.stage_derived(member, record),
                (None, Some(record)) => self.stage_observable(member, record),
                (None, None) => {}
            }
        }

        for (member, member_records) in class.members.iter().zip(records) {
            if let Some(record) = member_records.iter().find(|r| r.kind == AnnotationKind::NotifyFor) {
                self.merge_notify_for(member, record);
            }
        }

        let rejected = self.reject_cycles();
        self.finalize(&rejected)
    }

    fn stage_derived(&mut self, member: &MemberDecl, record: &AnnotationRecord) {
        let cache = record
            .get_variant("CacheMode")
            .and_then(CachePolicy::from_variant)
            .unwrap_or_default();
        let mut notify = record.get_bool("NotifyOnInitialValue", false);

        let (property, name, declared_type, origin, recompute, reads) = match &member.kind {
            MemberKind::Property(prop) => {
                if record.get("Property").is_some() {
                    self.reporter.report(CheckError::InvalidAnnotationArguments {
                        annotation: record.kind.to_string(),
                        member: member.name.clone(),
                        reason: "'Property' only applies to methods".to_string(),
                        span: record.span,
                    });
                    return;
                }
                if let Some(setter) = &prop.setter {
                    self.reporter.report(CheckError::DerivedHasSetter {
                        property: member.name.clone(),
                        span: member.name_span,
                        setter_span: setter.span,
                    });
                    return;
                }
                let Some(property) = self.members.resolve(&member.name) else {
                    return;
                };

                let (recompute, reads) = match prop.getter_body() {
                    Some(body) => match self.staged_body(member, body) {
                        Some(recompute) => (Some(recompute), body.member_reads()),
                        None => return,
                    },
                    None if cache.is_cached() => {
                        self.reporter.report(CheckError::MissingGetterExpression {
                            property: member.name.clone(),
                            span: member.name_span,
                        });
                        return;
                    }
                    // Announce-only: the hand-written getter stays
                    None => (None, Vec::new()),
                };
                (property, member.name.clone(), prop.ty.clone(), DerivedOrigin::Property, recompute, reads)
            }
            MemberKind::Method(method) => {
                let Some(exposed) = record.get_str("Property").map(str::to_string) else {
                    self.reporter.report(CheckError::InvalidAnnotationArguments {
                        annotation: record.kind.to_string(),
                        member: member.name.clone(),
                        reason: "a derived method needs Property = \"Name\"".to_string(),
                        span: record.span,
                    });
                    return;
                };
                if !method.params.is_empty() {
                    self.unsupported(member, "a derived method must not take parameters");
                    return;
                }
                if method.return_type.is_void() {
                    self.unsupported(member, "a derived method must return a value");
                    return;
                }
                if let Err(original) = self.reserved.claim(&exposed, record.span) {
                    self.reporter.report(CheckError::DuplicateTarget {
                        name: exposed,
                        span: record.span,
                        original,
                    });
                    return;
                }
                let property = match self.members.insert(&exposed, method.return_type.clone(), false, true, record.span) {
                    Ok(id) => id,
                    Err(existing) => {
                        self.reporter.report(CheckError::DuplicateTarget {
                            name: exposed,
                            span: record.span,
                            original: self.members.get(existing).span,
                        });
                        return;
                    }
                };
                let reads = method.body.as_ref().map(Expr::member_reads).unwrap_or_default();
                (
                    property,
                    exposed,
                    method.return_type.clone(),
                    DerivedOrigin::Method {
                        method: member.name.clone(),
                    },
                    Some(StagedRecompute::Method(member.name.clone())),
                    reads,
                )
            }
        };

        if cache == CachePolicy::LazyOnFirstAccess && notify {
            self.reporter.report(CheckError::IgnoredInitialNotification {
                property: name.clone(),
                span: record.span,
            });
            notify = false;
        }

        let slot = if cache.is_cached() {
            let value = slot_name(&name);
            let flag = (cache == CachePolicy::LazyOnFirstAccess).then(|| format!("{}Initialized", value));
            let recompute_method = format!("Recompute{}", name);
            let mut claimed: Vec<&str> = vec![value.as_str(), recompute_method.as_str()];
            if let Some(flag) = &flag {
                claimed.push(flag.as_str());
            }
            if let Err((slot, existing)) = self.reserved.claim_all(&claimed, member.name_span) {
                self.reporter.report(CheckError::SlotCollision {
                    property: name,
                    slot,
                    span: member.name_span,
                    existing,
                });
                return;
            }
            Some(DerivedSlot { value, flag })
        } else {
            None
        };

        if let Some(StagedRecompute::Projection { name: static_name, .. }) = &recompute {
            if let Err(existing) = self.reserved.claim(static_name, member.name_span) {
                self.reporter.report(CheckError::SlotCollision {
                    property: name,
                    slot: static_name.clone(),
                    span: member.name_span,
                    existing,
                });
                return;
            }
        }

        let mut sources = Vec::new();
        let declared = record.get_strings("Sources");
        for source in &declared {
            match self.members.resolve(source) {
                Some(id) if !sources.contains(&id) => sources.push(id),
                Some(_) => {}
                None => self.reporter.report(CheckError::UnknownSource {
                    property: name.clone(),
                    name: source.clone(),
                    span: record.span,
                }),
            }
        }

        for read in reads {
            if read.name == name || declared.contains(&read.name) {
                continue;
            }
            if self.members.resolve(&read.name).is_some() {
                self.reporter.report(CheckError::UndeclaredRead {
                    property: name.clone(),
                    read: read.name,
                    span: read.span,
                });
            }
        }

        tracing::debug!(class = %self.class.name, derived = %name, cache = cache.as_str(), sources = sources.len(), "staged derived value");
        self.staged.push(Staged {
            property,
            name,
            declared_type,
            origin,
            recompute,
            cache,
            notify_on_initial_value: notify,
            slot,
            sources,
            span: member.name_span,
        });
    }

    /// `[ObservableAsProperty]`: the getter expression becomes the helper
    /// assigned at init. There are no sources; the helper announces changes.
    fn stage_observable(&mut self, member: &MemberDecl, record: &AnnotationRecord) {
        let Some(prop) = member.as_property() else {
            self.reporter.report(CheckError::InvalidAnnotationArguments {
                annotation: record.kind.to_string(),
                member: member.name.clone(),
                reason: "[ObservableAsProperty] applies to properties only".to_string(),
                span: record.span,
            });
            return;
        };
        if let Some(setter) = &prop.setter {
            self.reporter.report(CheckError::DerivedHasSetter {
                property: member.name.clone(),
                span: member.name_span,
                setter_span: setter.span,
            });
            return;
        }
        let Some(body) = prop.getter_body() else {
            self.reporter.report(CheckError::MissingGetterExpression {
                property: member.name.clone(),
                span: member.name_span,
            });
            return;
        };
        if contains_lambda(body) {
            self.unsupported(member, "lambdas are not supported in an observable helper expression");
            return;
        }
        let Some(property) = self.members.resolve(&member.name) else {
            return;
        };

        let value = slot_name(&member.name);
        if let Err(existing) = self.reserved.claim(&value, member.name_span) {
            self.reporter.report(CheckError::SlotCollision {
                property: member.name.clone(),
                slot: value,
                span: member.name_span,
                existing,
            });
            return;
        }

        tracing::debug!(class = %self.class.name, derived = %member.name, "staged observable helper");
        self.staged.push(Staged {
            property,
            name: member.name.clone(),
            declared_type: prop.ty.clone(),
            origin: DerivedOrigin::Observable,
            recompute: Some(StagedRecompute::Inline(helper_expression(body).clone())),
            cache: CachePolicy::EagerAtInit,
            notify_on_initial_value: false,
            slot: Some(DerivedSlot { value, flag: None }),
            sources: Vec::new(),
            span: member.name_span,
        });
    }

    fn staged_body(&mut self, member: &MemberDecl, body: &Expr) -> Option<StagedRecompute> {
        if let Some((param, projected)) = body.as_static_projection() {
            if contains_lambda(projected) {
                self.unsupported(member, "nested lambdas are not supported");
                return None;
            }
            if let Some(read) = instance_read(projected, param) {
                let reason = format!("static projection reads instance member '{read}'; read it through '{param}'");
                self.unsupported(member, &reason);
                return None;
            }
            return Some(StagedRecompute::Projection {
                param: param.to_string(),
                body: projected.clone(),
                name: format!("{}Projection", slot_name(&member.name)),
            });
        }
        if contains_lambda(body) {
            self.unsupported(member, "lambdas are only supported as this.To(static x => ...)");
            return None;
        }
        Some(StagedRecompute::Inline(body.clone()))
    }

    fn merge_notify_for(&mut self, member: &MemberDecl, record: &AnnotationRecord) {
        let Some(source) = member.as_property().and_then(|_| self.members.resolve(&member.name)) else {
            self.reporter.report(CheckError::InvalidAnnotationArguments {
                annotation: record.kind.to_string(),
                member: member.name.clone(),
                reason: "[NotifyFor] applies to properties only".to_string(),
                span: record.span,
            });
            return;
        };

        for target_name in record.get_strings("Targets") {
            let Some(target) = self.members.resolve(&target_name) else {
                self.reporter.report(CheckError::UnknownSource {
                    property: member.name.clone(),
                    name: target_name,
                    span: record.span,
                });
                continue;
            };

            if let Some(staged) = self.staged.iter_mut().find(|s| s.property == target) {
                if staged.origin == DerivedOrigin::Observable {
                    self.reporter.report(CheckError::InvalidAnnotationArguments {
                        annotation: record.kind.to_string(),
                        member: member.name.clone(),
                        reason: format!("'{}' is announced by its observable helper", target_name),
                        span: record.span,
                    });
                    continue;
                }
                if !staged.sources.contains(&source) {
                    tracing::debug!(target = %target_name, source = %member.name, "reusing derived slot for extra source");
                    staged.sources.push(source);
                }
                continue;
            }

            let info = self.members.get(target).clone();
            if info.has_setter {
                let setter_span = self
                    .class
                    .member(&target_name)
                    .and_then(|m| m.as_property())
                    .and_then(|p| p.setter.as_ref())
                    .map(|s| s.span)
                    .unwrap_or(info.span);
                self.reporter.report(CheckError::DerivedHasSetter {
                    property: target_name,
                    span: record.span,
                    setter_span,
                });
                continue;
            }

            self.staged.push(Staged {
                property: target,
                name: info.name,
                declared_type: info.ty,
                origin: DerivedOrigin::Property,
                recompute: None,
                cache: CachePolicy::Disabled,
                notify_on_initial_value: false,
                slot: None,
                sources: vec![source],
                span: info.span,
            });
        }
    }

    /// Report every circular source chain; returns the rejected entries.
    fn reject_cycles(&mut self) -> Vec<bool> {
        let n = self.staged.len();
        // Edge i -> j when i reads staged value j
        let adjacency: Vec<Vec<usize>> = self
            .staged
            .iter()
            .map(|s| {
                s.sources
                    .iter()
                    .filter_map(|source| self.staged.iter().position(|t| t.property == *source))
                    .collect()
            })
            .collect();

        let mut rejected = vec![false; n];
        for mut scc in strongly_connected(&adjacency) {
            let is_cycle = scc.len() > 1 || adjacency[scc[0]].contains(&scc[0]);
            if !is_cycle {
                continue;
            }
            scc.sort_unstable();
            let members: Vec<String> = scc.iter().map(|&i| self.staged[i].name.clone()).collect();
            tracing::debug!(class = %self.class.name, cycle = ?members, "rejecting circular derived values");
            let mut chain = members.clone();
            chain.push(members[0].clone());
            self.reporter.report(CheckError::DerivedCycle {
                members: chain,
                span: self.staged[scc[0]].span,
                related: scc.iter().skip(1).map(|&i| self.staged[i].span).collect(),
            });
            for i in scc {
                rejected[i] = true;
            }
        }
        rejected
    }

    fn finalize(self, rejected: &[bool]) -> DerivedSection {
        let mut section = DerivedSection::default();

        for (i, staged) in self.staged.into_iter().enumerate() {
            if rejected[i] {
                continue;
            }
            let id = DerivedId(section.derived.len() as u32);
            let recompute = staged.recompute.map(|r| match r {
                StagedRecompute::Inline(expr) => Recompute::Inline(expr),
                StagedRecompute::Method(method) => Recompute::Method(method),
                StagedRecompute::Projection { param, body, name } => {
                    let function = section.statics.add(name, param, body, staged.declared_type.clone(), id);
                    Recompute::Static(function)
                }
            });
            self.members.set_role(staged.property, PropertyRole::Derived(id));
            section.derived.push(DerivedPropertyDescriptor {
                id,
                property: staged.property,
                name: staged.name,
                declared_type: staged.declared_type,
                origin: staged.origin,
                recompute,
                cache: staged.cache,
                notify_on_initial_value: staged.notify_on_initial_value,
                slot: staged.slot,
                sources: staged.sources,
                span: staged.span,
            });
        }

        for derived in &section.derived {
            for &source in &derived.sources {
                section.graph.add_edge(source, derived.id);
            }
        }

        section
    }

    fn unsupported(&mut self, member: &MemberDecl, reason: &str) {
        self.reporter.report(CheckError::UnsupportedBody {
            member: member.name.clone(),
            reason: reason.to_string(),
            span: member.name_span,
        });
    }
}

/// `helper.ToDefault()` stands for `helper` itself.
fn helper_expression(body: &Expr) -> &Expr {
    if let ExprKind::Call { callee, args } = &body.kind {
        if let ExprKind::Member { object, name } = &callee.kind {
            if name == "ToDefault" && args.is_empty() {
                return object;
            }
        }
    }
    body
}

fn contains_lambda(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Lambda { .. } => true,
        ExprKind::Literal(_) | ExprKind::Identifier(_) | ExprKind::This => false,
        ExprKind::Member { object, .. } => contains_lambda(object),
        ExprKind::Call { callee, args } => contains_lambda(callee) || args.iter().any(contains_lambda),
        ExprKind::Unary { operand, .. } => contains_lambda(operand),
        ExprKind::Binary { left, right, .. } => contains_lambda(left) || contains_lambda(right),
        ExprKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => contains_lambda(condition) || contains_lambda(then_branch) || contains_lambda(else_branch),
    }
}

/// First instance access in a static projection body that bypasses `param`.
fn instance_read(expr: &Expr, param: &str) -> Option<String> {
    let is_host = |name: &str| HOST_RECEIVERS.contains(&name);
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Lambda { .. } => None,
        ExprKind::This => Some("this".to_string()),
        ExprKind::Identifier(name) if name == param || is_host(name) => None,
        ExprKind::Identifier(name) => Some(name.clone()),
        ExprKind::Member { object, .. } => match &object.kind {
            ExprKind::Identifier(receiver) if is_host(receiver) => None,
            _ => instance_read(object, param),
        },
        ExprKind::Call { callee, args } => {
            let from_callee = match &callee.kind {
                ExprKind::Identifier(name) if name != param => Some(name.clone()),
                ExprKind::Identifier(_) => None,
                ExprKind::Member { object, .. } => match &object.kind {
                    ExprKind::Identifier(receiver) if is_host(receiver) => None,
                    _ => instance_read(object, param),
                },
                _ => instance_read(callee, param),
            };
            from_callee.or_else(|| args.iter().find_map(|arg| instance_read(arg, param)))
        }
        ExprKind::Unary { operand, .. } => instance_read(operand, param),
        ExprKind::Binary { left, right, .. } => instance_read(left, param).or_else(|| instance_read(right, param)),
        ExprKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => instance_read(condition, param)
            .or_else(|| instance_read(then_branch, param))
            .or_else(|| instance_read(else_branch, param)),
    }
}

/// Tarjan's algorithm over an adjacency list.
fn strongly_connected(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct State<'g> {
        adjacency: &'g [Vec<usize>],
        index: usize,
        indices: Vec<Option<usize>>,
        low: Vec<usize>,
        stack: Vec<usize>,
        on_stack: Vec<bool>,
        out: Vec<Vec<usize>>,
    }

    fn strongconnect(v: usize, state: &mut State<'_>) {
        state.indices[v] = Some(state.index);
        state.low[v] = state.index;
        state.index += 1;
        state.stack.push(v);
        state.on_stack[v] = true;

        for &w in &state.adjacency[v] {
            match state.indices[w] {
                None => {
                    strongconnect(w, state);
                    state.low[v] = state.low[v].min(state.low[w]);
                }
                Some(iw) if state.on_stack[w] => {
                    state.low[v] = state.low[v].min(iw);
                }
                Some(_) => {}
            }
        }

        if Some(state.low[v]) == state.indices[v] {
            let mut scc = Vec::new();
            while let Some(w) = state.stack.pop() {
                state.on_stack[w] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            state.out.push(scc);
        }
    }

    let n = adjacency.len();
    let mut state = State {
        adjacency,
        index: 0,
        indices: vec![None; n],
        low: vec![0; n],
        stack: Vec::new(),
        on_stack: vec![false; n],
        out: Vec::new(),
    };
    for v in 0..n {
        if state.indices[v].is_none() {
            strongconnect(v, &mut state);
        }
    }
    state.out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strongly_connected_finds_cycle() {
        // 0 -> 1 -> 2 -> 0, 3 -> 3, 4 alone
        let adjacency = vec![vec![1], vec![2], vec![0], vec![3], vec![]];
        let mut sccs: Vec<Vec<usize>> = strongly_connected(&adjacency)
            .into_iter()
            .map(|mut s| {
                s.sort();
                s
            })
            .collect();
        sccs.sort();
        assert_eq!(sccs, vec![vec![0, 1, 2], vec![3], vec![4]]);
    }

    #[test]
    fn test_contains_lambda() {
        let expr = rxweave_syntax::parse_expression_source("Items.Where(x => x > 1)").unwrap();
        assert!(contains_lambda(&expr));
        let expr = rxweave_syntax::parse_expression_source("A + B").unwrap();
        assert!(!contains_lambda(&expr));
    }

    #[test]
    fn test_instance_read_in_projection() {
        let expr = rxweave_syntax::parse_expression_source("x.Id == x.Name.Trim()").unwrap();
        assert_eq!(instance_read(&expr, "x"), None);
        let expr = rxweave_syntax::parse_expression_source("string.IsNullOrEmpty(x.Id) && Math.Abs(1) > 0").unwrap();
        assert_eq!(instance_read(&expr, "x"), None);
        let expr = rxweave_syntax::parse_expression_source("Id == \"\"").unwrap();
        assert_eq!(instance_read(&expr, "x").as_deref(), Some("Id"));
        let expr = rxweave_syntax::parse_expression_source("x.Id == this.Name").unwrap();
        assert_eq!(instance_read(&expr, "x").as_deref(), Some("this"));
        let expr = rxweave_syntax::parse_expression_source("Format(x.Id)").unwrap();
        assert_eq!(instance_read(&expr, "x").as_deref(), Some("Format"));
    }
}
