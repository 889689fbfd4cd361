//! Typed per-class model consumed by the code emitter.
//!
//! Names are resolved into handles once, while the model is built. Nothing
//! downstream of the analyzer looks members up by string.

use rustc_hash::FxHashMap;
use rxweave_syntax::ast::{Expr, TypeRef};
use rxweave_syntax::Span;
use std::collections::VecDeque;

/// Handle to a property of the analyzed class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

/// Handle to a derived property descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivedId(pub u32);

/// Handle to an entry of the class static table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StaticFnId(pub u32);

/// Role a property plays in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRole {
    /// Declared without reactive annotations
    Plain,
    /// Generated notifying setter
    Mutable,
    /// Recomputed from sources
    Derived(DerivedId),
}

/// A property of the class, declared or synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub id: PropertyId,
    pub name: String,
    pub ty: TypeRef,
    pub has_setter: bool,
    pub role: PropertyRole,
    /// Synthesized for a method-derived value
    pub synthesized: bool,
    /// Accessibility keyword of the declaration
    pub accessibility: Option<String>,
    pub span: Span,
}

/// Every property of the class, indexed by handle and by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberTable {
    properties: Vec<PropertyInfo>,
    by_name: FxHashMap<String, PropertyId>,
}

impl MemberTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property; returns the existing handle on a name clash.
    pub fn insert(&mut self, name: &str, ty: TypeRef, has_setter: bool, synthesized: bool, span: Span) -> Result<PropertyId, PropertyId> {
        if let Some(&existing) = self.by_name.get(name) {
            return Err(existing);
        }
        let id = PropertyId(self.properties.len() as u32);
        self.properties.push(PropertyInfo {
            id,
            name: name.to_string(),
            ty,
            has_setter,
            role: PropertyRole::Plain,
            synthesized,
            accessibility: None,
            span,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn resolve(&self, name: &str) -> Option<PropertyId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: PropertyId) -> &PropertyInfo {
        &self.properties[id.0 as usize]
    }

    pub fn name(&self, id: PropertyId) -> &str {
        &self.get(id).name
    }

    pub(crate) fn set_role(&mut self, id: PropertyId, role: PropertyRole) {
        self.properties[id.0 as usize].role = role;
    }

    pub(crate) fn set_accessibility(&mut self, id: PropertyId, accessibility: Option<String>) {
        self.properties[id.0 as usize].accessibility = accessibility;
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyInfo> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// A property with a generated backing slot and notifying setter.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub id: PropertyId,
    pub name: String,
    pub declared_type: TypeRef,
    pub has_setter: bool,
    /// Always write and notify, even when the value is unchanged
    pub skip_equality_check: bool,
    /// The declaration carries `= expr`
    pub initializer: Option<Expr>,
    /// Backing field name
    pub slot: String,
    pub span: Span,
}

/// When a derived value is computed and cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    /// No slot; the getter recomputes on every read
    Disabled,
    /// Cached at initialization and on every source change
    #[default]
    EagerAtInit,
    /// Cached on first read and on every source change after that
    LazyOnFirstAccess,
}

impl CachePolicy {
    /// Parse a `CacheMode` variant name.
    pub fn from_variant(name: &str) -> Option<CachePolicy> {
        Some(match name {
            "Disabled" => CachePolicy::Disabled,
            "EagerAtInit" => CachePolicy::EagerAtInit,
            "LazyOnFirstAccess" => CachePolicy::LazyOnFirstAccess,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::Disabled => "Disabled",
            CachePolicy::EagerAtInit => "EagerAtInit",
            CachePolicy::LazyOnFirstAccess => "LazyOnFirstAccess",
        }
    }

    pub fn is_cached(&self) -> bool {
        !matches!(self, CachePolicy::Disabled)
    }
}

/// Where a derived value is declared.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedOrigin {
    /// An expression-bodied getter
    Property,
    /// A zero-parameter method exposed through a synthesized property
    Method { method: String },
    /// A getter whose expression builds an observable helper; the slot
    /// holds the helper and reads go through its `Value`
    Observable,
}

/// How a derived value is recomputed.
#[derive(Debug, Clone, PartialEq)]
pub enum Recompute {
    /// Evaluate the getter expression against `this`
    Inline(Expr),
    /// Call a hoisted pure function with the instance
    Static(StaticFnId),
    /// Call the declaring method
    Method(String),
}

/// Backing storage of a cached derived value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedSlot {
    pub value: String,
    /// "Has been computed" flag of a lazy slot
    pub flag: Option<String>,
}

/// A derived value and everything needed to regenerate it.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedPropertyDescriptor {
    pub id: DerivedId,
    pub property: PropertyId,
    pub name: String,
    pub declared_type: TypeRef,
    pub origin: DerivedOrigin,
    /// `None` for an announce-only target whose getter is left untouched
    pub recompute: Option<Recompute>,
    pub cache: CachePolicy,
    pub notify_on_initial_value: bool,
    pub slot: Option<DerivedSlot>,
    /// Resolved sources in declaration order
    pub sources: Vec<PropertyId>,
    pub span: Span,
}

impl DerivedPropertyDescriptor {
    /// Whether the getter is regenerated.
    pub fn rewrites_getter(&self) -> bool {
        self.recompute.is_some()
    }

    pub fn is_observable(&self) -> bool {
        self.origin == DerivedOrigin::Observable
    }
}

/// A pure function hoisted out of a `this.To(static x => ...)` body.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFn {
    pub id: StaticFnId,
    /// Field name holding the function
    pub name: String,
    pub param: String,
    pub body: Expr,
    pub return_type: TypeRef,
    pub owner: DerivedId,
}

/// Class-scoped table of hoisted static functions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticTable {
    functions: Vec<StaticFn>,
}

impl StaticTable {
    pub fn add(&mut self, name: String, param: String, body: Expr, return_type: TypeRef, owner: DerivedId) -> StaticFnId {
        let id = StaticFnId(self.functions.len() as u32);
        self.functions.push(StaticFn {
            id,
            name,
            param,
            body,
            return_type,
            owner,
        });
        id
    }

    pub fn get(&self, id: StaticFnId) -> &StaticFn {
        &self.functions[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &StaticFn> {
        self.functions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Derived values recomputed when one source changes.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedGroup {
    pub source: PropertyId,
    pub targets: Vec<DerivedId>,
}

/// Source to derived adjacency, groups in first-seen source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    groups: Vec<DerivedGroup>,
    index: FxHashMap<PropertyId, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `target` under `source`. Repeated edges are ignored.
    pub fn add_edge(&mut self, source: PropertyId, target: DerivedId) -> bool {
        let slot = match self.index.get(&source) {
            Some(&i) => i,
            None => {
                self.groups.push(DerivedGroup {
                    source,
                    targets: Vec::new(),
                });
                self.index.insert(source, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        let targets = &mut self.groups[slot].targets;
        if targets.contains(&target) {
            return false;
        }
        targets.push(target);
        true
    }

    /// Direct dependents of `source`.
    pub fn dependents(&self, source: PropertyId) -> &[DerivedId] {
        self.index
            .get(&source)
            .map(|&i| self.groups[i].targets.as_slice())
            .unwrap_or(&[])
    }

    pub fn groups(&self) -> &[DerivedGroup] {
        &self.groups
    }

    /// Every derived value affected by a write to `source`, each exactly
    /// once, ordered so a value comes after every affected value it reads.
    ///
    /// `property_of` maps a derived value to the property it is exposed as,
    /// which may itself be a source. Ties keep discovery order.
    pub fn propagation(&self, source: PropertyId, property_of: impl Fn(DerivedId) -> PropertyId) -> Vec<DerivedId> {
        // Reachable closure in discovery order
        let mut reached: Vec<DerivedId> = Vec::new();
        let mut queue = VecDeque::from([source]);
        while let Some(current) = queue.pop_front() {
            for &target in self.dependents(current) {
                if !reached.contains(&target) {
                    reached.push(target);
                    queue.push_back(property_of(target));
                }
            }
        }

        // Kahn over the reached subgraph
        let mut indegree: FxHashMap<DerivedId, usize> = reached.iter().map(|&d| (d, 0)).collect();
        for &d in &reached {
            for dependent in self.dependents(property_of(d)) {
                if let Some(count) = indegree.get_mut(dependent) {
                    *count += 1;
                }
            }
        }

        let mut order = Vec::with_capacity(reached.len());
        let mut done = vec![false; reached.len()];
        while order.len() < reached.len() {
            let Some(next) = (0..reached.len()).find(|&i| !done[i] && indegree[&reached[i]] == 0) else {
                // Only reachable through a cycle, which the builder rejects
                break;
            };
            done[next] = true;
            let d = reached[next];
            order.push(d);
            for dependent in self.dependents(property_of(d)) {
                if let Some(count) = indegree.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                }
            }
        }
        order
    }
}

/// Resolved command enablement binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enablement {
    pub property: PropertyId,
    pub name: String,
}

/// A command generated for an annotated method.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDescriptor {
    pub method: String,
    /// Generated property, `{Method}Command`
    pub property_name: String,
    /// Memoization field
    pub slot: String,
    pub argument_type: Option<TypeRef>,
    /// Result type with any `Task<>` unwrapped; `None` for void
    pub return_type: Option<TypeRef>,
    pub is_async: bool,
    /// `None` means always enabled
    pub enablement: Option<Enablement>,
    pub span: Span,
}

/// One key to target binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleBindingDescriptor {
    pub key: PropertyId,
    pub key_name: String,
    pub target: PropertyId,
    pub target_name: String,
    pub registry: String,
    pub grouping: Option<String>,
    pub retain_value_on_key_change: bool,
    pub span: Span,
}

/// Bindings registered on one locale object, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleGrouping {
    /// `None` for the default shared grouping
    pub name: Option<String>,
    pub bindings: Vec<LocaleBindingDescriptor>,
}

/// Groupings for one resource registry, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleRegistryGroup {
    pub registry: String,
    pub groupings: Vec<LocaleGrouping>,
}

/// Everything the emitter needs to know about one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassModel {
    pub name: String,
    pub namespace: Option<String>,
    pub usings: Vec<String>,
    pub type_params: Vec<String>,
    /// Accessibility keyword of the declaration, if any
    pub accessibility: Option<String>,
    pub is_abstract: bool,
    /// Derives from the base type owning the virtual init hook
    pub is_extensible_base: bool,
    pub init_method: String,
    pub members: MemberTable,
    pub mutable_properties: Vec<PropertyDescriptor>,
    pub derived: Vec<DerivedPropertyDescriptor>,
    pub graph: DependencyGraph,
    pub statics: StaticTable,
    pub commands: Vec<CommandDescriptor>,
    pub locale_groups: Vec<LocaleRegistryGroup>,
    /// Change hooks the class implements itself
    pub declared_hooks: Vec<String>,
    pub span: Span,
}

impl ClassModel {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// `Name` or `Name<T, U>`
    pub fn display_name(&self) -> String {
        if self.type_params.is_empty() {
            self.name.clone()
        } else {
            format!("{}<{}>", self.name, self.type_params.join(", "))
        }
    }

    /// Namespace-qualified display name.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.display_name()),
            None => self.display_name(),
        }
    }

    pub fn derived(&self, id: DerivedId) -> &DerivedPropertyDescriptor {
        &self.derived[id.0 as usize]
    }

    pub fn mutable(&self, id: PropertyId) -> Option<&PropertyDescriptor> {
        self.mutable_properties.iter().find(|p| p.id == id)
    }

    /// Derived descriptor exposed as property `id`.
    pub fn derived_for(&self, id: PropertyId) -> Option<&DerivedPropertyDescriptor> {
        match self.members.get(id).role {
            PropertyRole::Derived(d) => Some(self.derived(d)),
            _ => None,
        }
    }

    /// Affected derived values for a write to `source`, in recompute order.
    pub fn propagation(&self, source: PropertyId) -> Vec<DerivedId> {
        self.graph.propagation(source, |d| self.derived(d).property)
    }

    /// Cached derived values computed during initialization, in an order
    /// where every value precedes the values that read it.
    pub fn initialization_order(&self) -> Vec<DerivedId> {
        let mut order: Vec<DerivedId> = Vec::new();
        let mut visiting: Vec<DerivedId> = Vec::new();
        for d in &self.derived {
            self.visit_for_init(d.id, &mut order, &mut visiting);
        }
        order
    }

    fn visit_for_init(&self, id: DerivedId, order: &mut Vec<DerivedId>, visiting: &mut Vec<DerivedId>) {
        if order.contains(&id) || visiting.contains(&id) {
            return;
        }
        visiting.push(id);
        for &source in &self.derived(id).sources {
            if let PropertyRole::Derived(upstream) = self.members.get(source).role {
                self.visit_for_init(upstream, order, visiting);
            }
        }
        visiting.pop();
        order.push(id);
    }

    /// Whether the class implements `hook` itself.
    pub fn declares_hook(&self, hook: &str) -> bool {
        self.declared_hooks.iter().any(|h| h == hook)
    }
}

/// `Name` to `_name`.
pub fn slot_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("_{}{}", first.to_lowercase(), chars.as_str()),
        None => "_".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_name() {
        assert_eq!(slot_name("Verified"), "_verified");
        assert_eq!(slot_name("ID"), "_iD");
    }

    #[test]
    fn test_add_edge_dedups() {
        let mut graph = DependencyGraph::new();
        assert!(graph.add_edge(PropertyId(0), DerivedId(0)));
        assert!(!graph.add_edge(PropertyId(0), DerivedId(0)));
        assert!(graph.add_edge(PropertyId(0), DerivedId(1)));
        assert_eq!(graph.dependents(PropertyId(0)), &[DerivedId(0), DerivedId(1)]);
        assert!(graph.dependents(PropertyId(7)).is_empty());
    }

    #[test]
    fn test_propagation_visits_diamond_once() {
        // P(0) -> A(d0, p1), B(d1, p2); A, B -> C(d2, p3)
        let mut graph = DependencyGraph::new();
        graph.add_edge(PropertyId(0), DerivedId(0));
        graph.add_edge(PropertyId(0), DerivedId(1));
        graph.add_edge(PropertyId(1), DerivedId(2));
        graph.add_edge(PropertyId(2), DerivedId(2));
        let order = graph.propagation(PropertyId(0), |d| PropertyId(d.0 + 1));
        assert_eq!(order, vec![DerivedId(0), DerivedId(1), DerivedId(2)]);
    }

    #[test]
    fn test_propagation_orders_after_upstream() {
        // P(0) -> C(d0, p3) and P(0) -> A(d1, p1); A -> C
        let mut graph = DependencyGraph::new();
        graph.add_edge(PropertyId(0), DerivedId(0));
        graph.add_edge(PropertyId(0), DerivedId(1));
        graph.add_edge(PropertyId(1), DerivedId(0));
        let property_of = |d: DerivedId| if d.0 == 0 { PropertyId(3) } else { PropertyId(1) };
        let order = graph.propagation(PropertyId(0), property_of);
        assert_eq!(order, vec![DerivedId(1), DerivedId(0)]);
    }

    #[test]
    fn test_cache_policy_parse() {
        assert_eq!(CachePolicy::from_variant("Disabled"), Some(CachePolicy::Disabled));
        assert_eq!(CachePolicy::default(), CachePolicy::EagerAtInit);
        assert!(CachePolicy::from_variant("Never").is_none());
    }
}
