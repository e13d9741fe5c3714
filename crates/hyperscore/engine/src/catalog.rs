//! In-memory snapshots of the element and rule catalogs
//!
//! Every evaluation pass works on a fully materialized snapshot. Rules are
//! compiled when the snapshot is built, so an edited scoring body takes
//! effect on the next pass.

use crate::rule::CompiledRule;
use hyperscore_types::{slugify, Element, Rule, RuleId};
use std::collections::{BTreeMap, HashMap};

/// Elements in catalog order
#[derive(Debug, Clone, Default)]
pub struct ElementCatalog {
    elements: Vec<Element>,
}

impl ElementCatalog {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements grouped by type; each group keeps catalog order
    pub fn by_type(&self) -> BTreeMap<String, Vec<Element>> {
        let mut groups: BTreeMap<String, Vec<Element>> = BTreeMap::new();
        for element in &self.elements {
            groups
                .entry(element.element_type.clone())
                .or_default()
                .push(element.clone());
        }
        groups
    }

    pub fn of_type<'a>(&'a self, element_type: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements
            .iter()
            .filter(move |e| e.element_type == element_type)
    }
}

/// Compiled rules in catalog order, indexed by id
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<CompiledRule>,
    index: HashMap<RuleId, usize>,
}

impl RuleCatalog {
    /// Compile every rule. Rules whose body does not compile are kept with
    /// a degraded scorer.
    pub fn compile(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::from_compiled(rules.into_iter().map(CompiledRule::compile))
    }

    pub fn from_compiled(rules: impl IntoIterator<Item = CompiledRule>) -> Self {
        let rules: Vec<CompiledRule> = rules.into_iter().collect();
        let index = rules
            .iter()
            .enumerate()
            .map(|(i, compiled)| (compiled.rule.id.clone(), i))
            .collect();

        let degraded = rules.iter().filter(|r| r.compile_error().is_some()).count();
        tracing::debug!(rules = rules.len(), degraded, "Compiled rule catalog");

        Self { rules, index }
    }

    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolve a reference by id, then by name, then by slug of the reference
    pub fn resolve(&self, reference: &str) -> Option<&CompiledRule> {
        resolve_rule_ref(self.rules.iter(), reference, |compiled| &compiled.rule)
    }
}

/// Find the rule a user-supplied reference names.
///
/// Tried in order: exact id, exact name, id equal to `slugify(reference)`.
/// The first stage with a match wins.
pub fn resolve_rule_ref<'a, T, I, F>(rules: I, reference: &str, rule_of: F) -> Option<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    I::IntoIter: Clone,
    F: Fn(&T) -> &Rule,
{
    let rules = rules.into_iter();
    let slug = slugify(reference);
    rules
        .clone()
        .find(|r| rule_of(*r).id.as_str() == reference)
        .or_else(|| rules.clone().find(|r| rule_of(*r).name == reference))
        .or_else(|| rules.clone().find(|r| rule_of(*r).id.as_str() == slug))
}
