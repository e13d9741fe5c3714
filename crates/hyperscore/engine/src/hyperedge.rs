//! Hyperedge derivation
//!
//! Two read-only views over a snapshot: which elements each rule matches,
//! and which rules each scheme uses. Empty hyperedges are omitted.

use crate::catalog::RuleCatalog;
use crate::rule::CompiledRule;
use hyperscore_types::{
    Element, HyperedgeElement, HyperedgeRule, RuleElementHyperedge, Scheme, SchemeRuleHyperedge,
};

/// Elements a single rule scores positively, or `None` if it matches nothing
pub fn rule_element_hyperedge(
    rule: &CompiledRule,
    elements: &[Element],
) -> Option<RuleElementHyperedge> {
    let mut total_score = 0.0;
    let matched: Vec<HyperedgeElement> = elements
        .iter()
        .filter_map(|element| {
            let score = rule.apply(element);
            (score > 0.0).then(|| {
                total_score += score;
                HyperedgeElement {
                    element_id: element.id.clone(),
                    element_name: element.display_name().to_string(),
                    element_type: element.element_type.clone(),
                    score,
                }
            })
        })
        .collect();

    if matched.is_empty() {
        return None;
    }

    Some(RuleElementHyperedge {
        id: RuleElementHyperedge::edge_id(&rule.rule.id),
        rule_id: rule.rule.id.clone(),
        rule_name: rule.rule.name.clone(),
        elements_count: matched.len(),
        elements: matched,
        total_score,
    })
}

/// Rule→element hyperedges for every rule in catalog order
pub fn rule_element_hyperedges(
    rules: &RuleCatalog,
    elements: &[Element],
) -> Vec<RuleElementHyperedge> {
    let hyperedges: Vec<RuleElementHyperedge> = rules
        .iter()
        .filter_map(|rule| rule_element_hyperedge(rule, elements))
        .collect();

    tracing::debug!(
        rules = rules.len(),
        elements = elements.len(),
        hyperedges = hyperedges.len(),
        "Derived rule-element hyperedges"
    );
    hyperedges
}

/// Rules a scheme uses that exist in the catalog, or `None` if there are none
pub fn scheme_rule_hyperedge(scheme: &Scheme, rules: &RuleCatalog) -> Option<SchemeRuleHyperedge> {
    let used: Vec<HyperedgeRule> = scheme
        .rule_weights
        .iter()
        .filter_map(|(rule_id, weight)| {
            rules.get(rule_id.as_str()).map(|compiled| HyperedgeRule {
                rule_id: rule_id.clone(),
                rule_name: compiled.rule.name.clone(),
                weight: *weight,
                description: compiled.rule.description.clone(),
            })
        })
        .collect();

    if used.is_empty() {
        return None;
    }

    Some(SchemeRuleHyperedge {
        id: SchemeRuleHyperedge::edge_id(&scheme.id),
        scheme_id: scheme.id.clone(),
        scheme_name: scheme.name.clone(),
        rules_count: used.len(),
        rules: used,
    })
}

/// Scheme→rule hyperedges for every scheme given
pub fn scheme_rule_hyperedges<'a>(
    schemes: impl IntoIterator<Item = &'a Scheme>,
    rules: &RuleCatalog,
) -> Vec<SchemeRuleHyperedge> {
    schemes
        .into_iter()
        .filter_map(|scheme| scheme_rule_hyperedge(scheme, rules))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperscore_types::Rule;
    use serde_json::json;

    fn elements() -> Vec<Element> {
        vec![
            Element::new("H1", "住宿")
                .with_attribute("name", json!("经济酒店"))
                .with_attribute("价格", json!(300)),
            Element::new("H2", "住宿")
                .with_attribute("name", json!("豪华酒店"))
                .with_attribute("价格", json!(1000)),
            Element::new("H3", "住宿").with_attribute("价格", json!(150)),
        ]
    }

    fn rules() -> RuleCatalog {
        RuleCatalog::compile(vec![
            Rule::new("budget")
                .with_types(["住宿"])
                .with_keys(["价格"])
                .with_description("cheap stays")
                .with_body("return 1.0 if attrs['价格'] < 500 else 0.0"),
            Rule::new("never").with_body("return 0"),
        ])
    }

    #[test]
    fn test_rule_element_hyperedges() {
        let hyperedges = rule_element_hyperedges(&rules(), &elements());
        assert_eq!(hyperedges.len(), 1, "rules matching nothing are omitted");

        let edge = &hyperedges[0];
        assert_eq!(edge.id, "rule_edge_budget");
        assert_eq!(edge.elements_count, 2);
        assert_eq!(edge.total_score, 2.0);
        assert_eq!(edge.elements[0].element_name, "经济酒店");
        assert_eq!(edge.elements[1].element_name, "H3");
    }

    #[test]
    fn test_scheme_rule_hyperedges() {
        let schemes = vec![
            Scheme::new("eco")
                .with_rule("budget", 2.0)
                .with_rule("ghost", 1.0),
            Scheme::new("empty").with_rule("ghost", 1.0),
        ];
        let hyperedges = scheme_rule_hyperedges(&schemes, &rules());
        assert_eq!(hyperedges.len(), 1);

        let edge = &hyperedges[0];
        assert_eq!(edge.id, "scheme_edge_eco");
        assert_eq!(edge.rules_count, 1);
        assert_eq!(edge.rules[0].weight, 2.0);
        assert_eq!(edge.rules[0].description, "cheap stays");
    }
}
