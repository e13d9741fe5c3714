//! Scheme evaluation

use crate::catalog::RuleCatalog;
use crate::rule::CompiledRule;
use hyperscore_types::{Element, EvaluationResult, RuleId, Scheme, SchemeId, ScoredElement};
use std::collections::BTreeMap;

/// Score every element against a scheme's weighted rules.
///
/// A rule contributes `apply(rule, element) * scheme_weight` when its own
/// score is strictly positive. Elements with a positive
/// total are selected, in input order. Rule ids the catalog does not know
/// are skipped.
pub fn evaluate(scheme: &Scheme, elements: &[Element], rules: &RuleCatalog) -> EvaluationResult {
    let weighted: Vec<(&RuleId, f64, &CompiledRule)> = scheme
        .rule_weights
        .iter()
        .filter_map(|(id, weight)| rules.get(id.as_str()).map(|rule| (id, *weight, rule)))
        .collect();

    let mut selected_elements = Vec::new();
    let mut scheme_score = 0.0;

    for element in elements {
        let mut element_score = 0.0;
        let mut rule_scores = BTreeMap::new();

        for (rule_id, weight, rule) in &weighted {
            let rule_score = rule.apply(element);
            if rule_score > 0.0 {
                let contribution = rule_score * weight;
                element_score += contribution;
                rule_scores.insert((*rule_id).clone(), contribution);
            }
        }

        if element_score > 0.0 {
            scheme_score += element_score;
            selected_elements.push(ScoredElement {
                element: element.clone(),
                score: element_score,
                rule_scores,
            });
        }
    }

    tracing::debug!(
        scheme_id = %scheme.id,
        rules = weighted.len(),
        skipped_rules = scheme.rule_weights.len() - weighted.len(),
        elements = elements.len(),
        selected = selected_elements.len(),
        scheme_score,
        "Evaluated scheme"
    );

    EvaluationResult {
        scheme_id: scheme.id.clone(),
        scheme_name: scheme.name.clone(),
        scheme_description: scheme.description.clone(),
        scheme_score,
        selected_elements,
    }
}

/// Evaluate several schemes against the same snapshot
pub fn evaluate_all<'a>(
    schemes: impl IntoIterator<Item = &'a Scheme>,
    elements: &[Element],
    rules: &RuleCatalog,
) -> BTreeMap<SchemeId, EvaluationResult> {
    schemes
        .into_iter()
        .map(|scheme| (scheme.id.clone(), evaluate(scheme, elements, rules)))
        .collect()
}
