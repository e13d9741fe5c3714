//! Derived views: evaluation results and hyperedges
//!
//! None of these are persisted. They are recomputed from the catalogs on
//! every call.

use crate::{Element, ElementId, Record, RuleId, Scheme, SchemeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An element selected by a scheme, with its weighted scores
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredElement {
    #[serde(flatten)]
    pub element: Element,
    /// Sum of the weighted per-rule scores
    pub score: f64,
    /// Weighted score per contributing rule; rules that scored 0 are absent
    pub rule_scores: BTreeMap<RuleId, f64>,
}

/// Result of evaluating one scheme against the element catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub scheme_id: SchemeId,
    pub scheme_name: String,
    pub scheme_description: String,
    pub scheme_score: f64,
    /// Elements with a positive total, in catalog order
    pub selected_elements: Vec<ScoredElement>,
}

/// One element matched by a rule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HyperedgeElement {
    pub element_id: ElementId,
    pub element_name: String,
    pub element_type: String,
    pub score: f64,
}

/// All elements a rule scores positively
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleElementHyperedge {
    pub id: String,
    pub rule_id: RuleId,
    pub rule_name: String,
    pub elements_count: usize,
    pub elements: Vec<HyperedgeElement>,
    pub total_score: f64,
}

impl RuleElementHyperedge {
    pub fn edge_id(rule_id: &RuleId) -> String {
        format!("rule_edge_{}", rule_id)
    }
}

/// One rule used by a scheme
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HyperedgeRule {
    pub rule_id: RuleId,
    pub rule_name: String,
    /// Weight the scheme assigns to the rule
    pub weight: f64,
    pub description: String,
}

/// All resolvable rules a scheme uses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemeRuleHyperedge {
    pub id: String,
    pub scheme_id: SchemeId,
    pub scheme_name: String,
    pub rules_count: usize,
    pub rules: Vec<HyperedgeRule>,
}

impl SchemeRuleHyperedge {
    pub fn edge_id(scheme_id: &SchemeId) -> String {
        format!("scheme_edge_{}", scheme_id)
    }
}

/// Response to creating a standalone scheme
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemeCreated {
    pub scheme: Record<Scheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme_rule_hyperedge: Option<SchemeRuleHyperedge>,
    #[serde(default)]
    pub rule_element_hyperedges: Vec<RuleElementHyperedge>,
}
