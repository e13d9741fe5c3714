//! Schemes and the hypergraphs that group them

use crate::errors::{require_finite, require_text, ModelResult};
use crate::{HypergraphId, RuleId, SchemeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A named, weighted combination of rules.
///
/// Weights are keyed by rule id and iterated in ascending id order. A scheme
/// never caches scores; it is evaluated on demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scheme {
    pub id: SchemeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rule_weights: BTreeMap<RuleId, f64>,
    /// Owning hypergraph; `None` for standalone schemes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypergraph_id: Option<HypergraphId>,
}

impl Scheme {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: SchemeId::from_name(&name),
            name,
            description: String::new(),
            rule_weights: BTreeMap::new(),
            hypergraph_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<SchemeId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_rule(mut self, rule_id: impl Into<RuleId>, weight: f64) -> Self {
        self.rule_weights.insert(rule_id.into(), weight);
        self
    }

    pub fn in_hypergraph(mut self, hypergraph_id: HypergraphId) -> Self {
        self.hypergraph_id = Some(hypergraph_id);
        self
    }

    pub fn is_standalone(&self) -> bool {
        self.hypergraph_id.is_none()
    }

    pub fn apply_patch(&mut self, patch: SchemePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(weights) = patch.rule_weights {
            self.rule_weights = weights;
        }
    }
}

fn validate_weights(weights: &BTreeMap<RuleId, f64>) -> ModelResult<()> {
    weights
        .values()
        .try_for_each(|weight| require_finite("rule_weights", *weight))
}

/// Request to create a scheme
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewScheme {
    #[serde(default)]
    pub id: Option<SchemeId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rule_weights: BTreeMap<RuleId, f64>,
}

impl NewScheme {
    pub fn validate(&self) -> ModelResult<()> {
        require_text("name", &self.name)?;
        validate_weights(&self.rule_weights)
    }

    pub fn requested_id(&self) -> SchemeId {
        self.id
            .clone()
            .unwrap_or_else(|| SchemeId::from_name(&self.name))
    }

    pub fn into_scheme(self, id: SchemeId, hypergraph_id: Option<HypergraphId>) -> Scheme {
        Scheme {
            id,
            name: self.name,
            description: self.description,
            rule_weights: self.rule_weights,
            hypergraph_id,
        }
    }
}

/// Partial update of a scheme
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rule_weights: Option<BTreeMap<RuleId, f64>>,
}

impl SchemePatch {
    pub fn validate(&self) -> ModelResult<()> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        match &self.rule_weights {
            Some(weights) => validate_weights(weights),
            None => Ok(()),
        }
    }
}

/// Parent aggregate grouping schemes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hypergraph {
    pub id: HypergraphId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Request to create a hypergraph
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewHypergraph {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewHypergraph {
    pub fn validate(&self) -> ModelResult<()> {
        require_text("name", &self.name)
    }

    pub fn into_hypergraph(self, id: HypergraphId) -> Hypergraph {
        Hypergraph {
            id,
            name: self.name,
            description: self.description,
        }
    }
}

/// Listing view of a hypergraph.
///
/// Element and rule counts describe the shared catalogs; only the scheme
/// count is specific to the hypergraph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HypergraphSummary {
    pub id: HypergraphId,
    pub name: String,
    pub description: String,
    pub elements_count: usize,
    pub rules_count: usize,
    pub schemes_count: usize,
    pub element_types: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelError;

    #[test]
    fn test_scheme_builder() {
        let scheme = Scheme::new("Budget Trip")
            .with_rule("rule_budget", 2.0)
            .with_rule("rule_season", 1.0);

        assert_eq!(scheme.id.as_str(), "budget_trip");
        assert!(scheme.is_standalone());
        let order: Vec<&str> = scheme.rule_weights.keys().map(RuleId::as_str).collect();
        assert_eq!(order, vec!["rule_budget", "rule_season"]);
    }

    #[test]
    fn test_standalone_scheme_omits_hypergraph_id() {
        let json = serde_json::to_value(Scheme::new("s")).unwrap();
        assert!(json.get("hypergraph_id").is_none());

        let nested = Scheme::new("s").in_hypergraph(HypergraphId::new("hg"));
        let json = serde_json::to_value(nested).unwrap();
        assert_eq!(json["hypergraph_id"], "hg");
    }

    #[test]
    fn test_new_scheme_validation() {
        let blank = NewScheme {
            id: None,
            name: "".into(),
            description: String::new(),
            rule_weights: BTreeMap::new(),
        };
        assert_eq!(blank.validate(), Err(ModelError::MissingField("name")));

        let mut infinite = blank.clone();
        infinite.name = "ok".into();
        infinite
            .rule_weights
            .insert(RuleId::new("r"), f64::INFINITY);
        assert!(infinite.validate().is_err());
    }

    #[test]
    fn test_patch_replaces_weights() {
        let mut scheme = Scheme::new("s").with_rule("a", 1.0);
        let mut weights = BTreeMap::new();
        weights.insert(RuleId::new("b"), 3.0);
        scheme.apply_patch(SchemePatch {
            rule_weights: Some(weights),
            ..Default::default()
        });
        assert!(!scheme.rule_weights.contains_key("a"));
        assert_eq!(scheme.rule_weights.get("b"), Some(&3.0));
    }

    #[test]
    fn test_new_hypergraph_requires_name() {
        let request = NewHypergraph {
            name: "  ".into(),
            description: "d".into(),
        };
        assert!(request.validate().is_err());
    }
}
