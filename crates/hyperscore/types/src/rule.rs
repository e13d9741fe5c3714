//! Rules: weighted, filtered scoring bodies

use crate::errors::{require_finite, require_text, ModelResult};
use crate::RuleId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Named parameter values passed to a scoring body
pub type Parameters = serde_json::Map<String, Value>;

fn default_weight() -> f64 {
    1.0
}

/// A scoring rule as stored in the catalog.
///
/// The scoring body is source text. The service compiles it once per rule
/// snapshot and reuses the compiled form until the snapshot's TTL expires or
/// the cache is invalidated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Element types this rule applies to; empty applies to all types
    #[serde(default)]
    pub affected_element_types: BTreeSet<String>,
    /// Attribute keys an element must carry; empty disables the check
    #[serde(default)]
    pub affected_element_keys: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "code")]
    pub scoring_body: String,
    /// Default parameter values visible to the body as `params`
    #[serde(default)]
    pub parameters: Parameters,
}

impl Rule {
    /// Create a rule whose id is derived from its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: RuleId::from_name(&name),
            name,
            weight: 1.0,
            affected_element_types: BTreeSet::new(),
            affected_element_keys: BTreeSet::new(),
            description: String::new(),
            scoring_body: String::new(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<RuleId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_element_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_element_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.scoring_body = body.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Whether the rule's type filter admits `element_type`
    pub fn applies_to_type(&self, element_type: &str) -> bool {
        self.affected_element_types.is_empty() || self.affected_element_types.contains(element_type)
    }

    /// Check a stored rule the way [`NewRule::validate`] checks a request,
    /// plus a non-empty id
    pub fn validate(&self) -> ModelResult<()> {
        require_text("id", self.id.as_str())?;
        require_text("name", &self.name)?;
        require_finite("weight", self.weight)
    }

    /// Apply a patch in place. Returns `true` when the scoring body changed.
    pub fn apply_patch(&mut self, patch: RulePatch) -> bool {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(weight) = patch.weight {
            self.weight = weight;
        }
        if let Some(types) = patch.affected_element_types {
            self.affected_element_types = types;
        }
        if let Some(keys) = patch.affected_element_keys {
            self.affected_element_keys = keys;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(parameters) = patch.parameters {
            self.parameters = parameters;
        }
        match patch.scoring_body {
            Some(body) if body != self.scoring_body => {
                self.scoring_body = body;
                true
            }
            _ => false,
        }
    }
}

/// Request to create a rule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewRule {
    /// Explicit id; derived from the name when absent
    #[serde(default)]
    pub id: Option<RuleId>,
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub affected_element_types: BTreeSet<String>,
    #[serde(default)]
    pub affected_element_keys: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "code")]
    pub scoring_body: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl NewRule {
    pub fn validate(&self) -> ModelResult<()> {
        require_text("name", &self.name)?;
        require_finite("weight", self.weight)
    }

    /// Id this rule asks for before collision handling
    pub fn requested_id(&self) -> RuleId {
        self.id
            .clone()
            .unwrap_or_else(|| RuleId::from_name(&self.name))
    }

    pub fn into_rule(self, id: RuleId) -> Rule {
        Rule {
            id,
            name: self.name,
            weight: self.weight,
            affected_element_types: self.affected_element_types,
            affected_element_keys: self.affected_element_keys,
            description: self.description,
            scoring_body: self.scoring_body,
            parameters: self.parameters,
        }
    }
}

impl From<Rule> for NewRule {
    fn from(rule: Rule) -> Self {
        Self {
            id: Some(rule.id),
            name: rule.name,
            weight: rule.weight,
            affected_element_types: rule.affected_element_types,
            affected_element_keys: rule.affected_element_keys,
            description: rule.description,
            scoring_body: rule.scoring_body,
            parameters: rule.parameters,
        }
    }
}

/// Partial update of a rule; absent fields are left untouched
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RulePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub affected_element_types: Option<BTreeSet<String>>,
    #[serde(default)]
    pub affected_element_keys: Option<BTreeSet<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "code")]
    pub scoring_body: Option<String>,
    #[serde(default)]
    pub parameters: Option<Parameters>,
}

impl RulePatch {
    pub fn validate(&self) -> ModelResult<()> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(weight) = self.weight {
            require_finite("weight", weight)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelError;

    #[test]
    fn test_deserialize_defaults_and_code_alias() {
        let rule: Rule = serde_json::from_str(
            r#"{"id": "rule_budget", "name": "经济型住宿", "code": "return 1.0"}"#,
        )
        .unwrap();
        assert_eq!(rule.weight, 1.0);
        assert!(rule.affected_element_types.is_empty());
        assert_eq!(rule.scoring_body, "return 1.0");
    }

    #[test]
    fn test_applies_to_type() {
        let any = Rule::new("any");
        assert!(any.applies_to_type("住宿"));

        let scoped = Rule::new("scoped").with_types(["景点"]);
        assert!(scoped.applies_to_type("景点"));
        assert!(!scoped.applies_to_type("住宿"));
    }

    #[test]
    fn test_apply_patch_reports_body_change() {
        let mut rule = Rule::new("Budget").with_body("return 1.0");

        let renamed = rule.apply_patch(RulePatch {
            name: Some("Budget Stay".into()),
            ..Default::default()
        });
        assert!(!renamed);
        assert_eq!(rule.name, "Budget Stay");
        assert_eq!(rule.id.as_str(), "budget");

        let rebodied = rule.apply_patch(RulePatch {
            scoring_body: Some("return 2.0".into()),
            ..Default::default()
        });
        assert!(rebodied);
    }

    #[test]
    fn test_new_rule_validation() {
        let mut request: NewRule = Rule::new("Ok").into();
        assert!(request.validate().is_ok());
        assert_eq!(request.requested_id().as_str(), "ok");

        request.weight = f64::NAN;
        assert!(matches!(
            request.validate(),
            Err(ModelError::InvalidValue { field: "weight", .. })
        ));
    }

    #[test]
    fn test_stored_rule_validation() {
        assert!(Rule::new("Ok").validate().is_ok());
        assert!(matches!(
            Rule::new("Ok").with_weight(f64::INFINITY).validate(),
            Err(ModelError::InvalidValue { field: "weight", .. })
        ));
        assert_eq!(
            Rule::new("Ok").with_id("").validate(),
            Err(ModelError::MissingField("id"))
        );

        let mut unnamed = Rule::new("Ok");
        unnamed.name = " ".into();
        assert_eq!(unnamed.validate(), Err(ModelError::MissingField("name")));
    }
}
