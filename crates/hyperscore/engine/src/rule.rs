//! Rule application

use crate::flatten::effective_attributes;
use crate::scorer::{self, Scorer};
use hyperscore_dsl::DslError;
use hyperscore_types::{Element, Parameters, Rule};
use std::sync::Arc;

/// A rule together with its compiled scorer
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    scorer: Arc<dyn Scorer>,
    compile_error: Option<DslError>,
}

impl CompiledRule {
    /// Compile the rule's scoring body. A body that does not compile is
    /// logged and replaced by a scorer that always returns 0.
    pub fn compile(rule: Rule) -> Self {
        let compiled = scorer::compile(&rule.scoring_body);
        if let Some(error) = &compiled.error {
            tracing::warn!(
                rule_id = %rule.id,
                rule_name = %rule.name,
                error = %error,
                "Rule body failed to compile; rule will score 0"
            );
        }
        Self {
            rule,
            scorer: compiled.scorer,
            compile_error: compiled.error,
        }
    }

    /// Build from an explicit scorer
    pub fn with_scorer(rule: Rule, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            rule,
            scorer,
            compile_error: None,
        }
    }

    pub fn compile_error(&self) -> Option<&DslError> {
        self.compile_error.as_ref()
    }

    /// Score one element with the rule's own parameters
    pub fn apply(&self, element: &Element) -> f64 {
        self.apply_with_overrides(element, &Parameters::new())
    }

    /// Score one element; `overrides` win over the rule's parameters.
    ///
    /// Returns 0 when the element's type is filtered out, when a required
    /// key is missing, when the scorer fails, or when the raw score is not
    /// positive. Otherwise returns `raw * rule.weight`.
    pub fn apply_with_overrides(&self, element: &Element, overrides: &Parameters) -> f64 {
        if !self.rule.applies_to_type(&element.element_type) {
            return 0.0;
        }

        let attributes = effective_attributes(&element.attributes);
        if !self
            .rule
            .affected_element_keys
            .iter()
            .all(|key| attributes.contains_key(key))
        {
            return 0.0;
        }

        let parameters = if overrides.is_empty() {
            self.rule.parameters.clone()
        } else {
            let mut merged = self.rule.parameters.clone();
            merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        };

        match self.scorer.score(&attributes, &parameters) {
            Ok(raw) if raw > 0.0 => raw * self.rule.weight,
            Ok(_) => 0.0,
            Err(error) => {
                tracing::warn!(
                    rule_id = %self.rule.id,
                    rule_name = %self.rule.name,
                    element_id = %element.id,
                    error = %error,
                    "Rule failed on element; scoring 0"
                );
                0.0
            }
        }
    }
}
