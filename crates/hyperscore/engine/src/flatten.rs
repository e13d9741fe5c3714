//! Effective attributes
//!
//! Older upstream data nests an element's attributes under a key literally
//! named `attributes`, sometimes several levels deep. Scorers see a single
//! flat mapping: nested keys are lifted into the top level unless the outer
//! level already has them. The nested mapping itself stays in place.

use hyperscore_types::{Attributes, NESTED_ATTRIBUTES_KEY};
use serde_json::Value;

/// Flatten nested `attributes` mappings into the top level, outer keys
/// winning. Idempotent.
pub fn effective_attributes(attributes: &Attributes) -> Attributes {
    let mut flat = attributes.clone();
    if let Some(Value::Object(nested)) = attributes.get(NESTED_ATTRIBUTES_KEY) {
        for (key, value) in effective_attributes(nested) {
            flat.entry(key).or_insert(value);
        }
    }
    flat
}

/// Whether `attributes` carries a nested mapping that flattening would lift
pub fn has_nested_attributes(attributes: &Attributes) -> bool {
    matches!(attributes.get(NESTED_ATTRIBUTES_KEY), Some(Value::Object(_)))
}
