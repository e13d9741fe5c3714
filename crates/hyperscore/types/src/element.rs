//! Elements: the typed records being scored

use crate::errors::{require_text, ModelResult};
use crate::ElementId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form attribute mapping of an element
pub type Attributes = serde_json::Map<String, Value>;

/// Key of the legacy nested attribute mapping produced by older upstream data
pub const NESTED_ATTRIBUTES_KEY: &str = "attributes";

/// A typed record with free-form attributes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    /// Bucket the element belongs to (e.g. "景点", "住宿")
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Element {
    pub fn new(id: impl Into<ElementId>, element_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Display name: the `name` attribute when it is a string, else the id
    pub fn display_name(&self) -> &str {
        match self.attributes.get("name") {
            Some(Value::String(name)) => name,
            _ => self.id.as_str(),
        }
    }

    /// Merge-patch attributes: existing keys are overwritten, new keys added,
    /// all other keys left untouched.
    pub fn merge_attributes(&mut self, patch: Attributes) {
        for (key, value) in patch {
            self.attributes.insert(key, value);
        }
    }
}

/// Request to create an element
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewElement {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl NewElement {
    pub fn validate(&self) -> ModelResult<()> {
        require_text("id", self.id.as_str())?;
        require_text("type", &self.element_type)
    }

    pub fn into_element(self) -> Element {
        Element {
            id: self.id,
            element_type: self.element_type,
            attributes: self.attributes,
        }
    }
}

/// Attribute merge-patch for an existing element
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementPatch {
    #[serde(default)]
    pub attributes: Attributes,
}
