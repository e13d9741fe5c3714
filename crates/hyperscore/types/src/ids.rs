//! Identifiers
//!
//! Every catalog entity is keyed by a string newtype. Rule and scheme ids
//! default to the [`slugify`]d name; hypergraph ids are random UUIDs.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Unique identifier of an element
    ElementId
);

string_id!(
    /// Unique identifier of a rule
    RuleId
);

string_id!(
    /// Unique identifier of a scheme
    SchemeId
);

string_id!(
    /// Unique identifier of a hypergraph aggregate
    HypergraphId
);

impl RuleId {
    /// Derive an id from a rule name
    pub fn from_name(name: &str) -> Self {
        Self(slugify(name))
    }
}

impl SchemeId {
    /// Derive an id from a scheme name
    pub fn from_name(name: &str) -> Self {
        Self(slugify(name))
    }
}

impl HypergraphId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Lower-case a name and replace spaces with underscores.
///
/// Only the ASCII space is replaced; other whitespace is kept verbatim so
/// that ids derived by older data stay stable.
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Append a short random suffix to an id that is already taken.
pub fn disambiguate(id: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", id, &suffix[..8])
}
