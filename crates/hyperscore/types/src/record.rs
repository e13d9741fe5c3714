use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog entity as returned by the service, with its timestamps.
///
/// The entity's own fields are flattened into the top level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    #[serde(flatten)]
    pub data: T,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T> Record<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Record<U> {
        Record {
            data: f(self.data),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Element;

    #[test]
    fn test_record_flattens_data() {
        let now = Utc::now();
        let record = Record {
            data: Element::new("A1", "景点"),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "A1");
        assert_eq!(json["type"], "景点");
        assert!(json.get("created_at").is_some());
        assert!(json.get("data").is_none());
    }
}
