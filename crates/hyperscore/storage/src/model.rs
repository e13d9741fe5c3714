use chrono::{DateTime, Utc};
use hyperscore_types::{HypergraphId, Record, RuleId, SchemeId};
use uuid::Uuid;

/// A persisted record with store metadata.
///
/// `surrogate_id` is internal to the store and is dropped by
/// [`Stored::into_record`] before a record leaves the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub surrogate_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub record: T,
}

impl<T> Stored<T> {
    pub fn new(record: T, now: DateTime<Utc>) -> Self {
        Self {
            surrogate_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            record,
        }
    }

    pub fn into_record(self) -> Record<T> {
        Record {
            data: self.record,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Element query; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    pub element_type: Option<String>,
}

impl ElementFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(element_type: impl Into<String>) -> Self {
        Self {
            element_type: Some(element_type.into()),
        }
    }
}

/// Rule query; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub id: Option<RuleId>,
    pub name: Option<String>,
}

impl RuleFilter {
    pub fn all() -> Self {
        Self::default()
    }
}

/// Which schemes a query covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SchemeScope {
    #[default]
    All,
    Standalone,
    Hypergraph(HypergraphId),
}

impl SchemeScope {
    pub fn for_parent(hypergraph_id: Option<&HypergraphId>) -> Self {
        match hypergraph_id {
            Some(id) => Self::Hypergraph(id.clone()),
            None => Self::Standalone,
        }
    }

    pub fn contains(&self, hypergraph_id: Option<&HypergraphId>) -> bool {
        match self {
            Self::All => true,
            Self::Standalone => hypergraph_id.is_none(),
            Self::Hypergraph(id) => hypergraph_id == Some(id),
        }
    }
}

/// Scheme query
#[derive(Debug, Clone, Default)]
pub struct SchemeFilter {
    pub id: Option<SchemeId>,
    pub scope: SchemeScope,
}

impl SchemeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_scope(scope: SchemeScope) -> Self {
        Self { id: None, scope }
    }
}

/// Key of a scheme: scheme ids are unique within their parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemeKey {
    pub hypergraph_id: Option<HypergraphId>,
    pub id: SchemeId,
}

impl SchemeKey {
    pub fn new(hypergraph_id: Option<HypergraphId>, id: SchemeId) -> Self {
        Self { hypergraph_id, id }
    }
}
