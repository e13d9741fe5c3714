use crate::model::{ElementFilter, RuleFilter, SchemeFilter, SchemeKey, Stored};
use crate::StorageResult;
use async_trait::async_trait;
use hyperscore_types::{Element, ElementId, Hypergraph, HypergraphId, Rule, RuleId, Scheme};

/// Storage interface for elements. Element ids are unique.
#[async_trait]
pub trait ElementStore: Send + Sync {
    /// List elements in insertion order.
    async fn find_elements(&self, filter: ElementFilter) -> StorageResult<Vec<Stored<Element>>>;

    async fn get_element(&self, id: &ElementId) -> StorageResult<Option<Stored<Element>>>;

    /// Insert a new element; fails with `Conflict` if the id exists.
    async fn insert_element(&self, element: Element) -> StorageResult<Stored<Element>>;

    /// Insert or replace by id, keeping `created_at` of a replaced record.
    async fn upsert_element(&self, element: Element) -> StorageResult<Stored<Element>>;

    /// Returns whether a record was removed.
    async fn delete_element(&self, id: &ElementId) -> StorageResult<bool>;

    async fn count_elements(&self) -> StorageResult<usize>;
}

/// Storage interface for rules. Rule ids are unique.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn find_rules(&self, filter: RuleFilter) -> StorageResult<Vec<Stored<Rule>>>;
    async fn get_rule(&self, id: &RuleId) -> StorageResult<Option<Stored<Rule>>>;
    async fn upsert_rule(&self, rule: Rule) -> StorageResult<Stored<Rule>>;
    async fn delete_rule(&self, id: &RuleId) -> StorageResult<bool>;
    async fn count_rules(&self) -> StorageResult<usize>;
}

/// Storage interface for schemes, keyed by parent hypergraph and id.
#[async_trait]
pub trait SchemeStore: Send + Sync {
    async fn find_schemes(&self, filter: SchemeFilter) -> StorageResult<Vec<Stored<Scheme>>>;
    async fn get_scheme(&self, key: &SchemeKey) -> StorageResult<Option<Stored<Scheme>>>;
    async fn upsert_scheme(&self, scheme: Scheme) -> StorageResult<Stored<Scheme>>;
    async fn delete_scheme(&self, key: &SchemeKey) -> StorageResult<bool>;
}

/// Storage interface for hypergraph aggregates.
#[async_trait]
pub trait HypergraphStore: Send + Sync {
    async fn find_hypergraphs(&self) -> StorageResult<Vec<Stored<Hypergraph>>>;
    async fn get_hypergraph(&self, id: &HypergraphId) -> StorageResult<Option<Stored<Hypergraph>>>;
    async fn upsert_hypergraph(&self, hypergraph: Hypergraph) -> StorageResult<Stored<Hypergraph>>;

    /// Removes the hypergraph record only; nested schemes are left to the
    /// caller.
    async fn delete_hypergraph(&self, id: &HypergraphId) -> StorageResult<bool>;
}

/// Unified storage bundle used by the Hyperscore service.
pub trait CatalogStore: ElementStore + RuleStore + SchemeStore + HypergraphStore + Send + Sync {}

impl<T> CatalogStore for T where T: ElementStore + RuleStore + SchemeStore + HypergraphStore + Send + Sync
{}
