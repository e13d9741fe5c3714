//! In-memory reference implementation of the catalog storage traits.
//!
//! Deterministic and test-friendly: listings come back in insertion order,
//! and replacing a record keeps its position and `created_at`.

use crate::model::{ElementFilter, RuleFilter, SchemeFilter, SchemeKey, Stored};
use crate::traits::{ElementStore, HypergraphStore, RuleStore, SchemeStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use hyperscore_types::{Element, ElementId, Hypergraph, HypergraphId, Rule, RuleId, Scheme};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Row<T> {
    seq: u64,
    stored: Stored<T>,
}

/// One collection: rows by key plus an insertion counter for ordering
struct Table<K, T> {
    rows: HashMap<K, Row<T>>,
    next_seq: u64,
}

impl<K, T> Default for Table<K, T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Eq + Hash, T: Clone> Table<K, T> {
    fn list(&self, keep: impl Fn(&T) -> bool) -> Vec<Stored<T>> {
        let mut rows: Vec<&Row<T>> = self.rows.values().filter(|r| keep(&r.stored.record)).collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| r.stored.clone()).collect()
    }

    fn get(&self, key: &K) -> Option<Stored<T>> {
        self.rows.get(key).map(|r| r.stored.clone())
    }

    fn contains(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    fn upsert(&mut self, key: K, record: T) -> Stored<T> {
        let now = Utc::now();
        if let Some(row) = self.rows.get_mut(&key) {
            row.stored.record = record;
            row.stored.updated_at = now;
            return row.stored.clone();
        }

        let stored = Stored::new(record, now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rows.insert(
            key,
            Row {
                seq,
                stored: stored.clone(),
            },
        );
        stored
    }

    fn remove(&mut self, key: &K) -> bool {
        self.rows.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, name: &str) -> StorageResult<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| StorageError::Backend(format!("{} lock poisoned", name)))
}

fn write<'a, T>(lock: &'a RwLock<T>, name: &str) -> StorageResult<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| StorageError::Backend(format!("{} lock poisoned", name)))
}

/// In-memory catalog storage adapter.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    elements: RwLock<Table<ElementId, Element>>,
    rules: RwLock<Table<RuleId, Rule>>,
    schemes: RwLock<Table<SchemeKey, Scheme>>,
    hypergraphs: RwLock<Table<HypergraphId, Hypergraph>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ElementStore for InMemoryCatalogStore {
    async fn find_elements(&self, filter: ElementFilter) -> StorageResult<Vec<Stored<Element>>> {
        let guard = read(&self.elements, "elements")?;
        Ok(guard.list(|element| {
            filter
                .element_type
                .as_deref()
                .map_or(true, |t| element.element_type == t)
        }))
    }

    async fn get_element(&self, id: &ElementId) -> StorageResult<Option<Stored<Element>>> {
        let guard = read(&self.elements, "elements")?;
        Ok(guard.get(id))
    }

    async fn insert_element(&self, element: Element) -> StorageResult<Stored<Element>> {
        let mut guard = write(&self.elements, "elements")?;
        if guard.contains(&element.id) {
            return Err(StorageError::Conflict(format!(
                "element {} already exists",
                element.id
            )));
        }
        Ok(guard.upsert(element.id.clone(), element))
    }

    async fn upsert_element(&self, element: Element) -> StorageResult<Stored<Element>> {
        let mut guard = write(&self.elements, "elements")?;
        Ok(guard.upsert(element.id.clone(), element))
    }

    async fn delete_element(&self, id: &ElementId) -> StorageResult<bool> {
        let mut guard = write(&self.elements, "elements")?;
        Ok(guard.remove(id))
    }

    async fn count_elements(&self) -> StorageResult<usize> {
        Ok(read(&self.elements, "elements")?.len())
    }
}

#[async_trait]
impl RuleStore for InMemoryCatalogStore {
    async fn find_rules(&self, filter: RuleFilter) -> StorageResult<Vec<Stored<Rule>>> {
        let guard = read(&self.rules, "rules")?;
        Ok(guard.list(|rule| {
            filter.id.as_ref().map_or(true, |id| &rule.id == id)
                && filter.name.as_deref().map_or(true, |name| rule.name == name)
        }))
    }

    async fn get_rule(&self, id: &RuleId) -> StorageResult<Option<Stored<Rule>>> {
        let guard = read(&self.rules, "rules")?;
        Ok(guard.get(id))
    }

    async fn upsert_rule(&self, rule: Rule) -> StorageResult<Stored<Rule>> {
        let mut guard = write(&self.rules, "rules")?;
        Ok(guard.upsert(rule.id.clone(), rule))
    }

    async fn delete_rule(&self, id: &RuleId) -> StorageResult<bool> {
        let mut guard = write(&self.rules, "rules")?;
        Ok(guard.remove(id))
    }

    async fn count_rules(&self) -> StorageResult<usize> {
        Ok(read(&self.rules, "rules")?.len())
    }
}

#[async_trait]
impl SchemeStore for InMemoryCatalogStore {
    async fn find_schemes(&self, filter: SchemeFilter) -> StorageResult<Vec<Stored<Scheme>>> {
        let guard = read(&self.schemes, "schemes")?;
        Ok(guard.list(|scheme| {
            filter.scope.contains(scheme.hypergraph_id.as_ref())
                && filter.id.as_ref().map_or(true, |id| &scheme.id == id)
        }))
    }

    async fn get_scheme(&self, key: &SchemeKey) -> StorageResult<Option<Stored<Scheme>>> {
        let guard = read(&self.schemes, "schemes")?;
        Ok(guard.get(key))
    }

    async fn upsert_scheme(&self, scheme: Scheme) -> StorageResult<Stored<Scheme>> {
        let mut guard = write(&self.schemes, "schemes")?;
        let key = SchemeKey::new(scheme.hypergraph_id.clone(), scheme.id.clone());
        Ok(guard.upsert(key, scheme))
    }

    async fn delete_scheme(&self, key: &SchemeKey) -> StorageResult<bool> {
        let mut guard = write(&self.schemes, "schemes")?;
        Ok(guard.remove(key))
    }
}

#[async_trait]
impl HypergraphStore for InMemoryCatalogStore {
    async fn find_hypergraphs(&self) -> StorageResult<Vec<Stored<Hypergraph>>> {
        let guard = read(&self.hypergraphs, "hypergraphs")?;
        Ok(guard.list(|_| true))
    }

    async fn get_hypergraph(&self, id: &HypergraphId) -> StorageResult<Option<Stored<Hypergraph>>> {
        let guard = read(&self.hypergraphs, "hypergraphs")?;
        Ok(guard.get(id))
    }

    async fn upsert_hypergraph(&self, hypergraph: Hypergraph) -> StorageResult<Stored<Hypergraph>> {
        let mut guard = write(&self.hypergraphs, "hypergraphs")?;
        Ok(guard.upsert(hypergraph.id.clone(), hypergraph))
    }

    async fn delete_hypergraph(&self, id: &HypergraphId) -> StorageResult<bool> {
        let mut guard = write(&self.hypergraphs, "hypergraphs")?;
        Ok(guard.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemeScope;
    use serde_json::json;

    #[tokio::test]
    async fn insert_rejects_duplicate_element_ids() {
        let store = InMemoryCatalogStore::new();
        store
            .insert_element(Element::new("A1", "景点"))
            .await
            .unwrap();

        let err = store
            .insert_element(Element::new("A1", "住宿"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(store.count_elements().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn listing_keeps_insertion_order_across_upserts() {
        let store = InMemoryCatalogStore::new();
        for id in ["H3", "A1", "F2"] {
            store
                .upsert_element(Element::new(id, "景点"))
                .await
                .unwrap();
        }
        let first = store.get_element(&ElementId::new("A1")).await.unwrap().unwrap();

        let replaced = store
            .upsert_element(Element::new("A1", "景点").with_attribute("评分", json!(4.8)))
            .await
            .unwrap();
        assert_eq!(replaced.surrogate_id, first.surrogate_id);
        assert_eq!(replaced.created_at, first.created_at);
        assert!(replaced.updated_at >= first.updated_at);

        let ids: Vec<String> = store
            .find_elements(ElementFilter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.record.id.to_string())
            .collect();
        assert_eq!(ids, vec!["H3", "A1", "F2"]);
    }

    #[tokio::test]
    async fn element_filter_by_type() {
        let store = InMemoryCatalogStore::new();
        store.upsert_element(Element::new("A1", "景点")).await.unwrap();
        store.upsert_element(Element::new("H1", "住宿")).await.unwrap();

        let hotels = store
            .find_elements(ElementFilter::of_type("住宿"))
            .await
            .unwrap();
        assert_eq!(hotels.len(), 1);
        assert_eq!(hotels[0].record.id.as_str(), "H1");
    }

    #[tokio::test]
    async fn rule_filter_and_delete() {
        let store = InMemoryCatalogStore::new();
        store.upsert_rule(Rule::new("Budget Stay")).await.unwrap();
        store.upsert_rule(Rule::new("Rating")).await.unwrap();

        let by_name = store
            .find_rules(RuleFilter {
                name: Some("Rating".into()),
                ..RuleFilter::all()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);

        assert!(store.delete_rule(&RuleId::new("budget_stay")).await.unwrap());
        assert!(!store.delete_rule(&RuleId::new("budget_stay")).await.unwrap());
        assert_eq!(store.count_rules().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn schemes_are_scoped_by_hypergraph() {
        let store = InMemoryCatalogStore::new();
        let hg = HypergraphId::new("hg-1");
        store.upsert_scheme(Scheme::new("eco")).await.unwrap();
        store
            .upsert_scheme(Scheme::new("eco").in_hypergraph(hg.clone()))
            .await
            .unwrap();

        let all = store.find_schemes(SchemeFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2, "same id under different parents");

        let standalone = store
            .find_schemes(SchemeFilter::in_scope(SchemeScope::Standalone))
            .await
            .unwrap();
        assert_eq!(standalone.len(), 1);
        assert!(standalone[0].record.is_standalone());

        let key = SchemeKey::new(Some(hg), "eco".into());
        assert!(store.get_scheme(&key).await.unwrap().is_some());
        assert!(store.delete_scheme(&key).await.unwrap());
        assert_eq!(store.find_schemes(SchemeFilter::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hypergraph_roundtrip() {
        let store = InMemoryCatalogStore::new();
        let hypergraph = Hypergraph {
            id: HypergraphId::new("hg"),
            name: "旅游规划超图".into(),
            description: String::new(),
        };
        store.upsert_hypergraph(hypergraph.clone()).await.unwrap();

        let found = store.get_hypergraph(&hypergraph.id).await.unwrap().unwrap();
        assert_eq!(found.record, hypergraph);
        assert_eq!(found.into_record().data.name, "旅游规划超图");
        assert_eq!(store.find_hypergraphs().await.unwrap().len(), 1);
        assert!(store.delete_hypergraph(&hypergraph.id).await.unwrap());
    }
}
