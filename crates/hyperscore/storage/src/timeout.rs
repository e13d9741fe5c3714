//! Deadline wrapper for any catalog store.
//!
//! Every call is bounded by the same per-call timeout. An expired call
//! surfaces as [`StorageError::Timeout`], which callers treat as retryable.

use crate::model::{ElementFilter, RuleFilter, SchemeFilter, SchemeKey, Stored};
use crate::traits::{ElementStore, HypergraphStore, RuleStore, SchemeStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use hyperscore_types::{Element, ElementId, Hypergraph, HypergraphId, Rule, RuleId, Scheme};
use std::future::Future;
use std::time::Duration;

/// Wraps a store and bounds each call with `tokio::time::timeout`.
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Storage call timed out"
                );
                Err(StorageError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl<S: ElementStore> ElementStore for TimeoutStore<S> {
    async fn find_elements(&self, filter: ElementFilter) -> StorageResult<Vec<Stored<Element>>> {
        self.bounded("find_elements", self.inner.find_elements(filter))
            .await
    }

    async fn get_element(&self, id: &ElementId) -> StorageResult<Option<Stored<Element>>> {
        self.bounded("get_element", self.inner.get_element(id)).await
    }

    async fn insert_element(&self, element: Element) -> StorageResult<Stored<Element>> {
        self.bounded("insert_element", self.inner.insert_element(element))
            .await
    }

    async fn upsert_element(&self, element: Element) -> StorageResult<Stored<Element>> {
        self.bounded("upsert_element", self.inner.upsert_element(element))
            .await
    }

    async fn delete_element(&self, id: &ElementId) -> StorageResult<bool> {
        self.bounded("delete_element", self.inner.delete_element(id))
            .await
    }

    async fn count_elements(&self) -> StorageResult<usize> {
        self.bounded("count_elements", self.inner.count_elements())
            .await
    }
}

#[async_trait]
impl<S: RuleStore> RuleStore for TimeoutStore<S> {
    async fn find_rules(&self, filter: RuleFilter) -> StorageResult<Vec<Stored<Rule>>> {
        self.bounded("find_rules", self.inner.find_rules(filter)).await
    }

    async fn get_rule(&self, id: &RuleId) -> StorageResult<Option<Stored<Rule>>> {
        self.bounded("get_rule", self.inner.get_rule(id)).await
    }

    async fn upsert_rule(&self, rule: Rule) -> StorageResult<Stored<Rule>> {
        self.bounded("upsert_rule", self.inner.upsert_rule(rule)).await
    }

    async fn delete_rule(&self, id: &RuleId) -> StorageResult<bool> {
        self.bounded("delete_rule", self.inner.delete_rule(id)).await
    }

    async fn count_rules(&self) -> StorageResult<usize> {
        self.bounded("count_rules", self.inner.count_rules()).await
    }
}

#[async_trait]
impl<S: SchemeStore> SchemeStore for TimeoutStore<S> {
    async fn find_schemes(&self, filter: SchemeFilter) -> StorageResult<Vec<Stored<Scheme>>> {
        self.bounded("find_schemes", self.inner.find_schemes(filter))
            .await
    }

    async fn get_scheme(&self, key: &SchemeKey) -> StorageResult<Option<Stored<Scheme>>> {
        self.bounded("get_scheme", self.inner.get_scheme(key)).await
    }

    async fn upsert_scheme(&self, scheme: Scheme) -> StorageResult<Stored<Scheme>> {
        self.bounded("upsert_scheme", self.inner.upsert_scheme(scheme))
            .await
    }

    async fn delete_scheme(&self, key: &SchemeKey) -> StorageResult<bool> {
        self.bounded("delete_scheme", self.inner.delete_scheme(key))
            .await
    }
}

#[async_trait]
impl<S: HypergraphStore> HypergraphStore for TimeoutStore<S> {
    async fn find_hypergraphs(&self) -> StorageResult<Vec<Stored<Hypergraph>>> {
        self.bounded("find_hypergraphs", self.inner.find_hypergraphs())
            .await
    }

    async fn get_hypergraph(&self, id: &HypergraphId) -> StorageResult<Option<Stored<Hypergraph>>> {
        self.bounded("get_hypergraph", self.inner.get_hypergraph(id))
            .await
    }

    async fn upsert_hypergraph(&self, hypergraph: Hypergraph) -> StorageResult<Stored<Hypergraph>> {
        self.bounded("upsert_hypergraph", self.inner.upsert_hypergraph(hypergraph))
            .await
    }

    async fn delete_hypergraph(&self, id: &HypergraphId) -> StorageResult<bool> {
        self.bounded("delete_hypergraph", self.inner.delete_hypergraph(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryCatalogStore;

    /// Element store whose listing never answers within the deadline
    struct SlowStore {
        delay: Duration,
    }

    #[async_trait]
    impl ElementStore for SlowStore {
        async fn find_elements(&self, _filter: ElementFilter) -> StorageResult<Vec<Stored<Element>>> {
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        }

        async fn get_element(&self, _id: &ElementId) -> StorageResult<Option<Stored<Element>>> {
            Ok(None)
        }

        async fn insert_element(&self, element: Element) -> StorageResult<Stored<Element>> {
            Ok(Stored::new(element, chrono::Utc::now()))
        }

        async fn upsert_element(&self, element: Element) -> StorageResult<Stored<Element>> {
            Ok(Stored::new(element, chrono::Utc::now()))
        }

        async fn delete_element(&self, _id: &ElementId) -> StorageResult<bool> {
            Ok(false)
        }

        async fn count_elements(&self) -> StorageResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let store = TimeoutStore::new(
            SlowStore {
                delay: Duration::from_secs(60),
            },
            Duration::from_millis(250),
        );

        let err = store.find_elements(ElementFilter::all()).await.unwrap_err();
        match err {
            StorageError::Timeout { operation, after } => {
                assert_eq!(operation, "find_elements");
                assert_eq!(after, Duration::from_millis(250));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        // Calls that answer immediately are unaffected.
        assert_eq!(store.count_elements().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let store = TimeoutStore::new(InMemoryCatalogStore::new(), Duration::from_secs(5));
        store
            .upsert_rule(Rule::new("Rating").with_weight(1.5))
            .await
            .unwrap();

        let rules = store.find_rules(RuleFilter::all()).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].record.weight, 1.5);
        assert_eq!(store.timeout(), Duration::from_secs(5));
    }
}
