//! Short-TTL read cache in front of the rule listing.
//!
//! Holds a single snapshot: the rule records plus their compiled catalog.
//! A snapshot younger than the TTL is returned as-is (same `Arc`); an older
//! one is refetched. Writes do not touch the cache unless the service is
//! configured to invalidate it.

use hyperscore_engine::RuleCatalog;
use hyperscore_types::{Record, Rule};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Rule records with the catalog compiled from them
#[derive(Debug)]
pub struct RuleSnapshot {
    records: Vec<Record<Rule>>,
    catalog: RuleCatalog,
}

impl RuleSnapshot {
    pub fn new(records: Vec<Record<Rule>>) -> Self {
        let catalog = RuleCatalog::compile(records.iter().map(|r| r.data.clone()));
        Self { records, catalog }
    }

    pub fn records(&self) -> &[Record<Rule>] {
        &self.records
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }
}

struct Cached {
    fetched_at: Instant,
    invalidated: bool,
    snapshot: Arc<RuleSnapshot>,
}

/// Single-slot TTL cache of the rule catalog
pub struct RuleCache {
    ttl: Duration,
    slot: RwLock<Option<Cached>>,
}

impl RuleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Snapshot still within its TTL
    pub async fn fresh(&self) -> Option<Arc<RuleSnapshot>> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|cached| !cached.invalidated && cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.snapshot.clone())
    }

    /// Last stored snapshot regardless of age, for degraded reads
    pub async fn last(&self) -> Option<Arc<RuleSnapshot>> {
        self.slot.read().await.as_ref().map(|c| c.snapshot.clone())
    }

    /// Replace the snapshot and restart its TTL
    pub async fn store(&self, records: Vec<Record<Rule>>) -> Arc<RuleSnapshot> {
        let snapshot = Arc::new(RuleSnapshot::new(records));
        *self.slot.write().await = Some(Cached {
            fetched_at: Instant::now(),
            invalidated: false,
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    /// Force the next read to refetch. The old snapshot stays available to
    /// [`RuleCache::last`].
    pub async fn invalidate(&self) {
        if let Some(cached) = self.slot.write().await.as_mut() {
            cached.invalidated = true;
        }
    }

    /// Fresh snapshot, or the result of `fetch` stored as the new one.
    ///
    /// Concurrent callers on expiry may both fetch; the last store wins.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<Arc<RuleSnapshot>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Record<Rule>>, E>>,
    {
        if let Some(snapshot) = self.fresh().await {
            return Ok(snapshot);
        }

        let records = fetch().await?;
        tracing::debug!(rules = records.len(), "Refreshed rule cache");
        Ok(self.store(records).await)
    }
}
