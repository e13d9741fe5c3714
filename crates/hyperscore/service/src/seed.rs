//! Bootstrap seed data.
//!
//! The bundled travel catalog is migrated per collection: elements are
//! loaded only when the element store is empty, rules only when the rule
//! store is empty. The demo hypergraph is created only when no hypergraph
//! exists yet.

use crate::config::SeedConfig;
use crate::error::{ServiceError, ServiceResult};
use hyperscore_storage::{CatalogStore, ElementStore, HypergraphStore, RuleStore, SchemeStore};
use hyperscore_types::{HypergraphId, NewElement, NewHypergraph, NewScheme, Rule};
use serde::Deserialize;

const BUNDLED_SEED: &str = include_str!("../data/seed.json");

/// Catalog contents loaded at bootstrap
#[derive(Debug, Clone, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub elements: Vec<NewElement>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub demo_hypergraph: Option<DemoHypergraph>,
}

/// Hypergraph created for demonstration, with its schemes
#[derive(Debug, Clone, Deserialize)]
pub struct DemoHypergraph {
    #[serde(flatten)]
    pub hypergraph: NewHypergraph,
    #[serde(default)]
    pub schemes: Vec<NewScheme>,
}

/// What a bootstrap run actually wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    pub elements_loaded: usize,
    pub rules_loaded: usize,
    pub hypergraph: Option<HypergraphId>,
}

impl SeedData {
    /// The travel catalog shipped with the service
    pub fn bundled() -> ServiceResult<Self> {
        Self::from_json(BUNDLED_SEED)
    }

    pub fn from_json(json: &str) -> ServiceResult<Self> {
        serde_json::from_str(json).map_err(|e| ServiceError::Seed(e.to_string()))
    }

    /// Load this data into `store` according to `config`
    pub async fn apply<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        config: &SeedConfig,
    ) -> ServiceResult<SeedReport> {
        let mut report = SeedReport::default();
        if !config.enabled {
            return Ok(report);
        }

        if store.count_elements().await? == 0 {
            for element in &self.elements {
                element.validate()?;
                store.upsert_element(element.clone().into_element()).await?;
                report.elements_loaded += 1;
            }
        }

        if store.count_rules().await? == 0 {
            self.rules.iter().try_for_each(Rule::validate)?;
            for rule in &self.rules {
                store.upsert_rule(rule.clone()).await?;
                report.rules_loaded += 1;
            }
        }

        if config.demo_hypergraph && store.find_hypergraphs().await?.is_empty() {
            if let Some(demo) = &self.demo_hypergraph {
                report.hypergraph = Some(create_demo(store, demo).await?);
            }
        }

        tracing::info!(
            elements = report.elements_loaded,
            rules = report.rules_loaded,
            demo_hypergraph = report.hypergraph.is_some(),
            "Seed data applied"
        );
        Ok(report)
    }
}

async fn create_demo<S: CatalogStore + ?Sized>(
    store: &S,
    demo: &DemoHypergraph,
) -> ServiceResult<HypergraphId> {
    demo.hypergraph.validate()?;
    let hypergraph = demo.hypergraph.clone().into_hypergraph(HypergraphId::generate());
    let id = hypergraph.id.clone();
    store.upsert_hypergraph(hypergraph).await?;

    for scheme in &demo.schemes {
        scheme.validate()?;
        let scheme_id = scheme.requested_id();
        store
            .upsert_scheme(scheme.clone().into_scheme(scheme_id, Some(id.clone())))
            .await?;
    }
    Ok(id)
}
