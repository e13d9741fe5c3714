//! Hyperscore service facade.
//!
//! Every operation the HTTP layer exposes, expressed over an owned store
//! handle. Reads of the rule catalog go through [`RuleCache`]; evaluation
//! and hyperedge derivation run the engine over a snapshot materialized per
//! call. Store-internal surrogate ids never leave this module.

use crate::cache::{RuleCache, RuleSnapshot};
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::seed::{SeedData, SeedReport};
use hyperscore_dsl::Program;
use hyperscore_engine::{
    evaluate, evaluate_all, resolve_rule_ref, rule_element_hyperedge, rule_element_hyperedges,
    scheme_rule_hyperedge, scheme_rule_hyperedges,
};
use hyperscore_storage::{
    CatalogStore, ElementFilter, ElementStore, HypergraphStore, RuleFilter, RuleStore,
    SchemeFilter, SchemeKey, SchemeScope, SchemeStore, StorageError, Stored,
};
use hyperscore_types::{
    disambiguate, Element, ElementId, ElementPatch, EvaluationResult, Hypergraph, HypergraphId,
    HypergraphSummary, NewElement, NewHypergraph, NewRule, NewScheme, Parameters, Record, Rule,
    RuleElementHyperedge, RuleId, RulePatch, Scheme, SchemeCreated, SchemeId, SchemePatch,
    SchemeRuleHyperedge,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Score of one rule against one element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulePreview {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub element_id: ElementId,
    pub score: f64,
    /// Set when the rule body failed to compile and a degraded scorer ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<String>,
}

/// Result of compiling a scoring body without storing it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyDiagnostics {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Compile a scoring body and report the first error, if any
pub fn check_scoring_body(source: &str) -> BodyDiagnostics {
    match Program::compile(source) {
        Ok(_) => BodyDiagnostics {
            ok: true,
            line: None,
            column: None,
            message: None,
        },
        Err(err) => {
            let (line, column) = err.position();
            BodyDiagnostics {
                ok: false,
                line: Some(line),
                column,
                message: Some(err.to_string()),
            }
        }
    }
}

/// Check a rule body on write and warn with its position when it does not
/// compile. The rule is stored either way.
fn report_body(rule: &Rule) -> bool {
    let diagnostics = check_scoring_body(&rule.scoring_body);
    if !diagnostics.ok {
        tracing::warn!(
            rule_id = %rule.id,
            line = ?diagnostics.line,
            column = ?diagnostics.column,
            error = diagnostics.message.as_deref().unwrap_or_default(),
            "Stored rule body does not compile"
        );
    }
    diagnostics.ok
}

/// Last good full reads, kept for `degraded.serve_stale`
#[derive(Default)]
struct StaleReads {
    elements: RwLock<Option<Vec<Record<Element>>>>,
    schemes: RwLock<Option<Vec<Record<Scheme>>>>,
    hypergraphs: RwLock<Option<Vec<Record<Hypergraph>>>>,
}

fn records<T>(rows: Vec<Stored<T>>) -> Vec<Record<T>> {
    rows.into_iter().map(Stored::into_record).collect()
}

/// Service facade over a catalog store
pub struct HypergraphService<S> {
    store: Arc<S>,
    config: ServiceConfig,
    rules: RuleCache,
    stale: StaleReads,
}

impl<S: CatalogStore> HypergraphService<S> {
    pub fn new(store: S, config: ServiceConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    pub fn with_shared_store(store: Arc<S>, config: ServiceConfig) -> Self {
        let rules = RuleCache::new(config.cache.rule_ttl());
        Self {
            store,
            config,
            rules,
            stale: StaleReads::default(),
        }
    }

    /// Build the service and load the bundled seed data per `config.seed`
    pub async fn bootstrap(store: S, config: ServiceConfig) -> ServiceResult<(Self, SeedReport)> {
        let service = Self::new(store, config);
        let report = service.seed(&SeedData::bundled()?).await?;
        Ok((service, report))
    }

    pub async fn seed(&self, data: &SeedData) -> ServiceResult<SeedReport> {
        let report = data.apply(self.store.as_ref(), &self.config.seed).await?;
        if report.rules_loaded > 0 {
            self.rules.invalidate().await;
        }
        Ok(report)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Snapshot reads
    // ------------------------------------------------------------------

    async fn serve_stale<T: Clone>(
        &self,
        collection: &'static str,
        slot: &RwLock<Option<Vec<T>>>,
        err: StorageError,
    ) -> ServiceResult<Vec<T>> {
        if self.config.degraded.serve_stale {
            if let Some(snapshot) = slot.read().await.clone() {
                tracing::warn!(collection, error = %err, "Serving stale snapshot");
                return Ok(snapshot);
            }
        }
        Err(err.into())
    }

    async fn all_elements(&self) -> ServiceResult<Vec<Record<Element>>> {
        match self.store.find_elements(ElementFilter::all()).await {
            Ok(rows) => {
                let elements = records(rows);
                if self.config.degraded.serve_stale {
                    *self.stale.elements.write().await = Some(elements.clone());
                }
                Ok(elements)
            }
            Err(err) => self.serve_stale("elements", &self.stale.elements, err).await,
        }
    }

    async fn all_schemes(&self) -> ServiceResult<Vec<Record<Scheme>>> {
        match self.store.find_schemes(SchemeFilter::all()).await {
            Ok(rows) => {
                let schemes = records(rows);
                if self.config.degraded.serve_stale {
                    *self.stale.schemes.write().await = Some(schemes.clone());
                }
                Ok(schemes)
            }
            Err(err) => self.serve_stale("schemes", &self.stale.schemes, err).await,
        }
    }

    async fn all_hypergraphs(&self) -> ServiceResult<Vec<Record<Hypergraph>>> {
        match self.store.find_hypergraphs().await {
            Ok(rows) => {
                let hypergraphs = records(rows);
                if self.config.degraded.serve_stale {
                    *self.stale.hypergraphs.write().await = Some(hypergraphs.clone());
                }
                Ok(hypergraphs)
            }
            Err(err) => {
                self.serve_stale("hypergraphs", &self.stale.hypergraphs, err)
                    .await
            }
        }
    }

    async fn element_snapshot(&self) -> ServiceResult<Vec<Element>> {
        Ok(self
            .all_elements()
            .await?
            .into_iter()
            .map(|record| record.data)
            .collect())
    }

    /// Current rule snapshot through the TTL cache
    async fn rule_snapshot(&self) -> ServiceResult<Arc<RuleSnapshot>> {
        let store = &self.store;
        let fetched = self
            .rules
            .get_or_fetch(move || async move {
                store.find_rules(RuleFilter::all()).await.map(records)
            })
            .await;

        match fetched {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                if self.config.degraded.serve_stale {
                    if let Some(last) = self.rules.last().await {
                        tracing::warn!(collection = "rules", error = %err, "Serving stale snapshot");
                        return Ok(last);
                    }
                }
                Err(err.into())
            }
        }
    }

    async fn after_rule_write(&self) {
        if self.config.cache.invalidate_on_write {
            self.rules.invalidate().await;
        }
    }

    /// Drop the cached rule snapshot so the next read refetches
    pub async fn refresh_rules(&self) {
        self.rules.invalidate().await;
    }

    // ------------------------------------------------------------------
    // Elements
    // ------------------------------------------------------------------

    /// All elements grouped by type; each group keeps store order
    pub async fn list_elements(&self) -> ServiceResult<BTreeMap<String, Vec<Record<Element>>>> {
        let mut grouped: BTreeMap<String, Vec<Record<Element>>> = BTreeMap::new();
        for record in self.all_elements().await? {
            grouped
                .entry(record.data.element_type.clone())
                .or_default()
                .push(record);
        }
        Ok(grouped)
    }

    pub async fn list_elements_by_type(
        &self,
        element_type: &str,
    ) -> ServiceResult<Vec<Record<Element>>> {
        match self
            .store
            .find_elements(ElementFilter::of_type(element_type))
            .await
        {
            Ok(rows) => Ok(records(rows)),
            Err(err) => {
                let all = self.serve_stale("elements", &self.stale.elements, err).await?;
                Ok(all
                    .into_iter()
                    .filter(|r| r.data.element_type == element_type)
                    .collect())
            }
        }
    }

    pub async fn get_element(&self, id: &str) -> ServiceResult<Record<Element>> {
        self.store
            .get_element(&ElementId::new(id))
            .await?
            .map(Stored::into_record)
            .ok_or_else(|| ServiceError::not_found("element", id))
    }

    /// Create one element; a duplicate id is a conflict
    pub async fn create_element(&self, request: NewElement) -> ServiceResult<Record<Element>> {
        request.validate()?;
        let stored = self.store.insert_element(request.into_element()).await?;
        tracing::info!(element_id = %stored.record.id, element_type = %stored.record.element_type, "Created element");
        Ok(stored.into_record())
    }

    /// Bulk-load elements, replacing any with the same id
    pub async fn load_elements(
        &self,
        requests: Vec<NewElement>,
    ) -> ServiceResult<Vec<Record<Element>>> {
        for request in &requests {
            request.validate()?;
        }

        let mut loaded = Vec::with_capacity(requests.len());
        for request in requests {
            let stored = self.store.upsert_element(request.into_element()).await?;
            loaded.push(stored.into_record());
        }
        tracing::info!(count = loaded.len(), "Loaded elements");
        Ok(loaded)
    }

    /// Merge-patch an element's attributes
    pub async fn patch_element(
        &self,
        id: &str,
        patch: ElementPatch,
    ) -> ServiceResult<Record<Element>> {
        let mut element = self.get_element(id).await?.data;
        element.merge_attributes(patch.attributes);
        let stored = self.store.upsert_element(element).await?;
        tracing::info!(element_id = %id, "Patched element");
        Ok(stored.into_record())
    }

    pub async fn delete_element(&self, id: &str) -> ServiceResult<()> {
        if !self.store.delete_element(&ElementId::new(id)).await? {
            return Err(ServiceError::not_found("element", id));
        }
        tracing::info!(element_id = %id, "Deleted element");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    /// All rules, served from the rule cache
    pub async fn list_rules(&self) -> ServiceResult<Vec<Record<Rule>>> {
        Ok(self.rule_snapshot().await?.records().to_vec())
    }

    /// Resolve a reference by id, name, then slug of the reference
    async fn resolve_rule(&self, reference: &str) -> ServiceResult<Stored<Rule>> {
        let rows = self.store.find_rules(RuleFilter::all()).await?;
        resolve_rule_ref(rows.iter(), reference, |row| &row.record)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("rule", reference))
    }

    pub async fn get_rule(&self, reference: &str) -> ServiceResult<Record<Rule>> {
        Ok(self.resolve_rule(reference).await?.into_record())
    }

    /// Create a rule. An id that is already taken gets a random suffix.
    pub async fn create_rule(&self, request: NewRule) -> ServiceResult<Record<Rule>> {
        request.validate()?;
        let mut id = request.requested_id();
        if self.store.get_rule(&id).await?.is_some() {
            let taken = id;
            id = RuleId::new(disambiguate(taken.as_str()));
            tracing::debug!(requested = %taken, assigned = %id, "Rule id taken");
        }

        let rule = request.into_rule(id);
        let body_ok = report_body(&rule);
        let stored = self.store.upsert_rule(rule).await?;
        self.after_rule_write().await;

        tracing::info!(
            rule_id = %stored.record.id,
            rule_name = %stored.record.name,
            body_ok,
            "Created rule"
        );
        Ok(stored.into_record())
    }

    pub async fn patch_rule(&self, reference: &str, patch: RulePatch) -> ServiceResult<Record<Rule>> {
        patch.validate()?;
        let mut rule = self.resolve_rule(reference).await?.record;
        let body_changed = rule.apply_patch(patch);
        if body_changed {
            report_body(&rule);
        }

        let stored = self.store.upsert_rule(rule).await?;
        self.after_rule_write().await;
        tracing::info!(rule_id = %stored.record.id, "Updated rule");
        Ok(stored.into_record())
    }

    pub async fn delete_rule(&self, reference: &str) -> ServiceResult<()> {
        let rule = self.resolve_rule(reference).await?.record;
        if !self.store.delete_rule(&rule.id).await? {
            return Err(ServiceError::not_found("rule", reference));
        }
        self.after_rule_write().await;
        tracing::info!(rule_id = %rule.id, "Deleted rule");
        Ok(())
    }

    /// Apply one rule to one element with call-supplied parameter overrides
    pub async fn preview_rule(
        &self,
        reference: &str,
        element_id: &str,
        overrides: &Parameters,
    ) -> ServiceResult<RulePreview> {
        let element = self.get_element(element_id).await?.data;
        let snapshot = self.rule_snapshot().await?;
        let rule = snapshot
            .catalog()
            .resolve(reference)
            .ok_or_else(|| ServiceError::not_found("rule", reference))?;

        Ok(RulePreview {
            rule_id: rule.rule.id.clone(),
            rule_name: rule.rule.name.clone(),
            element_id: element.id.clone(),
            score: rule.apply_with_overrides(&element, overrides),
            compile_error: rule.compile_error().map(ToString::to_string),
        })
    }

    // ------------------------------------------------------------------
    // Hypergraphs
    // ------------------------------------------------------------------

    async fn ensure_hypergraph(&self, hypergraph_id: Option<&HypergraphId>) -> ServiceResult<()> {
        if let Some(id) = hypergraph_id {
            if self.store.get_hypergraph(id).await?.is_none() {
                return Err(ServiceError::not_found("hypergraph", id));
            }
        }
        Ok(())
    }

    async fn summarize(
        &self,
        hypergraphs: Vec<Record<Hypergraph>>,
    ) -> ServiceResult<Vec<HypergraphSummary>> {
        let elements = self.all_elements().await?;
        let rules_count = self.store.count_rules().await?;
        let schemes = self.all_schemes().await?;
        let element_types: BTreeSet<String> = elements
            .iter()
            .map(|r| r.data.element_type.clone())
            .collect();

        Ok(hypergraphs
            .into_iter()
            .map(|record| {
                let schemes_count = schemes
                    .iter()
                    .filter(|s| s.data.hypergraph_id.as_ref() == Some(&record.data.id))
                    .count();
                HypergraphSummary {
                    id: record.data.id,
                    name: record.data.name,
                    description: record.data.description,
                    elements_count: elements.len(),
                    rules_count,
                    schemes_count,
                    element_types: element_types.clone(),
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                }
            })
            .collect())
    }

    pub async fn list_hypergraphs(&self) -> ServiceResult<Vec<HypergraphSummary>> {
        let hypergraphs = self.all_hypergraphs().await?;
        self.summarize(hypergraphs).await
    }

    pub async fn get_hypergraph(&self, id: &str) -> ServiceResult<HypergraphSummary> {
        let record = self
            .store
            .get_hypergraph(&HypergraphId::new(id))
            .await?
            .map(Stored::into_record)
            .ok_or_else(|| ServiceError::not_found("hypergraph", id))?;
        self.summarize(vec![record])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("hypergraph", id))
    }

    pub async fn create_hypergraph(
        &self,
        request: NewHypergraph,
    ) -> ServiceResult<HypergraphSummary> {
        request.validate()?;
        let id = HypergraphId::generate();
        let stored = self
            .store
            .upsert_hypergraph(request.into_hypergraph(id.clone()))
            .await?;
        tracing::info!(hypergraph_id = %id, name = %stored.record.name, "Created hypergraph");
        self.summarize(vec![stored.into_record()])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("hypergraph", id))
    }

    /// Delete a hypergraph together with its nested schemes
    pub async fn delete_hypergraph(&self, id: &str) -> ServiceResult<()> {
        let id = HypergraphId::new(id);
        self.ensure_hypergraph(Some(&id)).await?;

        let nested = self
            .store
            .find_schemes(SchemeFilter::in_scope(SchemeScope::Hypergraph(id.clone())))
            .await?;
        for scheme in &nested {
            let key = SchemeKey::new(Some(id.clone()), scheme.record.id.clone());
            self.store.delete_scheme(&key).await?;
        }
        self.store.delete_hypergraph(&id).await?;

        tracing::info!(hypergraph_id = %id, schemes = nested.len(), "Deleted hypergraph");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Schemes
    // ------------------------------------------------------------------

    /// Schemes under `hypergraph_id`, or the standalone schemes for `None`
    pub async fn list_schemes(
        &self,
        hypergraph_id: Option<&HypergraphId>,
    ) -> ServiceResult<Vec<Record<Scheme>>> {
        self.ensure_hypergraph(hypergraph_id).await?;
        let scope = SchemeScope::for_parent(hypergraph_id);
        Ok(self
            .all_schemes()
            .await?
            .into_iter()
            .filter(|r| scope.contains(r.data.hypergraph_id.as_ref()))
            .collect())
    }

    pub async fn get_scheme(
        &self,
        hypergraph_id: Option<&HypergraphId>,
        id: &str,
    ) -> ServiceResult<Record<Scheme>> {
        self.ensure_hypergraph(hypergraph_id).await?;
        let key = SchemeKey::new(hypergraph_id.cloned(), SchemeId::new(id));
        let found = match self.store.get_scheme(&key).await {
            Ok(row) => row.map(Stored::into_record),
            Err(err) => self
                .serve_stale("schemes", &self.stale.schemes, err)
                .await?
                .into_iter()
                .find(|r| r.data.id == key.id && r.data.hypergraph_id == key.hypergraph_id),
        };
        found.ok_or_else(|| ServiceError::not_found("scheme", id))
    }

    /// Create a scheme and derive its hyperedges from the current catalogs
    pub async fn create_scheme(
        &self,
        hypergraph_id: Option<&HypergraphId>,
        request: NewScheme,
    ) -> ServiceResult<SchemeCreated> {
        request.validate()?;
        self.ensure_hypergraph(hypergraph_id).await?;

        let mut id = request.requested_id();
        let key = SchemeKey::new(hypergraph_id.cloned(), id.clone());
        if self.store.get_scheme(&key).await?.is_some() {
            id = SchemeId::new(disambiguate(id.as_str()));
        }

        let scheme = request.into_scheme(id, hypergraph_id.cloned());
        let stored = self.store.upsert_scheme(scheme).await?;
        tracing::info!(
            scheme_id = %stored.record.id,
            hypergraph_id = ?stored.record.hypergraph_id,
            rules = stored.record.rule_weights.len(),
            "Created scheme"
        );

        let snapshot = self.rule_snapshot().await?;
        let elements = self.element_snapshot().await?;
        let scheme_rule_hyperedge = scheme_rule_hyperedge(&stored.record, snapshot.catalog());
        let rule_element_hyperedges = stored
            .record
            .rule_weights
            .keys()
            .filter_map(|rule_id| snapshot.catalog().get(rule_id.as_str()))
            .filter_map(|rule| rule_element_hyperedge(rule, &elements))
            .collect();

        Ok(SchemeCreated {
            scheme: stored.into_record(),
            scheme_rule_hyperedge,
            rule_element_hyperedges,
        })
    }

    pub async fn patch_scheme(
        &self,
        hypergraph_id: Option<&HypergraphId>,
        id: &str,
        patch: SchemePatch,
    ) -> ServiceResult<Record<Scheme>> {
        patch.validate()?;
        let mut scheme = self.get_scheme(hypergraph_id, id).await?.data;
        scheme.apply_patch(patch);
        let stored = self.store.upsert_scheme(scheme).await?;
        tracing::info!(scheme_id = %id, "Updated scheme");
        Ok(stored.into_record())
    }

    pub async fn delete_scheme(
        &self,
        hypergraph_id: Option<&HypergraphId>,
        id: &str,
    ) -> ServiceResult<()> {
        self.ensure_hypergraph(hypergraph_id).await?;
        let key = SchemeKey::new(hypergraph_id.cloned(), SchemeId::new(id));
        if !self.store.delete_scheme(&key).await? {
            return Err(ServiceError::not_found("scheme", id));
        }
        tracing::info!(scheme_id = %id, "Deleted scheme");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Evaluation and derived views
    // ------------------------------------------------------------------

    pub async fn evaluate_scheme(
        &self,
        hypergraph_id: Option<&HypergraphId>,
        id: &str,
    ) -> ServiceResult<EvaluationResult> {
        let scheme = self.get_scheme(hypergraph_id, id).await?.data;
        let elements = self.element_snapshot().await?;
        let snapshot = self.rule_snapshot().await?;
        Ok(evaluate(&scheme, &elements, snapshot.catalog()))
    }

    /// Evaluate every scheme in scope against one shared snapshot
    pub async fn evaluate_all_schemes(
        &self,
        hypergraph_id: Option<&HypergraphId>,
    ) -> ServiceResult<BTreeMap<SchemeId, EvaluationResult>> {
        let schemes: Vec<Scheme> = self
            .list_schemes(hypergraph_id)
            .await?
            .into_iter()
            .map(|r| r.data)
            .collect();
        let elements = self.element_snapshot().await?;
        let snapshot = self.rule_snapshot().await?;
        Ok(evaluate_all(&schemes, &elements, snapshot.catalog()))
    }

    pub async fn rule_element_hyperedges(&self) -> ServiceResult<Vec<RuleElementHyperedge>> {
        let snapshot = self.rule_snapshot().await?;
        let elements = self.element_snapshot().await?;
        Ok(rule_element_hyperedges(snapshot.catalog(), &elements))
    }

    /// Scheme→rule hyperedges across standalone and nested schemes
    pub async fn scheme_rule_hyperedges(&self) -> ServiceResult<Vec<SchemeRuleHyperedge>> {
        let schemes: Vec<Scheme> = self
            .all_schemes()
            .await?
            .into_iter()
            .map(|r| r.data)
            .collect();
        let snapshot = self.rule_snapshot().await?;
        Ok(scheme_rule_hyperedges(&schemes, snapshot.catalog()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_body() {
        assert!(report_body(&Rule::new("ok").with_body("return 1.0")));
        assert!(!report_body(&Rule::new("bad").with_body("return (")));

        let deep = format!("return {}1{}", "(".repeat(500), ")".repeat(500));
        assert!(!report_body(&Rule::new("deep").with_body(deep)));
    }

    #[test]
    fn test_check_body_reports_position() {
        let ok = check_scoring_body("return 1.0");
        assert!(ok.ok);
        assert!(ok.line.is_none());

        let bad = check_scoring_body("x = 1\nif x >:\n    return 1");
        assert!(!bad.ok);
        assert_eq!(bad.line, Some(2));
        assert!(bad.message.is_some());
    }

    #[test]
    fn test_empty_body_checks_clean() {
        let diag = check_scoring_body("# nothing here\n");
        assert!(diag.ok);
    }

    #[test]
    fn test_preview_serializes_without_compile_error() {
        let preview = RulePreview {
            rule_id: RuleId::new("rule_budget"),
            rule_name: "经济型住宿".into(),
            element_id: ElementId::new("H1"),
            score: 1.0,
            compile_error: None,
        };
        let json = serde_json::to_value(&preview).unwrap();
        assert!(json.get("compile_error").is_none());
        assert_eq!(json["score"], 1.0);
    }
}
