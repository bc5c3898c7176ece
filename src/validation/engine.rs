//! ValidationEngine: runs every rule domain over a record or the whole graph

use super::config::ValidationConfig;
use super::metrics::refresh_derived_metrics;
use super::ontology::Ontology;
use super::opinion::{NoOpinion, TextOpinion};
use super::similarity::{BigramJaccard, Similarity};
use super::{abstraction, graph_health, hierarchy, mece, quality, report, RuleContext};
use crate::graph::{ReqId, Requirement, RequirementSet, ValidationResult, Violation};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default time allowed for a single external opinion
pub const DEFAULT_OPINION_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-call switches for `validate_one` / `validate_all`
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// Ask the opinion collaborator to annotate each finding
    pub use_external_opinion: bool,
    /// Recompute derived text metrics before validating
    pub refresh_derived_metrics: bool,
}

impl ValidateOptions {
    pub fn with_opinion(mut self) -> Self {
        self.use_external_opinion = true;
        self
    }

    pub fn with_refreshed_metrics(mut self) -> Self {
        self.refresh_derived_metrics = true;
        self
    }
}

/// The validation engine
///
/// Holds the rule configuration and its collaborators. Stateless between
/// calls: results are returned, never cached here.
pub struct ValidationEngine {
    config: ValidationConfig,
    ontology: Option<Ontology>,
    similarity: Arc<dyn Similarity>,
    opinion: Arc<dyn TextOpinion>,
    opinion_timeout: Duration,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            ontology: None,
            similarity: Arc::new(BigramJaccard::new()),
            opinion: Arc::new(NoOpinion),
            opinion_timeout: DEFAULT_OPINION_TIMEOUT,
        }
    }

    pub fn with_ontology(mut self, ontology: Ontology) -> Self {
        self.ontology = Some(ontology);
        self
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_opinion(mut self, opinion: Arc<dyn TextOpinion>) -> Self {
        self.opinion = opinion;
        self
    }

    pub fn with_opinion_timeout(mut self, timeout: Duration) -> Self {
        self.opinion_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    fn context(&self) -> RuleContext<'_> {
        RuleContext::new(&self.config, self.ontology.as_ref(), self.similarity.as_ref())
    }

    fn check_with(&self, ctx: &RuleContext<'_>, req: &Requirement, all: &RequirementSet) -> Vec<Violation> {
        let mut out = hierarchy::check(req, all, ctx);
        out.extend(graph_health::check(req, all, ctx));
        out.extend(abstraction::check(req, all, ctx));
        out.extend(mece::check(req, all, ctx));
        out.extend(quality::check(req, ctx));
        out
    }

    /// Per-record rules (every domain except graph-global B1), no opinion
    pub fn check_one(&self, req: &Requirement, all: &RequirementSet) -> Vec<Violation> {
        self.check_with(&self.context(), req, all)
    }

    /// Every rule over every active record, B1 included, no opinion.
    ///
    /// Superseded records are skipped as targets; B1 findings are keyed by the
    /// record they are attributed to.
    pub fn check_all(&self, all: &RequirementSet) -> BTreeMap<ReqId, Vec<Violation>> {
        let ctx = self.context();
        let mut out: BTreeMap<ReqId, Vec<Violation>> = all
            .values()
            .filter(|r| r.is_active())
            .map(|r| (r.id.clone(), self.check_with(&ctx, r, all)))
            .collect();
        for violation in graph_health::check_global(all, &ctx) {
            out.entry(violation.requirement_id.clone())
                .or_default()
                .push(violation);
        }
        out
    }

    /// Flattened `check_all`, the shape the fix loop revalidates with
    pub fn violations(&self, all: &RequirementSet) -> Vec<Violation> {
        self.check_all(all).into_values().flatten().collect()
    }

    /// Validate a single record against the graph.
    ///
    /// Runs hierarchy, per-record graph health, abstraction, MECE and
    /// quality rules in that order. Graph-global cycle detection only runs in
    /// [`validate_all`](Self::validate_all).
    pub async fn validate_one(
        &self,
        req: &Requirement,
        all: &RequirementSet,
        options: ValidateOptions,
    ) -> ValidationResult {
        let all = self.prepare(all, options);
        let req = all
            .get(&req.id)
            .map(Cow::Borrowed)
            .unwrap_or_else(|| Cow::Owned(with_metrics(req, options)));

        let found = self.check_one(&req, &all);
        let found = self.consult(found, &req, &all, options).await;
        ValidationResult::new(req.id.clone(), found)
    }

    /// Validate every active record, with one graph-global cycle pass merged in
    pub async fn validate_all(
        &self,
        all: &RequirementSet,
        options: ValidateOptions,
    ) -> BTreeMap<ReqId, ValidationResult> {
        let all = self.prepare(all, options);
        let mut results = BTreeMap::new();

        for (id, found) in self.check_all(&all) {
            let found = match all.get(&id) {
                Some(req) => self.consult(found, req, &all, options).await,
                None => found,
            };
            results.insert(id.clone(), ValidationResult::new(id, found));
        }
        debug!(records = results.len(), "validated requirement set");
        results
    }

    /// Markdown report for a set of results
    pub fn generate_report(
        &self,
        results: &BTreeMap<ReqId, ValidationResult>,
        all: &RequirementSet,
    ) -> String {
        report::render(results, all)
    }

    fn prepare<'a>(&self, all: &'a RequirementSet, options: ValidateOptions) -> Cow<'a, RequirementSet> {
        if !options.refresh_derived_metrics {
            return Cow::Borrowed(all);
        }
        let mut refreshed = all.clone();
        refresh_derived_metrics(&mut refreshed);
        Cow::Owned(refreshed)
    }

    /// Best-effort annotation by the opinion collaborator
    async fn consult(
        &self,
        found: Vec<Violation>,
        req: &Requirement,
        all: &RequirementSet,
        options: ValidateOptions,
    ) -> Vec<Violation> {
        if !options.use_external_opinion || found.is_empty() {
            return found;
        }
        match tokio::time::timeout(self.opinion_timeout, self.opinion.is_available()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("opinion service unavailable, skipping");
                return found;
            }
            Err(_) => {
                warn!("opinion availability check timed out");
                return found;
            }
        }

        let mut out = Vec::with_capacity(found.len());
        for violation in found {
            let outcome = tokio::time::timeout(
                self.opinion_timeout,
                self.opinion.evaluate(req, &violation, all),
            )
            .await;
            match outcome {
                Ok(Ok(opinion)) => out.push(opinion.annotate(&violation)),
                Ok(Err(e)) => {
                    warn!(violation = %violation.id, error = %e, "opinion failed");
                    out.push(violation);
                }
                Err(_) => {
                    warn!(violation = %violation.id, "opinion timed out");
                    out.push(violation);
                }
            }
        }
        out
    }
}

fn with_metrics(req: &Requirement, options: ValidateOptions) -> Requirement {
    let mut req = req.clone();
    if options.refresh_derived_metrics {
        req.metrics = Some(super::metrics::analyze(&req));
    }
    req
}
