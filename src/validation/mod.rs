//! Validation: rule-driven structural and semantic checks over the
//! requirement graph
//!
//! Rule domains:
//! - hierarchy (A1-A5): legal layer transitions along `refines`
//! - graph health (B1-B5): cycles, fan-out, orphans, relation consistency
//! - abstraction (C1-C3): abstraction score consistency
//! - MECE (D1-D3): sibling overlap and parent coverage
//! - quality/style (E1-E7): wording of a single record

mod abstraction;
mod cache;
mod config;
mod engine;
mod graph_health;
mod hierarchy;
mod mece;
pub mod metrics;
mod ontology;
mod opinion;
mod quality;
mod report;
mod similarity;

pub use cache::ValidationCache;
pub use config::{
    AbstractionConfig, GraphHealthConfig, HierarchyConfig, MeceConfig, RuleSetting, StyleConfig,
    TypePair, TypeStyle, ValidationConfig,
};
pub use engine::{ValidateOptions, ValidationEngine, DEFAULT_OPINION_TIMEOUT};
pub use ontology::{Ontology, Stage};
pub use opinion::{MockOpinion, NoOpinion, Opinion, OpinionError, TextOpinion};
pub use quality::StylePatterns;
pub use similarity::{BigramJaccard, Similarity};

use crate::graph::{RuleId, Severity};

/// Everything a rule needs besides the records themselves
pub struct RuleContext<'a> {
    pub config: &'a ValidationConfig,
    pub ontology: Option<&'a Ontology>,
    pub similarity: &'a dyn Similarity,
    pub patterns: StylePatterns,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        config: &'a ValidationConfig,
        ontology: Option<&'a Ontology>,
        similarity: &'a dyn Similarity,
    ) -> Self {
        Self {
            config,
            ontology,
            similarity,
            patterns: StylePatterns::compile(&config.style),
        }
    }

    /// Severity to report at, `None` if the rule is disabled
    pub fn severity(&self, rule: RuleId) -> Option<Severity> {
        self.config.severity_for(rule)
    }
}
