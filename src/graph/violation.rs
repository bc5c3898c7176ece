//! Violation and ValidationResult: the output of a validation pass

use super::requirement::ReqId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a finding. Ordered so `Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Points deducted from the 100-point quality score
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Error => 20,
            Severity::Warning => 10,
            Severity::Info => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule family a finding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleDomain {
    Hierarchy,
    GraphHealth,
    Abstraction,
    Mece,
    QualityStyle,
}

impl RuleDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleDomain::Hierarchy => "hierarchy",
            RuleDomain::GraphHealth => "graph_health",
            RuleDomain::Abstraction => "abstraction",
            RuleDomain::Mece => "mece",
            RuleDomain::QualityStyle => "quality_style",
        }
    }
}

impl std::fmt::Display for RuleDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a single validation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleId {
    A1,
    A2,
    A3,
    A4,
    A5,
    B1,
    B2,
    B3,
    B4,
    B5,
    C1,
    C2,
    C3,
    D1,
    D2,
    D3,
    E1,
    E2,
    E3,
    E4,
    E5,
    E6,
    E7,
}

impl RuleId {
    pub const ALL: [RuleId; 23] = [
        RuleId::A1,
        RuleId::A2,
        RuleId::A3,
        RuleId::A4,
        RuleId::A5,
        RuleId::B1,
        RuleId::B2,
        RuleId::B3,
        RuleId::B4,
        RuleId::B5,
        RuleId::C1,
        RuleId::C2,
        RuleId::C3,
        RuleId::D1,
        RuleId::D2,
        RuleId::D3,
        RuleId::E1,
        RuleId::E2,
        RuleId::E3,
        RuleId::E4,
        RuleId::E5,
        RuleId::E6,
        RuleId::E7,
    ];

    pub fn domain(&self) -> RuleDomain {
        use RuleId::*;
        match self {
            A1 | A2 | A3 | A4 | A5 => RuleDomain::Hierarchy,
            B1 | B2 | B3 | B4 | B5 => RuleDomain::GraphHealth,
            C1 | C2 | C3 => RuleDomain::Abstraction,
            D1 | D2 | D3 => RuleDomain::Mece,
            E1 | E2 | E3 | E4 | E5 | E6 | E7 => RuleDomain::QualityStyle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use RuleId::*;
        match self {
            A1 => "A1",
            A2 => "A2",
            A3 => "A3",
            A4 => "A4",
            A5 => "A5",
            B1 => "B1",
            B2 => "B2",
            B3 => "B3",
            B4 => "B4",
            B5 => "B5",
            C1 => "C1",
            C2 => "C2",
            C3 => "C3",
            D1 => "D1",
            D2 => "D2",
            D3 => "D3",
            E1 => "E1",
            E2 => "E2",
            E3 => "E3",
            E4 => "E4",
            E5 => "E5",
            E6 => "E6",
            E7 => "E7",
        }
    }

    /// Severity used when no rule configuration overrides it
    pub fn default_severity(&self) -> Severity {
        use RuleId::*;
        match self {
            A1 | A2 | A3 | B1 | B4 | B5 | C3 => Severity::Error,
            A4 | A5 | B2 | B3 | C1 | C2 | D1 | D3 | E1 | E3 | E4 | E6 => Severity::Warning,
            D2 | E2 | E5 | E7 => Severity::Info,
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding. Never mutated after creation; enrichment builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// `<rule>-<record>[-<other>]`
    pub id: String,
    pub requirement_id: ReqId,
    pub domain: RuleDomain,
    pub rule_id: RuleId,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Other records involved (siblings, parents, cycle members)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comparison_targets: Vec<ReqId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    /// Similarity score that triggered a duplicate finding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    /// Confidence attached by an external opinion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Ordered cycle path; the closing edge runs from the last id to the first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycle: Vec<ReqId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opinion: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl Violation {
    pub fn new(
        rule_id: RuleId,
        severity: Severity,
        requirement_id: &ReqId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("{}-{}", rule_id, requirement_id),
            requirement_id: requirement_id.clone(),
            domain: rule_id.domain(),
            rule_id,
            severity,
            message: message.into(),
            details: None,
            comparison_targets: Vec::new(),
            suggested_fix: None,
            similarity: None,
            confidence: None,
            cycle: Vec::new(),
            opinion: None,
            detected_at: Utc::now(),
        }
    }

    /// Disambiguate the id when one record yields several findings of a rule
    pub fn with_id_suffix(mut self, suffix: impl std::fmt::Display) -> Self {
        self.id = format!("{}-{}", self.id, suffix);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_targets(mut self, targets: Vec<ReqId>) -> Self {
        self.comparison_targets = targets;
        self
    }

    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_similarity(mut self, similarity: f64) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_cycle(mut self, cycle: Vec<ReqId>) -> Self {
        self.cycle = cycle;
        self
    }

    /// The code fix policies match on
    pub fn code(&self) -> &'static str {
        self.rule_id.as_str()
    }
}

/// Result of validating one requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub requirement_id: ReqId,
    pub violations: Vec<Violation>,
    /// True iff there are no violations
    pub passed: bool,
    /// 0-100
    pub score: u32,
    pub validated_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn new(requirement_id: ReqId, violations: Vec<Violation>) -> Self {
        let score = quality_score(&violations);
        Self {
            requirement_id,
            passed: violations.is_empty(),
            violations,
            score,
            validated_at: Utc::now(),
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }
}

/// max(0, 100 - sum of severity weights)
pub fn quality_score(violations: &[Violation]) -> u32 {
    let penalty: u32 = violations.iter().map(|v| v.severity.weight()).sum();
    100u32.saturating_sub(penalty)
}
