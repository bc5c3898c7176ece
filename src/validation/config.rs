//! Rule configuration: which rules run, at what severity, with which thresholds
//!
//! Every field has a default, so a partial `validation-rules.yaml` only needs
//! to name what it changes.

use crate::config::{load_yaml, parse_yaml, ConfigResult};
use crate::graph::{RequirementType, RuleId, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Per-rule override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetting {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

/// An allowed (parent type, child type) pair for `refines` edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePair {
    pub parent: RequirementType,
    pub child: RequirementType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Used when no ontology is loaded
    pub allowed_pairs: Vec<TypePair>,
    pub require_parent: Vec<RequirementType>,
    /// Used when no ontology is loaded
    pub require_child: Vec<RequirementType>,
    pub max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        use RequirementType::*;
        Self {
            allowed_pairs: vec![
                TypePair { parent: Stakeholder, child: System },
                TypePair { parent: System, child: SystemFunctional },
            ],
            require_parent: vec![System, SystemFunctional],
            require_child: vec![Stakeholder, System],
            max_depth: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphHealthConfig {
    pub max_children: usize,
}

impl Default for GraphHealthConfig {
    fn default() -> Self {
        Self { max_children: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbstractionConfig {
    pub max_variance: f64,
    pub min_difference: f64,
}

impl Default for AbstractionConfig {
    fn default() -> Self {
        Self {
            max_variance: 0.15,
            min_difference: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeceConfig {
    pub similarity_threshold: f64,
    pub min_coverage: f64,
    pub max_children: usize,
    pub min_tokens_per_child: usize,
}

impl Default for MeceConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            min_coverage: 0.5,
            max_children: 10,
            min_tokens_per_child: 4,
        }
    }
}

/// Style rules for one requirement type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeStyle {
    /// Case-insensitive regex the description must match (E3)
    pub subject_pattern: Option<String>,
    /// Phrases that do not belong at this layer (E6)
    pub forbidden_phrases: Vec<String>,
    pub min_tokens: Option<usize>,
    pub max_tokens: Option<usize>,
    pub max_sentences: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub vague_terms: Vec<String>,
    pub passive_patterns: Vec<String>,
    pub min_atomicity: f64,
    pub per_type: BTreeMap<RequirementType, TypeStyle>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut per_type = BTreeMap::new();
        per_type.insert(
            RequirementType::Stakeholder,
            TypeStyle {
                subject_pattern: Some(
                    r"^\s*(the\s+)?[\w-]+(\s+[\w-]+)?\s+(shall|must|should|wants?|needs?)\b"
                        .to_string(),
                ),
                forbidden_phrases: strings(&["database", "api", "algorithm", "implement"]),
                min_tokens: Some(5),
                max_tokens: Some(60),
                max_sentences: Some(3),
            },
        );
        per_type.insert(
            RequirementType::System,
            TypeStyle {
                subject_pattern: Some(r"^\s*the\s+system\s+(shall|must|should)\b".to_string()),
                forbidden_phrases: strings(&["i want", "we want", "nice to have"]),
                min_tokens: Some(5),
                max_tokens: Some(50),
                max_sentences: Some(3),
            },
        );
        per_type.insert(
            RequirementType::SystemFunctional,
            TypeStyle {
                subject_pattern: Some(
                    r"^\s*the\s+(system|function|module|service|component)\s+(shall|must|should)\b"
                        .to_string(),
                ),
                forbidden_phrases: strings(&["i want", "we want", "nice to have"]),
                min_tokens: Some(4),
                max_tokens: Some(40),
                max_sentences: Some(2),
            },
        );

        Self {
            vague_terms: strings(&[
                "etc.",
                "as appropriate",
                "appropriately",
                "as needed",
                "if possible",
                "flexibly",
                "user-friendly",
                "and so on",
            ]),
            passive_patterns: strings(&[
                r"\b(is|are|was|were|be|been|being)\s+\w+ed\b",
                r"\b(is|are|was|were|be|been|being)\s+(sent|done|made|shown|given|kept|written)\b",
            ]),
            min_atomicity: 0.7,
            per_type,
        }
    }
}

/// Complete validation rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub version: String,
    /// Overrides keyed by rule id; rules not listed run at their default severity
    pub rules: BTreeMap<RuleId, RuleSetting>,
    pub hierarchy: HierarchyConfig,
    pub graph_health: GraphHealthConfig,
    pub abstraction: AbstractionConfig,
    pub mece: MeceConfig,
    pub style: StyleConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            rules: BTreeMap::new(),
            hierarchy: HierarchyConfig::default(),
            graph_health: GraphHealthConfig::default(),
            abstraction: AbstractionConfig::default(),
            mece: MeceConfig::default(),
            style: StyleConfig::default(),
        }
    }
}

impl ValidationConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        parse_yaml(text)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        load_yaml(path)
    }

    /// Load a rule file, degrading to the built-in defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "falling back to default validation rules");
                Self::default()
            }
        }
    }

    /// Severity a rule reports at, or `None` if the rule is disabled
    pub fn severity_for(&self, rule: RuleId) -> Option<Severity> {
        match self.rules.get(&rule) {
            Some(setting) if !setting.enabled => None,
            Some(setting) => Some(setting.severity.unwrap_or_else(|| rule.default_severity())),
            None => Some(rule.default_severity()),
        }
    }

    pub fn disable(mut self, rule: RuleId) -> Self {
        self.rules.insert(
            rule,
            RuleSetting {
                enabled: false,
                severity: None,
                description: None,
            },
        );
        self
    }

    pub fn type_style(&self, req_type: RequirementType) -> Option<&TypeStyle> {
        self.style.per_type.get(&req_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_rule() {
        let config = ValidationConfig::default();
        for rule in RuleId::ALL {
            assert_eq!(config.severity_for(rule), Some(rule.default_severity()));
        }
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = r#"
version: "2.0"
rules:
  B3: { enabled: false }
  E1: { severity: error }
mece:
  similarity_threshold: 0.9
"#;
        let config = ValidationConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.version, "2.0");
        assert_eq!(config.severity_for(RuleId::B3), None);
        assert_eq!(config.severity_for(RuleId::E1), Some(Severity::Error));
        assert_eq!(config.mece.similarity_threshold, 0.9);
        assert_eq!(config.mece.min_coverage, 0.5);
        assert_eq!(config.hierarchy.max_depth, 3);
    }

    #[test]
    fn load_or_default_degrades_on_missing_file() {
        let config = ValidationConfig::load_or_default("/nonexistent/rules.yaml");
        assert_eq!(config.graph_health.max_children, 10);
    }

    #[test]
    fn bundled_rules_file_parses() {
        let text = include_str!("../../config/validation-rules.yaml");
        let config = ValidationConfig::from_yaml_str(text).unwrap();
        assert!(config.type_style(RequirementType::System).is_some());
    }
}
