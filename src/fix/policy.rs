//! FixPolicy: declarative rules binding violation codes to fix actions

use super::change::OperationKind;
use crate::config::{load_yaml, parse_yaml, ConfigError, ConfigResult};
use crate::graph::{RequirementType, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Global execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Auto-mode actions are applied without a human
    #[default]
    Strict,
    /// Everything is proposed, nothing applied
    Suggest,
    /// Everything is proposed for a human to approve
    Assist,
}

/// Per-action mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    Auto,
    #[default]
    Assist,
    Suggest,
}

/// Fix action names a policy may `use`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SplitRequirement,
    MergeRequirements,
    RewriteText,
    BreakCycle,
    IntroduceIntermediate,
}

impl ActionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "split_requirement" => Some(ActionKind::SplitRequirement),
            "merge_requirements" => Some(ActionKind::MergeRequirements),
            "rewrite_text" => Some(ActionKind::RewriteText),
            "break_cycle" => Some(ActionKind::BreakCycle),
            "introduce_intermediate" => Some(ActionKind::IntroduceIntermediate),
            _ => None,
        }
    }

    /// The operation this action produces
    pub fn operation(&self) -> OperationKind {
        match self {
            ActionKind::SplitRequirement => OperationKind::Split,
            ActionKind::MergeRequirements => OperationKind::Merge,
            ActionKind::RewriteText => OperationKind::Rewrite,
            ActionKind::BreakCycle => OperationKind::BreakCycle,
            ActionKind::IntroduceIntermediate => OperationKind::Introduce,
        }
    }
}

/// Typed action parameters; each action reads the ones it understands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionParams {
    /// rewrite_text: prepend `default_subject` when the text has no subject
    pub add_subject: bool,
    pub default_subject: Option<String>,
    /// rewrite_text: replace vague terms with specificity prompts
    pub replace_ambiguous: bool,
    /// rewrite_text: vague term -> replacement; empty means the built-in table
    pub replacements: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixAction {
    /// Action name, e.g. `split_requirement`
    #[serde(rename = "use")]
    pub name: String,
    #[serde(default)]
    pub mode: ActionMode,
    #[serde(default)]
    pub params: ActionParams,
}

impl FixAction {
    pub fn new(name: impl Into<String>, mode: ActionMode) -> Self {
        Self {
            name: name.into(),
            mode,
            params: ActionParams::default(),
        }
    }

    pub fn with_params(mut self, params: ActionParams) -> Self {
        self.params = params;
        self
    }

    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::from_name(&self.name)
    }
}

/// Preconditions on the violation's target record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guard {
    /// Allowed record types; empty allows all
    pub level: Vec<RequirementType>,
    pub min_confidence: Option<f64>,
    pub min_similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRule {
    pub id: String,
    /// Violation code this rule reacts to, e.g. "B1"
    pub when_violation: String,
    /// Higher runs first
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub guard: Option<Guard>,
    #[serde(default)]
    pub actions: Vec<FixAction>,
}

impl FixRule {
    pub fn new(id: impl Into<String>, when_violation: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            when_violation: when_violation.into(),
            priority,
            description: String::new(),
            guard: None,
            actions: Vec::new(),
        }
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_action(mut self, action: FixAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mode of the action that produces `operation`
    pub fn mode_for(&self, operation: OperationKind) -> Option<ActionMode> {
        self.actions
            .iter()
            .find(|a| a.kind().map(|k| k.operation()) == Some(operation))
            .map(|a| a.mode)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stopping {
    pub max_iterations: usize,
    pub fixed_point: String,
    /// Violations below this severity never drive another iteration
    pub min_severity: Severity,
}

impl Default for Stopping {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            fixed_point: "no actionable violations remain after revalidation".to_string(),
            min_severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalRequired {
    /// Operations that always need a human, whatever the mode
    pub operations: Vec<OperationKind>,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Governance {
    pub approval_required: ApprovalRequired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixPolicy {
    /// Policy identifier
    pub policy: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub principles: Vec<String>,
    #[serde(default)]
    pub stopping: Stopping,
    #[serde(default)]
    pub rules: Vec<FixRule>,
    #[serde(default)]
    pub governance: Governance,
}

impl FixPolicy {
    /// An empty policy with the given id
    pub fn new(policy: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            policy: policy.into(),
            version: "1.0".to_string(),
            description: String::new(),
            mode,
            principles: Vec::new(),
            stopping: Stopping::default(),
            rules: Vec::new(),
            governance: Governance::default(),
        }
    }

    pub fn with_rule(mut self, rule: FixRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.stopping.max_iterations = max;
        self
    }

    pub fn with_approval_required(mut self, operation: OperationKind) -> Self {
        self.governance.approval_required.operations.push(operation);
        self
    }

    /// Parse and sanity-check a policy. Any problem is fatal.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let policy: Self = parse_yaml(text)?;
        policy.check()?;
        Ok(policy)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let policy: Self = load_yaml(path)?;
        policy.check()?;
        Ok(policy)
    }

    fn check(&self) -> ConfigResult<()> {
        if self.stopping.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "stopping.max_iterations must be at least 1".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        for rule in &self.rules {
            if !ids.insert(rule.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate fix rule id '{}'", rule.id)));
            }
            if rule.when_violation.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "fix rule '{}' has no when_violation",
                    rule.id
                )));
            }
        }
        Ok(())
    }

    /// Rules ordered by descending priority; ties keep file order
    pub fn rules_by_priority(&self) -> Vec<&FixRule> {
        let mut rules: Vec<&FixRule> = self.rules.iter().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    }

    pub fn rule(&self, id: &str) -> Option<&FixRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Whether any rule reacts to this violation code
    pub fn covers(&self, code: &str) -> bool {
        self.rules.iter().any(|r| r.when_violation == code)
    }

    pub fn requires_approval(&self, operation: OperationKind) -> bool {
        self.governance
            .approval_required
            .operations
            .contains(&operation)
    }
}

impl Default for FixPolicy {
    /// The built-in policy: cycles and wording are fixed automatically,
    /// structural reshaping is proposed for approval
    fn default() -> Self {
        let mut policy = FixPolicy::new("default", ExecutionMode::Strict)
            .with_rule(
                FixRule::new("break-dependency-cycles", "B1", 100)
                    .with_description("Cut the closing edge of every dependency cycle")
                    .with_action(FixAction::new("break_cycle", ActionMode::Auto)),
            )
            .with_rule(
                FixRule::new("break-refinement-cycles", "A3", 95)
                    .with_description("Cut the closing edge of refinement cycles")
                    .with_action(FixAction::new("break_cycle", ActionMode::Auto)),
            )
            .with_rule(
                FixRule::new("merge-duplicate-siblings", "D1", 70)
                    .with_description("Fold near-identical siblings into one record")
                    .with_guard(Guard {
                        min_similarity: Some(0.85),
                        ..Default::default()
                    })
                    .with_action(FixAction::new("merge_requirements", ActionMode::Assist)),
            )
            .with_rule(
                FixRule::new("split-compound", "E5", 60)
                    .with_description("Split requirements that bundle several concerns")
                    .with_guard(Guard {
                        level: vec![RequirementType::System, RequirementType::SystemFunctional],
                        ..Default::default()
                    })
                    .with_action(FixAction::new("split_requirement", ActionMode::Assist)),
            )
            .with_rule(
                FixRule::new("state-subject", "E3", 50)
                    .with_description("Prepend the missing subject")
                    .with_guard(Guard {
                        level: vec![RequirementType::System, RequirementType::SystemFunctional],
                        ..Default::default()
                    })
                    .with_action(FixAction::new("rewrite_text", ActionMode::Auto).with_params(
                        ActionParams {
                            add_subject: true,
                            default_subject: Some("The system shall".to_string()),
                            ..Default::default()
                        },
                    )),
            )
            .with_rule(
                FixRule::new("clarify-vague-terms", "E1", 40)
                    .with_description("Replace vague wording with specificity prompts")
                    .with_action(FixAction::new("rewrite_text", ActionMode::Auto).with_params(
                        ActionParams {
                            replace_ambiguous: true,
                            ..Default::default()
                        },
                    )),
            )
            .with_rule(
                FixRule::new("insert-intermediate-layer", "C2", 30)
                    .with_description("Insert a layer between records at the same abstraction")
                    .with_action(FixAction::new("introduce_intermediate", ActionMode::Assist)),
            )
            .with_approval_required(OperationKind::Merge)
            .with_approval_required(OperationKind::Introduce);
        policy.description = "Built-in requirement fix policy".to_string();
        policy.principles = vec![
            "Every applied change set is atomic".to_string(),
            "Structural reshaping needs a human".to_string(),
        ];
        policy
    }
}
