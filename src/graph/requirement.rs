//! Requirement: a node in the requirement graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a requirement
///
/// Serializes as a plain string (e.g. "SYS-001").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReqId(String);

impl ReqId {
    /// Create a ReqId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReqId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReqId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ReqId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A requirement set: the whole graph, keyed by id.
///
/// Ordered so that every pass over the graph is deterministic.
pub type RequirementSet = BTreeMap<ReqId, Requirement>;

/// Abstraction layer of a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    Stakeholder,
    System,
    #[serde(alias = "functional")]
    SystemFunctional,
}

impl RequirementType {
    pub const ALL: [RequirementType; 3] = [
        RequirementType::Stakeholder,
        RequirementType::System,
        RequirementType::SystemFunctional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementType::Stakeholder => "stakeholder",
            RequirementType::System => "system",
            RequirementType::SystemFunctional => "system_functional",
        }
    }
}

impl std::fmt::Display for RequirementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. `Superseded` is a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Draft,
    Proposed,
    Approved,
    InProgress,
    Completed,
    Rejected,
    OnHold,
    Superseded,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Proposed => "proposed",
            Status::Approved => "approved",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Rejected => "rejected",
            Status::OnHold => "on_hold",
            Status::Superseded => "superseded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

/// The relation kinds a requirement can carry toward other requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Refines,
    DependsOn,
    ConflictsWith,
    Duplicates,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::Refines,
        RelationKind::DependsOn,
        RelationKind::ConflictsWith,
        RelationKind::Duplicates,
    ];
}

/// Text metrics derived from a requirement's wording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    /// Whitespace-delimited words across title, description and rationale
    pub length_tokens: usize,
    /// 1.0 for a single-concern statement, falling with conjunction density
    pub atomicity_score: f64,
    /// Whether the description opens with "<actor> shall|must|..."
    pub has_subject: bool,
    pub sentence_count: usize,
}

/// A single requirement record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Unique identifier
    pub id: ReqId,
    pub title: String,
    pub description: String,
    /// Abstraction layer
    #[serde(rename = "type")]
    pub req_type: RequirementType,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    // --- relations (ordered, set semantics) ---
    /// Parents this requirement elaborates
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refines: Vec<ReqId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ReqId>,
    /// Must be mirrored on the other side
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<ReqId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<ReqId>,

    // --- provenance ---
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<ReqId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supersedes: Vec<ReqId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub canonical_of: Vec<ReqId>,

    /// 0.0 (concrete) to 1.0 (abstract); used only by abstraction rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstraction_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TextMetrics>,
}

impl Requirement {
    /// Create a draft requirement with no relations
    pub fn new(
        id: impl Into<ReqId>,
        req_type: RequirementType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            req_type,
            status: Status::Draft,
            priority: Priority::Medium,
            category: None,
            tags: Vec::new(),
            rationale: None,
            author: None,
            assignee: None,
            created_at: None,
            updated_at: None,
            refines: Vec::new(),
            depends_on: Vec::new(),
            conflicts_with: Vec::new(),
            duplicates: Vec::new(),
            derived_from: Vec::new(),
            supersedes: Vec::new(),
            canonical_of: Vec::new(),
            abstraction_score: None,
            metrics: None,
        }
    }

    pub fn refining(mut self, parent: impl Into<ReqId>) -> Self {
        push_unique(&mut self.refines, parent.into());
        self
    }

    pub fn depending_on(mut self, other: impl Into<ReqId>) -> Self {
        push_unique(&mut self.depends_on, other.into());
        self
    }

    pub fn conflicting_with(mut self, other: impl Into<ReqId>) -> Self {
        push_unique(&mut self.conflicts_with, other.into());
        self
    }

    pub fn duplicating(mut self, other: impl Into<ReqId>) -> Self {
        push_unique(&mut self.duplicates, other.into());
        self
    }

    pub fn with_abstraction_score(mut self, score: f64) -> Self {
        self.abstraction_score = Some(score);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Outgoing ids for one relation kind
    pub fn relation(&self, kind: RelationKind) -> &[ReqId] {
        match kind {
            RelationKind::Refines => &self.refines,
            RelationKind::DependsOn => &self.depends_on,
            RelationKind::ConflictsWith => &self.conflicts_with,
            RelationKind::Duplicates => &self.duplicates,
        }
    }

    pub fn relation_mut(&mut self, kind: RelationKind) -> &mut Vec<ReqId> {
        match kind {
            RelationKind::Refines => &mut self.refines,
            RelationKind::DependsOn => &mut self.depends_on,
            RelationKind::ConflictsWith => &mut self.conflicts_with,
            RelationKind::Duplicates => &mut self.duplicates,
        }
    }

    /// Title and description joined, the text similarity rules compare
    pub fn full_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// False once the record has been tombstoned
    pub fn is_active(&self) -> bool {
        self.status != Status::Superseded
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Append `id` unless already present (relations are ordered sets)
pub fn push_unique(list: &mut Vec<ReqId>, id: ReqId) -> bool {
    if list.contains(&id) {
        false
    } else {
        list.push(id);
        true
    }
}

/// Build a requirement set from a list of records (later duplicates win)
pub fn requirement_set(records: impl IntoIterator<Item = Requirement>) -> RequirementSet {
    records.into_iter().map(|r| (r.id.clone(), r)).collect()
}
