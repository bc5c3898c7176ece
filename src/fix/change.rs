//! Change and ChangeSet: the units of graph mutation

use crate::graph::{RelationKind, ReqId, Requirement, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ordered (from, to) edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    pub from: ReqId,
    pub to: ReqId,
}

impl EdgeRef {
    pub fn new(from: impl Into<ReqId>, to: impl Into<ReqId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// State a split overwrote on its target, restored when the split is undone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOrigin {
    pub status: Status,
    #[serde(default)]
    pub supersedes: Vec<ReqId>,
}

/// Where an introduced record sits relative to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Above,
    Below,
}

/// The seven mutation kinds, each with its own payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Replace the target with one record per text
    Split { split_texts: Vec<String> },
    /// Fold the targets into `canonical_id`.
    ///
    /// With `undo_split` set, the non-canonical targets are the records a
    /// split created; they are removed and the canonical record's prior state
    /// restored.
    Merge {
        canonical_id: ReqId,
        merged_text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        undo_split: Option<SplitOrigin>,
    },
    /// Append edges (never removes); an edge already present is skipped
    Rewire {
        edge_type: RelationKind,
        new_edges: Vec<EdgeRef>,
    },
    /// Insert a new draft record
    Introduce {
        draft: Box<Requirement>,
        #[serde(default)]
        position: Position,
    },
    /// Replace the target's description
    Rewrite { old_text: String, new_text: String },
    /// Mark the target as an alias of another record
    Alias { alias_for: ReqId },
    /// Remove the cut edge from `refines` and `depends_on`
    BreakCycle {
        cycle_edges: Vec<EdgeRef>,
        cut_edge: EdgeRef,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Split { .. } => OperationKind::Split,
            Operation::Merge { .. } => OperationKind::Merge,
            Operation::Rewire { .. } => OperationKind::Rewire,
            Operation::Introduce { .. } => OperationKind::Introduce,
            Operation::Rewrite { .. } => OperationKind::Rewrite,
            Operation::Alias { .. } => OperationKind::Alias,
            Operation::BreakCycle { .. } => OperationKind::BreakCycle,
        }
    }
}

/// Payload-free operation tag, used by policies and governance lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Split,
    Merge,
    Rewire,
    Introduce,
    Rewrite,
    Alias,
    BreakCycle,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Split => "split",
            OperationKind::Merge => "merge",
            OperationKind::Rewire => "rewire",
            OperationKind::Introduce => "introduce",
            OperationKind::Rewrite => "rewrite",
            OperationKind::Alias => "alias",
            OperationKind::BreakCycle => "break_cycle",
        }
    }

    /// Human-facing label used in previews
    pub fn display_name(&self) -> &'static str {
        match self {
            OperationKind::Split => "Split requirement",
            OperationKind::Merge => "Merge requirements",
            OperationKind::Rewire => "Rewire relations",
            OperationKind::Introduce => "Introduce intermediate requirement",
            OperationKind::Rewrite => "Rewrite text",
            OperationKind::Alias => "Mark as alias",
            OperationKind::BreakCycle => "Break cycle",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a before/after preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub requirement_id: ReqId,
    pub field: String,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

impl DiffEntry {
    pub fn new(
        requirement_id: &ReqId,
        field: impl Into<String>,
        before: Option<String>,
        after: Option<String>,
    ) -> Self {
        Self {
            requirement_id: requirement_id.clone(),
            field: field.into(),
            before,
            after,
        }
    }
}

/// A single mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub operation: Operation,
    /// Record(s) the operation acts on; the first is the primary target
    pub target: Vec<ReqId>,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview: Vec<DiffEntry>,
    /// The change that undoes this one, if there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<Box<Change>>,
}

impl Change {
    pub fn new(operation: Operation, target: Vec<ReqId>, rationale: impl Into<String>) -> Self {
        Self {
            operation,
            target,
            rationale: rationale.into(),
            preview: Vec::new(),
            inverse: None,
        }
    }

    pub fn with_preview(mut self, preview: Vec<DiffEntry>) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_inverse(mut self, inverse: Change) -> Self {
        self.inverse = Some(Box::new(inverse));
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn primary_target(&self) -> Option<&ReqId> {
        self.target.first()
    }

    pub fn is_reversible(&self) -> bool {
        self.inverse.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSetStatus {
    Proposed,
    Approved,
    Applied,
    RolledBack,
}

impl ChangeSetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSetStatus::Proposed => "proposed",
            ChangeSetStatus::Approved => "approved",
            ChangeSetStatus::Applied => "applied",
            ChangeSetStatus::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for ChangeSetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a change set came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSetMetadata {
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub iteration: Option<usize>,
}

/// An ordered group of changes applied as one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Violation codes this set addresses
    pub violations: Vec<String>,
    pub changes: Vec<Change>,
    pub impacted: Vec<ReqId>,
    /// True iff every change carries an inverse
    pub reversible: bool,
    pub status: ChangeSetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: ChangeSetMetadata,
}

impl ChangeSet {
    /// A proposed change set; `reversible` is derived from the changes
    pub fn new(violations: Vec<String>, changes: Vec<Change>, impacted: Vec<ReqId>) -> Self {
        let reversible = changes.iter().all(Change::is_reversible);
        Self {
            id: format!("CS-{}", Uuid::new_v4()),
            created_at: Utc::now(),
            violations,
            changes,
            impacted,
            reversible,
            status: ChangeSetStatus::Proposed,
            approved_by: None,
            approved_at: None,
            applied_by: None,
            applied_at: None,
            rolled_back_by: None,
            rolled_back_at: None,
            metadata: ChangeSetMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ChangeSetMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Human approval: `proposed -> approved`. Returns false from any other state.
    pub fn approve(&mut self, by: impl Into<String>) -> bool {
        if self.status != ChangeSetStatus::Proposed {
            return false;
        }
        self.status = ChangeSetStatus::Approved;
        self.approved_by = Some(by.into());
        self.approved_at = Some(Utc::now());
        true
    }

    pub fn is_applicable(&self) -> bool {
        matches!(
            self.status,
            ChangeSetStatus::Proposed | ChangeSetStatus::Approved
        )
    }

    pub fn operations(&self) -> impl Iterator<Item = OperationKind> + '_ {
        self.changes.iter().map(Change::kind)
    }
}

/// Impact statistics of a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub requirements_affected: usize,
    pub new_requirements: usize,
    pub removed_requirements: usize,
    pub modified_requirements: usize,
}

/// The planner's output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixPlan {
    pub change_sets: Vec<ChangeSet>,
    pub total_changes: usize,
    pub estimated_impact: ImpactEstimate,
    /// Markdown preview of every change set
    pub preview: String,
}

impl FixPlan {
    pub fn is_empty(&self) -> bool {
        self.change_sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(old: &str, new: &str) -> Change {
        Change::new(
            Operation::Rewrite {
                old_text: old.to_string(),
                new_text: new.to_string(),
            },
            vec![ReqId::from("SYS-1")],
            "test",
        )
    }

    #[test]
    fn reversible_iff_every_change_has_inverse() {
        let with_inverse = rewrite("a", "b").with_inverse(rewrite("b", "a"));
        let without = rewrite("a", "b");

        assert!(ChangeSet::new(vec![], vec![with_inverse.clone()], vec![]).reversible);
        assert!(!ChangeSet::new(vec![], vec![with_inverse, without], vec![]).reversible);
    }

    #[test]
    fn approve_only_from_proposed() {
        let mut cs = ChangeSet::new(vec!["E1".into()], vec![rewrite("a", "b")], vec![]);
        assert!(cs.id.starts_with("CS-"));
        assert!(cs.approve("reviewer"));
        assert_eq!(cs.status, ChangeSetStatus::Approved);
        assert!(!cs.approve("someone else"));
        assert_eq!(cs.approved_by.as_deref(), Some("reviewer"));
    }

    #[test]
    fn operation_serializes_with_tag() {
        let op = Operation::BreakCycle {
            cycle_edges: vec![EdgeRef::new("A", "B"), EdgeRef::new("B", "A")],
            cut_edge: EdgeRef::new("B", "A"),
        };
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["op"], "break_cycle");
        assert_eq!(value["cut_edge"]["from"], "B");

        let back: Operation = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind(), OperationKind::BreakCycle);
    }

    #[test]
    fn change_set_survives_json() {
        let cs = ChangeSet::new(
            vec!["E1".into()],
            vec![rewrite("a", "b").with_inverse(rewrite("b", "a"))],
            vec![ReqId::from("SYS-1")],
        );
        let json = serde_json::to_string(&cs).unwrap();
        let back: ChangeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cs);
    }
}
