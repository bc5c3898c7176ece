//! Change engine: transactional apply and rollback of ChangeSets
//!
//! Every mutation runs against a private working copy of the record set.
//! When any change in a set fails, the working copy is dropped and the
//! caller gets the untouched input back, so a half-applied set is never
//! observable. Rollback follows the same all-or-nothing rule.

use super::change::{Change, ChangeSet, ChangeSetStatus, Operation, OperationKind, Position};
use crate::graph::{push_unique, RelationKind, ReqId, Requirement, RequirementSet, Status};
use crate::validation::metrics::analyze;
use chrono::Utc;
use std::fmt::Write;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a change (or a whole change set) could not be applied
#[derive(Debug, Error, PartialEq)]
pub enum ChangeError {
    #[error("{op}: requirement {id} not found")]
    TargetNotFound { op: OperationKind, id: ReqId },

    #[error("{op}: missing {field}")]
    MissingField {
        op: OperationKind,
        field: &'static str,
    },

    #[error("{op}: requirement {id} already exists")]
    AlreadyExists { op: OperationKind, id: ReqId },

    #[error("{op}: requirement {id} is already superseded")]
    Superseded { op: OperationKind, id: ReqId },

    #[error("change set {id} is {status}, expected {expected}")]
    InvalidStatus {
        id: String,
        status: ChangeSetStatus,
        expected: &'static str,
    },

    #[error("change set {id} is not reversible")]
    NotReversible { id: String },

    #[error("change {index} of change set {id} has no inverse")]
    MissingInverse { id: String, index: usize },

    #[error("change {index} of change set {id} failed: {source}")]
    Failed {
        id: String,
        index: usize,
        #[source]
        source: Box<ChangeError>,
    },
}

/// Result of `apply` or `rollback`
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    pub success: bool,
    /// The mutated copy on success, the unmodified input otherwise
    pub records: RequirementSet,
    pub errors: Vec<String>,
}

impl ChangeOutcome {
    fn ok(records: RequirementSet) -> Self {
        Self {
            success: true,
            records,
            errors: Vec::new(),
        }
    }

    fn failed(records: &RequirementSet, error: ChangeError) -> Self {
        Self {
            success: false,
            records: records.clone(),
            errors: vec![error.to_string()],
        }
    }
}

/// Applies, rolls back and previews change sets. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeEngine;

impl ChangeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply every change in order. Only `proposed` or `approved` sets are
    /// accepted; success stamps the set `applied`.
    pub fn apply(
        &self,
        change_set: &mut ChangeSet,
        records: &RequirementSet,
        applier: &str,
    ) -> ChangeOutcome {
        if !change_set.is_applicable() {
            return ChangeOutcome::failed(
                records,
                ChangeError::InvalidStatus {
                    id: change_set.id.clone(),
                    status: change_set.status,
                    expected: "proposed or approved",
                },
            );
        }

        let mut working = records.clone();
        for (index, change) in change_set.changes.iter().enumerate() {
            if let Err(e) = apply_change(change, &mut working) {
                warn!(
                    change_set = %change_set.id,
                    index,
                    op = %change.kind(),
                    error = %e,
                    "change failed, discarding working copy"
                );
                return ChangeOutcome::failed(
                    records,
                    ChangeError::Failed {
                        id: change_set.id.clone(),
                        index,
                        source: Box::new(e),
                    },
                );
            }
        }

        change_set.status = ChangeSetStatus::Applied;
        change_set.applied_by = Some(applier.to_string());
        change_set.applied_at = Some(Utc::now());
        info!(
            change_set = %change_set.id,
            changes = change_set.changes.len(),
            applier,
            "change set applied"
        );
        ChangeOutcome::ok(working)
    }

    /// Undo an applied, reversible set by applying inverses in reverse order
    pub fn rollback(
        &self,
        change_set: &mut ChangeSet,
        records: &RequirementSet,
        actor: &str,
    ) -> ChangeOutcome {
        if change_set.status != ChangeSetStatus::Applied {
            return ChangeOutcome::failed(
                records,
                ChangeError::InvalidStatus {
                    id: change_set.id.clone(),
                    status: change_set.status,
                    expected: "applied",
                },
            );
        }
        if !change_set.reversible {
            return ChangeOutcome::failed(
                records,
                ChangeError::NotReversible {
                    id: change_set.id.clone(),
                },
            );
        }

        let mut working = records.clone();
        for (index, change) in change_set.changes.iter().enumerate().rev() {
            let Some(inverse) = change.inverse.as_deref() else {
                return ChangeOutcome::failed(
                    records,
                    ChangeError::MissingInverse {
                        id: change_set.id.clone(),
                        index,
                    },
                );
            };
            if let Err(e) = apply_change(inverse, &mut working) {
                warn!(change_set = %change_set.id, index, error = %e, "rollback failed");
                return ChangeOutcome::failed(
                    records,
                    ChangeError::Failed {
                        id: change_set.id.clone(),
                        index,
                        source: Box::new(e),
                    },
                );
            }
        }

        change_set.status = ChangeSetStatus::RolledBack;
        change_set.rolled_back_by = Some(actor.to_string());
        change_set.rolled_back_at = Some(Utc::now());
        info!(change_set = %change_set.id, actor, "change set rolled back");
        ChangeOutcome::ok(working)
    }

    /// Human-readable markdown description of a set. Never mutates.
    pub fn preview(&self, change_set: &ChangeSet, records: &RequirementSet) -> String {
        let mut out = String::new();
        let impacted: Vec<&str> = change_set.impacted.iter().map(|id| id.as_str()).collect();
        // Writing to a String cannot fail
        let _ = writeln!(out, "**Change set**: {}", change_set.id);
        let _ = writeln!(out, "**Addresses**: {}", change_set.violations.join(", "));
        let _ = writeln!(out, "**Status**: {}", change_set.status);
        let _ = writeln!(
            out,
            "**Reversible**: {}",
            if change_set.reversible { "yes" } else { "no" }
        );
        let _ = writeln!(out, "**Impacted**: {}\n", impacted.join(", "));

        for (i, change) in change_set.changes.iter().enumerate() {
            let targets: Vec<&str> = change.target.iter().map(|id| id.as_str()).collect();
            let _ = writeln!(
                out,
                "### {}. {} ({})\n",
                i + 1,
                change.kind().display_name(),
                targets.join(", ")
            );
            let _ = writeln!(out, "{}\n", change.rationale);
            if change.preview.is_empty() {
                for id in &change.target {
                    if let Some(req) = records.get(id) {
                        let _ = writeln!(out, "- {} (current): {}", id, req.description);
                    }
                }
            }
            for entry in &change.preview {
                let field = format!("{}.{}", entry.requirement_id, entry.field);
                match (&entry.before, &entry.after) {
                    (Some(before), Some(after)) => {
                        let _ = writeln!(out, "- {}: \"{}\" -> \"{}\"", field, before, after);
                    }
                    (None, Some(after)) => {
                        let _ = writeln!(out, "- {} (new): \"{}\"", field, after);
                    }
                    (Some(before), None) => {
                        let _ = writeln!(out, "- {} (removed): \"{}\"", field, before);
                    }
                    (None, None) => {
                        let _ = writeln!(out, "- {}", field);
                    }
                }
            }
            let _ = writeln!(out);
        }
        out
    }
}

fn target_mut<'a>(
    records: &'a mut RequirementSet,
    id: &ReqId,
    op: OperationKind,
) -> Result<&'a mut Requirement, ChangeError> {
    records.get_mut(id).ok_or_else(|| ChangeError::TargetNotFound {
        op,
        id: id.clone(),
    })
}

/// Stamp an edit to the wording; stored metrics would otherwise go stale
fn reworded(req: &mut Requirement) {
    if req.metrics.is_some() {
        req.metrics = Some(analyze(req));
    }
    req.touch();
}

fn primary(change: &Change) -> Result<&ReqId, ChangeError> {
    change.primary_target().ok_or(ChangeError::MissingField {
        op: change.kind(),
        field: "target",
    })
}

/// Apply one change to the working copy
pub(crate) fn apply_change(change: &Change, records: &mut RequirementSet) -> Result<(), ChangeError> {
    debug!(op = %change.kind(), targets = change.target.len(), "applying change");
    match &change.operation {
        Operation::Split { split_texts } => split(primary(change)?, split_texts, records),
        Operation::Merge {
            canonical_id,
            merged_text,
            undo_split,
        } => match undo_split {
            Some(origin) => {
                let canonical = target_mut(records, canonical_id, OperationKind::Merge)?;
                canonical.description = merged_text.clone();
                canonical.status = origin.status;
                canonical.supersedes = origin.supersedes.clone();
                reworded(canonical);
                for id in change.target.iter().filter(|id| *id != canonical_id) {
                    let removed = records.remove(id);
                    if removed.is_none() {
                        return Err(ChangeError::TargetNotFound {
                            op: OperationKind::Merge,
                            id: id.clone(),
                        });
                    }
                }
                Ok(())
            }
            None => merge(canonical_id, merged_text, &change.target, records),
        },
        Operation::Rewire {
            edge_type,
            new_edges,
        } => {
            for edge in new_edges {
                let from = target_mut(records, &edge.from, OperationKind::Rewire)?;
                push_unique(from.relation_mut(*edge_type), edge.to.clone());
                from.touch();
            }
            Ok(())
        }
        Operation::Introduce { draft, position } => {
            if records.contains_key(&draft.id) {
                return Err(ChangeError::AlreadyExists {
                    op: OperationKind::Introduce,
                    id: draft.id.clone(),
                });
            }
            let mut fresh = (**draft).clone();
            let now = Utc::now();
            fresh.created_at = Some(now);
            fresh.updated_at = Some(now);
            debug!(id = %fresh.id, ?position, "introducing requirement");
            if *position == Position::Below {
                if let Some(target) = change.primary_target() {
                    fresh.refines = vec![target.clone()];
                }
            }
            records.insert(fresh.id.clone(), fresh);
            Ok(())
        }
        Operation::Rewrite { new_text, .. } => {
            if new_text.trim().is_empty() {
                return Err(ChangeError::MissingField {
                    op: OperationKind::Rewrite,
                    field: "new_text",
                });
            }
            let req = target_mut(records, primary(change)?, OperationKind::Rewrite)?;
            req.description = new_text.clone();
            reworded(req);
            Ok(())
        }
        Operation::Alias { alias_for } => {
            let req = target_mut(records, primary(change)?, OperationKind::Alias)?;
            req.supersedes = vec![alias_for.clone()];
            req.status = Status::Superseded;
            req.touch();
            Ok(())
        }
        Operation::BreakCycle { cut_edge, .. } => {
            let from = target_mut(records, &cut_edge.from, OperationKind::BreakCycle)?;
            for kind in [RelationKind::Refines, RelationKind::DependsOn] {
                from.relation_mut(kind).retain(|id| *id != cut_edge.to);
            }
            from.touch();
            Ok(())
        }
    }
}

fn split(id: &ReqId, texts: &[String], records: &mut RequirementSet) -> Result<(), ChangeError> {
    if texts.is_empty() || texts.iter().any(|t| t.trim().is_empty()) {
        return Err(ChangeError::MissingField {
            op: OperationKind::Split,
            field: "split_texts",
        });
    }
    let original = records
        .get(id)
        .cloned()
        .ok_or_else(|| ChangeError::TargetNotFound {
            op: OperationKind::Split,
            id: id.clone(),
        })?;

    let mut new_ids = Vec::with_capacity(texts.len());
    for (n, text) in texts.iter().enumerate() {
        let new_id = split_id(id, n + 1);
        if records.contains_key(&new_id) {
            return Err(ChangeError::AlreadyExists {
                op: OperationKind::Split,
                id: new_id,
            });
        }
        let mut part = original.clone();
        part.id = new_id.clone();
        part.description = text.clone();
        part.derived_from = vec![id.clone()];
        part.supersedes = Vec::new();
        part.canonical_of = Vec::new();
        part.metrics = None;
        part.touch();
        records.insert(new_id.clone(), part);
        new_ids.push(new_id);
    }

    let req = target_mut(records, id, OperationKind::Split)?;
    req.status = Status::Superseded;
    req.supersedes = new_ids;
    req.touch();
    Ok(())
}

fn merge(
    canonical_id: &ReqId,
    merged_text: &str,
    targets: &[ReqId],
    records: &mut RequirementSet,
) -> Result<(), ChangeError> {
    let others: Vec<&ReqId> = targets.iter().filter(|id| *id != canonical_id).collect();
    // The canonical record survives, so every party must still be live
    for id in std::iter::once(canonical_id).chain(others.iter().copied()) {
        match records.get(id) {
            None => {
                return Err(ChangeError::TargetNotFound {
                    op: OperationKind::Merge,
                    id: id.clone(),
                })
            }
            Some(req) if !req.is_active() => {
                return Err(ChangeError::Superseded {
                    op: OperationKind::Merge,
                    id: id.clone(),
                })
            }
            Some(_) => {}
        }
    }

    let canonical = target_mut(records, canonical_id, OperationKind::Merge)?;
    for id in &others {
        push_unique(&mut canonical.canonical_of, (*id).clone());
    }
    canonical.description = merged_text.to_string();
    reworded(canonical);

    for id in others {
        let req = target_mut(records, id, OperationKind::Merge)?;
        req.status = Status::Superseded;
        req.supersedes = vec![canonical_id.clone()];
        req.touch();
    }
    Ok(())
}

/// Id of the n-th (1-based) record a split produces
pub fn split_id(id: &ReqId, n: usize) -> ReqId {
    ReqId::from(format!("{}-S{}", id, n))
}
