//! Fix executor: the plan -> apply -> revalidate loop
//!
//! Each iteration revalidates the working copy, plans fixes for the
//! actionable violations and applies the change sets the policy allows to
//! run unattended. Everything else is handed back as a proposal. The loop
//! stops at a fixed point, when nothing could be applied, or after
//! `stopping.max_iterations` iterations.

use super::change::{ChangeSet, OperationKind};
use super::engine::ChangeEngine;
use super::planner::FixPlanner;
use super::policy::{ActionMode, ExecutionMode, FixPolicy};
use crate::graph::{ReqId, RequirementSet, Violation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use tracing::{debug, info, warn};

/// Identity stamped on change sets the loop applies by itself
pub const DEFAULT_APPLIER: &str = "fix-executor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FixedPoint,
    MaxIterations,
    Error,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::FixedPoint => "fixed_point",
            StopReason::MaxIterations => "max_iterations",
            StopReason::Error => "error",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a fix run
#[derive(Debug, Clone)]
pub struct FixResult {
    pub success: bool,
    /// Applied sets, in application order
    pub applied: Vec<ChangeSet>,
    /// Sets from the last planning pass that need a human
    pub proposed: Vec<ChangeSet>,
    /// Violations found by the last revalidation
    pub remaining: Vec<Violation>,
    /// Codes addressed by applied sets
    pub fixed: Vec<String>,
    pub iterations: usize,
    pub stop_reason: StopReason,
    pub records: RequirementSet,
    pub error: Option<String>,
}

/// Outcome of `rollback_all`
#[derive(Debug, Clone)]
pub struct RollbackResult {
    pub success: bool,
    pub records: RequirementSet,
    pub errors: Vec<String>,
}

/// Runs the fix loop under one policy
#[derive(Debug, Clone)]
pub struct FixExecutor {
    planner: FixPlanner,
    engine: ChangeEngine,
    applier: String,
}

impl FixExecutor {
    pub fn new(policy: FixPolicy) -> Self {
        Self {
            planner: FixPlanner::new(policy),
            engine: ChangeEngine::new(),
            applier: DEFAULT_APPLIER.to_string(),
        }
    }

    /// Identity recorded as `applied_by`
    pub fn with_applier(mut self, applier: impl Into<String>) -> Self {
        self.applier = applier.into();
        self
    }

    pub fn policy(&self) -> &FixPolicy {
        self.planner.policy()
    }

    pub fn planner(&self) -> &FixPlanner {
        &self.planner
    }

    /// Whether a finding should drive another iteration
    pub fn is_actionable(&self, violation: &Violation) -> bool {
        let policy = self.policy();
        violation.severity >= policy.stopping.min_severity && policy.covers(violation.code())
    }

    /// `strict` policy, every change from an `auto` action, and no change
    /// whose operation needs approval
    pub fn can_auto_apply(&self, change_set: &ChangeSet) -> bool {
        let policy = self.policy();
        if policy.mode != ExecutionMode::Strict {
            return false;
        }
        if change_set.operations().any(|op| policy.requires_approval(op)) {
            return false;
        }
        let Some(rule) = change_set
            .metadata
            .rule_id
            .as_deref()
            .and_then(|id| policy.rule(id))
            .or_else(|| {
                let code = change_set.violations.first()?;
                policy.rules.iter().find(|r| &r.when_violation == code)
            })
        else {
            warn!(change_set = %change_set.id, "no policy rule for change set");
            return false;
        };
        change_set
            .operations()
            .all(|op: OperationKind| rule.mode_for(op) == Some(ActionMode::Auto))
    }

    /// Plan -> apply -> revalidate until a fixed point or the iteration cap.
    ///
    /// `revalidate` returns the current violations of a record set; an error
    /// from it stops the loop with `StopReason::Error`.
    pub fn run_fix_loop<F, E>(&self, records: &RequirementSet, mut revalidate: F) -> FixResult
    where
        F: FnMut(&RequirementSet) -> Result<Vec<Violation>, E>,
        E: Display,
    {
        let max_iterations = self.policy().stopping.max_iterations;
        let mut current = records.clone();
        let mut applied: Vec<ChangeSet> = Vec::new();
        let mut proposed: Vec<ChangeSet> = Vec::new();
        let mut fixed: BTreeSet<String> = BTreeSet::new();
        let mut iterations = 0;

        let (stop_reason, remaining) = loop {
            let violations = match revalidate(&current) {
                Ok(v) => v,
                Err(e) => {
                    warn!(iteration = iterations, error = %e, "revalidation failed");
                    return FixResult {
                        success: false,
                        applied,
                        proposed,
                        remaining: Vec::new(),
                        fixed: fixed.into_iter().collect(),
                        iterations,
                        stop_reason: StopReason::Error,
                        records: current,
                        error: Some(e.to_string()),
                    };
                }
            };

            let actionable: Vec<Violation> = violations
                .iter()
                .filter(|v| self.is_actionable(v))
                .cloned()
                .collect();
            if actionable.is_empty() {
                info!(iterations, "fixed point reached");
                break (StopReason::FixedPoint, violations);
            }
            if iterations >= max_iterations {
                warn!(max_iterations, remaining = actionable.len(), "iteration cap reached");
                break (StopReason::MaxIterations, violations);
            }

            iterations += 1;
            let plan = self.planner.plan_fixes(&actionable, &current);
            info!(
                iteration = iterations,
                actionable = actionable.len(),
                change_sets = plan.change_sets.len(),
                "fix iteration"
            );

            proposed.clear();
            let mut touched: HashSet<ReqId> = HashSet::new();
            let mut applied_any = false;
            for mut cs in plan.change_sets {
                cs.metadata.iteration = Some(iterations);
                if !self.can_auto_apply(&cs) {
                    proposed.push(cs);
                    continue;
                }
                // Planned against the pre-iteration graph; replan next round
                if cs.impacted.iter().any(|id| touched.contains(id)) {
                    debug!(change_set = %cs.id, "overlaps an applied set, deferring");
                    continue;
                }
                let outcome = self.engine.apply(&mut cs, &current, &self.applier);
                if outcome.success {
                    current = outcome.records;
                    touched.extend(cs.impacted.iter().cloned());
                    fixed.extend(cs.violations.iter().cloned());
                    applied.push(cs);
                    applied_any = true;
                } else {
                    warn!(change_set = %cs.id, errors = ?outcome.errors, "auto-apply failed");
                }
            }

            if !applied_any {
                info!(proposed = proposed.len(), "nothing applicable without approval");
                break (StopReason::FixedPoint, violations);
            }
        };

        FixResult {
            success: true,
            applied,
            proposed,
            remaining,
            fixed: fixed.into_iter().collect(),
            iterations,
            stop_reason,
            records: current,
            error: None,
        }
    }

    /// Plan against the current violations and return the markdown preview
    pub fn preview_fixes(&self, violations: &[Violation], records: &RequirementSet) -> String {
        self.planner.plan_fixes(violations, records).preview
    }

    /// Apply human-selected sets by id, in the order given. Unknown ids and
    /// failed sets are skipped with a warning.
    pub fn apply_selected(
        &self,
        ids: &[String],
        candidates: &mut [ChangeSet],
        records: &RequirementSet,
        approver: &str,
    ) -> FixResult {
        let mut current = records.clone();
        let mut applied = Vec::new();
        let mut fixed: BTreeSet<String> = BTreeSet::new();

        for id in ids {
            let Some(cs) = candidates.iter_mut().find(|cs| &cs.id == id) else {
                warn!(change_set = %id, "change set not found");
                continue;
            };
            cs.approve(approver);
            let outcome = self.engine.apply(cs, &current, approver);
            if outcome.success {
                current = outcome.records;
                fixed.extend(cs.violations.iter().cloned());
                applied.push(cs.clone());
            } else {
                warn!(change_set = %id, errors = ?outcome.errors, "apply failed");
            }
        }

        FixResult {
            success: true,
            applied,
            proposed: Vec::new(),
            remaining: Vec::new(),
            fixed: fixed.into_iter().collect(),
            iterations: 1,
            stop_reason: StopReason::FixedPoint,
            records: current,
            error: None,
        }
    }

    /// Roll back applied sets, last applied first. A set that fails to roll
    /// back leaves the records as they were before that step.
    pub fn rollback_all(
        &self,
        change_sets: &mut [ChangeSet],
        records: &RequirementSet,
        actor: &str,
    ) -> RollbackResult {
        let mut current = records.clone();
        let mut errors = Vec::new();
        for cs in change_sets.iter_mut().rev() {
            let outcome = self.engine.rollback(cs, &current, actor);
            if outcome.success {
                current = outcome.records;
            } else {
                errors.extend(outcome.errors);
            }
        }
        RollbackResult {
            success: errors.is_empty(),
            records: current,
            errors,
        }
    }
}
