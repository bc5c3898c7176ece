//! Fix planner: turns violations into proposed ChangeSets
//!
//! Rules are visited in descending priority. For each violation a rule
//! reacts to, the rule's guard is checked against the target record and
//! every action synthesizes at most one Change. A violation whose actions
//! all come up empty produces no ChangeSet.

use super::change::{
    Change, ChangeSet, ChangeSetMetadata, DiffEntry, EdgeRef, FixPlan, ImpactEstimate, Operation,
    Position, SplitOrigin,
};
use super::engine::{split_id, ChangeEngine};
use super::policy::{ActionKind, ActionParams, FixAction, FixPolicy, FixRule, Guard};
use crate::graph::{push_unique, ReqId, Requirement, RequirementSet, Status, Violation};
use crate::validation::metrics::has_subject;
use regex_lite::{escape, NoExpand, Regex};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write;
use tracing::{debug, warn};

/// Subject prepended by `rewrite_text` when none is configured
pub const DEFAULT_SUBJECT: &str = "The system shall";

/// Vague term -> prompt for specificity, used when a rule gives no table
const DEFAULT_REPLACEMENTS: &[(&str, &str)] = &[
    ("etc.", "[list every item explicitly]"),
    ("and so on", "[list every item explicitly]"),
    ("as appropriate", "according to [defined criteria]"),
    ("appropriately", "according to [defined criteria]"),
    ("as needed", "when [condition]"),
    ("if possible", "[state when this is required]"),
    ("flexibly", "[state the allowed variations]"),
    ("user-friendly", "[measurable usability criteria]"),
];

/// Plans fixes under one policy
#[derive(Debug, Clone)]
pub struct FixPlanner {
    policy: FixPolicy,
    engine: ChangeEngine,
}

impl FixPlanner {
    pub fn new(policy: FixPolicy) -> Self {
        Self {
            policy,
            engine: ChangeEngine::new(),
        }
    }

    pub fn policy(&self) -> &FixPolicy {
        &self.policy
    }

    /// Build a plan for `violations` against the current `records`
    pub fn plan_fixes(&self, violations: &[Violation], records: &RequirementSet) -> FixPlan {
        let mut by_code: BTreeMap<&str, Vec<&Violation>> = BTreeMap::new();
        for v in violations {
            by_code.entry(v.code()).or_default().push(v);
        }

        let mut change_sets = Vec::new();
        let mut affected: HashSet<ReqId> = HashSet::new();
        // Duplicate findings arrive from every side of a group; merge each group once
        let mut merge_groups: HashSet<BTreeSet<ReqId>> = HashSet::new();
        let mut impact = ImpactEstimate::default();

        for rule in self.policy.rules_by_priority() {
            let Some(matching) = by_code.get(rule.when_violation.as_str()) else {
                continue;
            };
            for violation in matching {
                if !guard_passes(rule, violation, records) {
                    debug!(rule = %rule.id, violation = %violation.id, "guard failed, skipping");
                    continue;
                }

                let changes: Vec<Change> = rule
                    .actions
                    .iter()
                    .filter_map(|action| create_change(action, violation, records))
                    .filter(|change| match &change.operation {
                        Operation::Merge {
                            undo_split: None, ..
                        } => merge_groups.insert(change.target.iter().cloned().collect()),
                        _ => true,
                    })
                    .collect();
                if changes.is_empty() {
                    continue;
                }

                for change in &changes {
                    affected.extend(change.target.iter().cloned());
                    count_impact(change, &mut impact);
                }

                let impacted = impacted_ids(&changes, records);
                let cs = ChangeSet::new(vec![violation.code().to_string()], changes, impacted)
                    .with_metadata(ChangeSetMetadata {
                        policy_id: Some(self.policy.policy.clone()),
                        rule_id: Some(rule.id.clone()),
                        iteration: None,
                    });
                change_sets.push(cs);
            }
        }

        impact.requirements_affected = affected.len();
        let total_changes = change_sets.iter().map(|cs| cs.changes.len()).sum();
        let preview = self.render_preview(&change_sets, records);
        FixPlan {
            change_sets,
            total_changes,
            estimated_impact: impact,
            preview,
        }
    }

    fn render_preview(&self, change_sets: &[ChangeSet], records: &RequirementSet) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Fix plan\n");
        let _ = writeln!(out, "**Policy**: {}", self.policy.policy);
        let _ = writeln!(out, "**Change sets**: {}\n", change_sets.len());
        for (i, cs) in change_sets.iter().enumerate() {
            let _ = writeln!(out, "## Change set {}: {}\n", i + 1, cs.id);
            out.push_str(&self.engine.preview(cs, records));
            let _ = writeln!(out, "\n---\n");
        }
        out
    }
}

/// Guard check against the violation's target record.
/// A measurement the guard needs but the violation lacks fails the guard.
fn guard_passes(rule: &FixRule, violation: &Violation, records: &RequirementSet) -> bool {
    let Some(guard) = &rule.guard else {
        return true;
    };
    let Some(req) = records.get(&violation.requirement_id) else {
        return false;
    };
    check_guard(guard, req, violation)
}

fn check_guard(guard: &Guard, req: &Requirement, violation: &Violation) -> bool {
    if !guard.level.is_empty() && !guard.level.contains(&req.req_type) {
        return false;
    }
    if let Some(min) = guard.min_confidence {
        if !violation.confidence.is_some_and(|c| c >= min) {
            return false;
        }
    }
    if let Some(min) = guard.min_similarity {
        if !violation.similarity.is_some_and(|s| s >= min) {
            return false;
        }
    }
    true
}

fn create_change(
    action: &FixAction,
    violation: &Violation,
    records: &RequirementSet,
) -> Option<Change> {
    let Some(kind) = action.kind() else {
        warn!(action = %action.name, "unknown fix action, skipping");
        return None;
    };
    let req = records.get(&violation.requirement_id)?;
    match kind {
        ActionKind::SplitRequirement => split_requirement(req, violation),
        ActionKind::MergeRequirements => merge_requirements(req, violation),
        ActionKind::RewriteText => rewrite_text(req, violation, &action.params),
        ActionKind::BreakCycle => break_cycle(violation),
        ActionKind::IntroduceIntermediate => introduce_intermediate(req, violation, records),
    }
}

fn split_requirement(req: &Requirement, violation: &Violation) -> Option<Change> {
    let parts = split_text(&req.description);
    if parts.len() < 2 {
        return None;
    }
    let new_ids: Vec<ReqId> = (1..=parts.len()).map(|n| split_id(&req.id, n)).collect();

    let mut preview = vec![DiffEntry::new(
        &req.id,
        "status",
        Some(req.status.as_str().to_string()),
        Some(Status::Superseded.as_str().to_string()),
    )];
    preview.extend(
        new_ids
            .iter()
            .zip(&parts)
            .map(|(id, text)| DiffEntry::new(id, "description", None, Some(text.clone()))),
    );

    let inverse = Change::new(
        Operation::Merge {
            canonical_id: req.id.clone(),
            merged_text: req.description.clone(),
            undo_split: Some(SplitOrigin {
                status: req.status,
                supersedes: req.supersedes.clone(),
            }),
        },
        new_ids,
        format!("Undo split of {}", req.id),
    );

    Some(
        Change::new(
            Operation::Split { split_texts: parts },
            vec![req.id.clone()],
            format!("Low atomicity ({}): separate the concerns", violation.code()),
        )
        .with_preview(preview)
        .with_inverse(inverse),
    )
}

fn merge_requirements(req: &Requirement, violation: &Violation) -> Option<Change> {
    let others: Vec<ReqId> = violation
        .comparison_targets
        .iter()
        .filter(|id| **id != req.id)
        .cloned()
        .collect();
    if others.is_empty() {
        return None;
    }
    let mut targets = vec![req.id.clone()];
    for id in &others {
        push_unique(&mut targets, id.clone());
    }
    let other_names: Vec<&str> = others.iter().map(|id| id.as_str()).collect();
    let merged_text = format!("{} (merged from: {})", req.description, other_names.join(", "));

    Some(
        Change::new(
            Operation::Merge {
                canonical_id: req.id.clone(),
                merged_text: merged_text.clone(),
                undo_split: None,
            },
            targets,
            format!("Duplicate ({}): fold similar records into {}", violation.code(), req.id),
        )
        .with_preview(vec![DiffEntry::new(
            &req.id,
            "description",
            Some(req.description.clone()),
            Some(merged_text),
        )]),
    )
}

fn rewrite_text(req: &Requirement, violation: &Violation, params: &ActionParams) -> Option<Change> {
    let mut text = req.description.clone();
    if params.add_subject && !has_subject(&text) {
        let subject = params.default_subject.as_deref().unwrap_or(DEFAULT_SUBJECT);
        text = prepend_subject(subject, &text);
    }
    if params.replace_ambiguous {
        text = replace_vague_terms(&text, &params.replacements);
    }
    if text == req.description || text.trim().is_empty() {
        return None;
    }

    let inverse = Change::new(
        Operation::Rewrite {
            old_text: text.clone(),
            new_text: req.description.clone(),
        },
        vec![req.id.clone()],
        format!("Undo rewrite of {}", req.id),
    );
    Some(
        Change::new(
            Operation::Rewrite {
                old_text: req.description.clone(),
                new_text: text.clone(),
            },
            vec![req.id.clone()],
            format!("Wording ({}): state the subject and be specific", violation.code()),
        )
        .with_preview(vec![DiffEntry::new(
            &req.id,
            "description",
            Some(req.description.clone()),
            Some(text),
        )])
        .with_inverse(inverse),
    )
}

fn break_cycle(violation: &Violation) -> Option<Change> {
    let cycle = &violation.cycle;
    let (first, last) = (cycle.first()?, cycle.last()?);
    let cycle_edges: Vec<EdgeRef> = cycle
        .iter()
        .enumerate()
        .map(|(i, id)| EdgeRef::new(id.clone(), cycle[(i + 1) % cycle.len()].clone()))
        .collect();
    let cut_edge = EdgeRef::new(last.clone(), first.clone());

    Some(
        Change::new(
            Operation::BreakCycle {
                cycle_edges,
                cut_edge: cut_edge.clone(),
            },
            vec![last.clone()],
            format!(
                "Cycle ({}): cut {} -> {}",
                violation.code(),
                cut_edge.from,
                cut_edge.to
            ),
        )
        .with_preview(vec![DiffEntry::new(
            &cut_edge.from,
            "edge",
            Some(format!("{} -> {}", cut_edge.from, cut_edge.to)),
            None,
        )]),
    )
}

fn introduce_intermediate(
    req: &Requirement,
    violation: &Violation,
    records: &RequirementSet,
) -> Option<Change> {
    let new_id = ReqId::from(format!("{}-INT", req.id));
    if records.contains_key(&new_id) {
        debug!(id = %new_id, "intermediate already exists");
        return None;
    }
    let mut draft = Requirement::new(
        new_id.clone(),
        req.req_type,
        format!("{} (intermediate)", req.title),
        format!("{} (introduced to bridge an abstraction gap)", req.description),
    );
    draft.category = req.category.clone();
    draft.priority = req.priority;
    draft.status = Status::Draft;
    draft.refines = req.refines.clone();

    let preview = vec![DiffEntry::new(
        &new_id,
        "description",
        None,
        Some(draft.description.clone()),
    )];
    Some(
        Change::new(
            Operation::Introduce {
                draft: Box::new(draft),
                position: Position::Above,
            },
            vec![req.id.clone()],
            format!("Abstraction gap ({}): introduce an intermediate layer", violation.code()),
        )
        .with_preview(preview),
    )
}

fn count_impact(change: &Change, impact: &mut ImpactEstimate) {
    match &change.operation {
        Operation::Split { split_texts } => {
            impact.new_requirements += split_texts.len();
            impact.modified_requirements += 1;
        }
        Operation::Merge { .. } => {
            impact.removed_requirements += change.target.len().saturating_sub(1);
            impact.modified_requirements += 1;
        }
        Operation::Introduce { .. } => impact.new_requirements += 1,
        _ => impact.modified_requirements += 1,
    }
}

/// Targets plus their current parents and dependencies, first-seen order
fn impacted_ids(changes: &[Change], records: &RequirementSet) -> Vec<ReqId> {
    let mut out = Vec::new();
    for id in changes.iter().flat_map(|c| &c.target) {
        push_unique(&mut out, id.clone());
        if let Some(req) = records.get(id) {
            for other in req.refines.iter().chain(&req.depends_on) {
                push_unique(&mut out, other.clone());
            }
        }
    }
    out
}

fn list_delimiter() -> Option<Regex> {
    Regex::new(r"[;\n•、・]").ok()
}

fn conjunction_delimiter() -> Option<Regex> {
    Regex::new(r"(?i),?\s+(and|or|as well as)\s+|および|かつ|または").ok()
}

/// Split text into concerns: list delimiters first, then conjunctions,
/// then a midpoint cut snapped to a char boundary
pub fn split_text(text: &str) -> Vec<String> {
    for delimiter in [list_delimiter(), conjunction_delimiter()].into_iter().flatten() {
        let parts: Vec<String> = delimiter
            .split(text)
            .map(|p| p.trim().trim_end_matches('.').trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() >= 2 {
            return parts;
        }
    }

    let mut mid = text.len() / 2;
    while mid > 0 && !text.is_char_boundary(mid) {
        mid -= 1;
    }
    let (head, tail) = text.split_at(mid);
    [head, tail]
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn prepend_subject(subject: &str, text: &str) -> String {
    let text = text.trim_start();
    let mut chars = text.chars();
    let rest = match (chars.next(), chars.next()) {
        // Keep acronyms such as "SMS" intact
        (Some(first), Some(second)) if first.is_uppercase() && !second.is_uppercase() => {
            let mut lowered: String = first.to_lowercase().collect();
            lowered.push_str(&text[first.len_utf8()..]);
            lowered
        }
        _ => text.to_string(),
    };
    format!("{} {}", subject.trim_end(), rest)
}

fn replace_vague_terms(text: &str, overrides: &BTreeMap<String, String>) -> String {
    let table: Vec<(String, String)> = if overrides.is_empty() {
        DEFAULT_REPLACEMENTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        let mut pairs: Vec<(String, String)> =
            overrides.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        // Longer terms first so "as appropriate" wins over "appropriate"
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        pairs
    };

    let mut out = text.to_string();
    for (term, replacement) in table {
        match Regex::new(&format!("(?i){}", escape(&term))) {
            Ok(re) => out = re.replace_all(&out, NoExpand(&replacement)).into_owned(),
            Err(e) => warn!(term, error = %e, "skipping replacement term"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::policy::{ActionMode, ExecutionMode};
    use crate::graph::{requirement_set, RequirementType, RuleId, Severity};

    fn id(s: &str) -> ReqId {
        ReqId::from(s)
    }

    fn records() -> RequirementSet {
        requirement_set(vec![
            Requirement::new("STK-1", RequirementType::Stakeholder, "Alerts", "Operators want alerts"),
            Requirement::new(
                "SYS-1",
                RequirementType::System,
                "Alerting",
                "Send alerts by email and by SMS",
            )
            .refining("STK-1"),
            Requirement::new(
                "SYS-2",
                RequirementType::System,
                "Alerting twin",
                "The system shall send alerts as appropriate, etc.",
            )
            .refining("STK-1"),
        ])
    }

    fn violation(rule: RuleId, target: &str) -> Violation {
        Violation::new(rule, Severity::Warning, &id(target), "finding")
    }

    fn policy_with(rule: FixRule) -> FixPolicy {
        FixPolicy::new("test", ExecutionMode::Strict).with_rule(rule)
    }

    #[test]
    fn split_text_prefers_list_delimiters() {
        assert_eq!(
            split_text("Export CSV; export PDF and XLSX"),
            vec!["Export CSV", "export PDF and XLSX"]
        );
        assert_eq!(
            split_text("Send alerts by email and by SMS"),
            vec!["Send alerts by email", "by SMS"]
        );
        let halves = split_text("abcdef");
        assert_eq!(halves, vec!["abc", "def"]);
    }

    #[test]
    fn split_text_midpoint_respects_char_boundaries() {
        let parts = split_text("ééé");
        assert_eq!(parts.concat(), "ééé");
    }

    #[test]
    fn split_change_carries_merge_inverse() {
        let rule = FixRule::new("split", "E5", 10)
            .with_action(FixAction::new("split_requirement", ActionMode::Assist));
        let plan = FixPlanner::new(policy_with(rule))
            .plan_fixes(&[violation(RuleId::E5, "SYS-1")], &records());

        assert_eq!(plan.change_sets.len(), 1);
        let cs = &plan.change_sets[0];
        assert!(cs.reversible);
        assert_eq!(cs.violations, vec!["E5".to_string()]);
        assert_eq!(cs.impacted, vec![id("SYS-1"), id("STK-1")]);
        let inverse = cs.changes[0].inverse.as_deref().unwrap();
        assert_eq!(inverse.target, vec![id("SYS-1-S1"), id("SYS-1-S2")]);
        assert_eq!(plan.estimated_impact.new_requirements, 2);
        assert_eq!(plan.estimated_impact.modified_requirements, 1);
    }

    #[test]
    fn rewrite_adds_subject_and_replaces_vague_terms() {
        let rule = FixRule::new("subject", "E3", 10).with_action(
            FixAction::new("rewrite_text", ActionMode::Auto).with_params(ActionParams {
                add_subject: true,
                replace_ambiguous: true,
                ..Default::default()
            }),
        );
        let planner = FixPlanner::new(policy_with(rule));
        let set = records();

        let plan = planner.plan_fixes(&[violation(RuleId::E3, "SYS-1")], &set);
        let change = &plan.change_sets[0].changes[0];
        match &change.operation {
            Operation::Rewrite { new_text, .. } => {
                assert_eq!(new_text, "The system shall send alerts by email and by SMS")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(change.is_reversible());

        let plan = planner.plan_fixes(&[violation(RuleId::E3, "SYS-2")], &set);
        match &plan.change_sets[0].changes[0].operation {
            Operation::Rewrite { new_text, .. } => {
                assert!(new_text.starts_with("The system shall send alerts according to"));
                assert!(new_text.contains("[list every item explicitly]"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unchanged_rewrite_yields_no_change_set() {
        let rule = FixRule::new("subject", "E3", 10).with_action(
            FixAction::new("rewrite_text", ActionMode::Auto).with_params(ActionParams {
                add_subject: true,
                ..Default::default()
            }),
        );
        let plan = FixPlanner::new(policy_with(rule))
            .plan_fixes(&[violation(RuleId::E3, "SYS-2")], &records());
        assert!(plan.is_empty());
        assert_eq!(plan.total_changes, 0);
    }

    #[test]
    fn failed_guard_contributes_nothing() {
        let rule = FixRule::new("split", "E5", 10)
            .with_guard(Guard {
                level: vec![RequirementType::SystemFunctional],
                ..Default::default()
            })
            .with_action(FixAction::new("split_requirement", ActionMode::Auto));
        let plan = FixPlanner::new(policy_with(rule))
            .plan_fixes(&[violation(RuleId::E5, "SYS-1")], &records());
        assert!(plan.is_empty());
    }

    #[test]
    fn missing_similarity_fails_the_guard() {
        let rule = FixRule::new("merge", "D1", 10)
            .with_guard(Guard {
                min_similarity: Some(0.85),
                ..Default::default()
            })
            .with_action(FixAction::new("merge_requirements", ActionMode::Assist));
        let planner = FixPlanner::new(policy_with(rule));
        let set = records();

        let bare = violation(RuleId::D1, "SYS-1").with_targets(vec![id("SYS-2")]);
        assert!(planner.plan_fixes(&[bare.clone()], &set).is_empty());

        let plan = planner.plan_fixes(&[bare.with_similarity(0.9)], &set);
        let cs = &plan.change_sets[0];
        assert!(!cs.reversible);
        assert_eq!(cs.changes[0].target, vec![id("SYS-1"), id("SYS-2")]);
        assert_eq!(plan.estimated_impact.removed_requirements, 1);
    }

    #[test]
    fn duplicate_pair_is_merged_once() {
        let rule = FixRule::new("merge", "D1", 10)
            .with_action(FixAction::new("merge_requirements", ActionMode::Assist));
        let found = [
            violation(RuleId::D1, "SYS-1")
                .with_targets(vec![id("SYS-2")])
                .with_similarity(0.9),
            violation(RuleId::D1, "SYS-2")
                .with_targets(vec![id("SYS-1")])
                .with_similarity(0.9),
        ];
        let plan = FixPlanner::new(policy_with(rule)).plan_fixes(&found, &records());
        assert_eq!(plan.change_sets.len(), 1);
        match &plan.change_sets[0].changes[0].operation {
            Operation::Merge { canonical_id, .. } => assert_eq!(canonical_id, &id("SYS-1")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn split_preview_shows_current_status() {
        let rule = FixRule::new("split", "E5", 10)
            .with_action(FixAction::new("split_requirement", ActionMode::Assist));
        let mut set = records();
        set.get_mut(&id("SYS-1")).unwrap().status = Status::Approved;
        let plan = FixPlanner::new(policy_with(rule)).plan_fixes(&[violation(RuleId::E5, "SYS-1")], &set);
        let status = &plan.change_sets[0].changes[0].preview[0];
        assert_eq!(status.before.as_deref(), Some("approved"));
        assert_eq!(status.after.as_deref(), Some("superseded"));
    }

    #[test]
    fn default_policy_leaves_stakeholder_wording_alone() {
        let plan = FixPlanner::new(FixPolicy::default())
            .plan_fixes(&[violation(RuleId::E3, "STK-1")], &records());
        assert!(plan.is_empty());
    }

    #[test]
    fn break_cycle_cuts_closing_edge() {
        let rule = FixRule::new("cycle", "B1", 10)
            .with_action(FixAction::new("break_cycle", ActionMode::Auto));
        let v = violation(RuleId::B1, "SYS-1").with_cycle(vec![id("SYS-1"), id("SYS-2")]);
        let plan = FixPlanner::new(policy_with(rule)).plan_fixes(&[v], &records());
        match &plan.change_sets[0].changes[0].operation {
            Operation::BreakCycle {
                cut_edge,
                cycle_edges,
            } => {
                assert_eq!(cut_edge, &EdgeRef::new("SYS-2", "SYS-1"));
                assert_eq!(cycle_edges.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!plan.change_sets[0].reversible);
    }

    #[test]
    fn break_cycle_without_path_is_skipped() {
        let rule = FixRule::new("cycle", "B1", 10)
            .with_action(FixAction::new("break_cycle", ActionMode::Auto));
        let plan = FixPlanner::new(policy_with(rule))
            .plan_fixes(&[violation(RuleId::B1, "SYS-1")], &records());
        assert!(plan.is_empty());
    }

    #[test]
    fn introduce_drafts_intermediate_once() {
        let rule = FixRule::new("gap", "C2", 10)
            .with_action(FixAction::new("introduce_intermediate", ActionMode::Assist));
        let planner = FixPlanner::new(policy_with(rule));
        let mut set = records();

        let plan = planner.plan_fixes(&[violation(RuleId::C2, "SYS-1")], &set);
        match &plan.change_sets[0].changes[0].operation {
            Operation::Introduce { draft, position } => {
                assert_eq!(draft.id, id("SYS-1-INT"));
                assert_eq!(draft.refines, vec![id("STK-1")]);
                assert_eq!(*position, Position::Above);
            }
            other => panic!("unexpected {:?}", other),
        }

        set.insert(
            id("SYS-1-INT"),
            Requirement::new("SYS-1-INT", RequirementType::System, "x", "x"),
        );
        assert!(planner.plan_fixes(&[violation(RuleId::C2, "SYS-1")], &set).is_empty());
    }

    #[test]
    fn unknown_action_is_skipped() {
        let rule = FixRule::new("odd", "E1", 10)
            .with_action(FixAction::new("summon_dragon", ActionMode::Auto));
        let plan = FixPlanner::new(policy_with(rule))
            .plan_fixes(&[violation(RuleId::E1, "SYS-2")], &records());
        assert!(plan.is_empty());
    }

    #[test]
    fn higher_priority_rules_plan_first() {
        let policy = FixPolicy::new("p", ExecutionMode::Strict)
            .with_rule(
                FixRule::new("low", "E5", 1)
                    .with_action(FixAction::new("split_requirement", ActionMode::Assist)),
            )
            .with_rule(
                FixRule::new("high", "E3", 9).with_action(
                    FixAction::new("rewrite_text", ActionMode::Auto).with_params(ActionParams {
                        add_subject: true,
                        ..Default::default()
                    }),
                ),
            );
        let plan = FixPlanner::new(policy).plan_fixes(
            &[violation(RuleId::E5, "SYS-1"), violation(RuleId::E3, "SYS-1")],
            &records(),
        );
        let rules: Vec<Option<&str>> = plan
            .change_sets
            .iter()
            .map(|cs| cs.metadata.rule_id.as_deref())
            .collect();
        assert_eq!(rules, vec![Some("high"), Some("low")]);
        assert_eq!(plan.total_changes, 2);
        assert!(plan.preview.contains("**Change sets**: 2"));
        assert_eq!(plan.estimated_impact.requirements_affected, 1);
    }
}
