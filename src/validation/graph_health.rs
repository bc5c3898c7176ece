//! Graph health rules (B1-B5): cycles, fan-out, orphans, relation consistency

use super::RuleContext;
use crate::graph::{
    children_of, find_cycles, has_incoming, has_outgoing, RelationKind, Requirement,
    RequirementSet, RuleId, Severity, Violation,
};

/// Per-record graph health rules (B2-B5). B1 is graph-global, see [`check_global`].
pub fn check(req: &Requirement, all: &RequirementSet, ctx: &RuleContext<'_>) -> Vec<Violation> {
    let mut out = Vec::new();
    if let Some(sev) = ctx.severity(RuleId::B2) {
        out.extend(check_fan_out(req, all, ctx, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::B3) {
        out.extend(check_orphan(req, all, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::B4) {
        out.extend(check_conflict_symmetry(req, all, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::B5) {
        out.extend(check_duplicates(req, all, sev));
    }
    out
}

/// B1: cycles over `refines ∪ depends_on`, once per full pass.
///
/// Each distinct cycle is attributed to the first record on its path.
pub fn check_global(all: &RequirementSet, ctx: &RuleContext<'_>) -> Vec<Violation> {
    let Some(sev) = ctx.severity(RuleId::B1) else {
        return Vec::new();
    };

    find_cycles(&[RelationKind::Refines, RelationKind::DependsOn], all)
        .into_iter()
        .map(|cycle| {
            let path: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
            let details = format!("{} -> {}", path.join(" -> "), path[0]);
            let head = cycle[0].clone();
            Violation::new(
                RuleId::B1,
                sev,
                &head,
                format!("Dependency cycle through {} records", cycle.len()),
            )
            .with_id_suffix(cycle.last().map(|id| id.as_str()).unwrap_or_default())
            .with_details(details)
            .with_targets(cycle.clone())
            .with_cycle(cycle)
            .with_suggested_fix("Remove one refines or depends_on link on the cycle")
        })
        .collect()
}

/// B2: too many children under one parent
fn check_fan_out(
    req: &Requirement,
    all: &RequirementSet,
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Option<Violation> {
    let max = ctx.config.graph_health.max_children;
    let children = children_of(&req.id, all);
    if children.len() <= max {
        return None;
    }
    Some(
        Violation::new(
            RuleId::B2,
            sev,
            &req.id,
            format!("{} has {} children (maximum {})", req.id, children.len(), max),
        )
        .with_targets(children.iter().map(|c| c.id.clone()).collect())
        .with_suggested_fix("Group the children under intermediate requirements"),
    )
}

/// B3: a record with no relations in either direction
fn check_orphan(req: &Requirement, all: &RequirementSet, sev: Severity) -> Option<Violation> {
    if has_outgoing(req) || has_incoming(&req.id, all) {
        return None;
    }
    Some(
        Violation::new(
            RuleId::B3,
            sev,
            &req.id,
            format!("{} is not connected to any other requirement", req.id),
        )
        .with_suggested_fix("Link it to the requirement it refines or depends on"),
    )
}

/// B4: conflicts must be declared on both sides
fn check_conflict_symmetry(req: &Requirement, all: &RequirementSet, sev: Severity) -> Vec<Violation> {
    let mut out = Vec::new();
    for other_id in &req.conflicts_with {
        match all.get(other_id) {
            None => out.push(
                Violation::new(
                    RuleId::B4,
                    sev,
                    &req.id,
                    format!("Conflicting requirement {} does not exist", other_id),
                )
                .with_id_suffix(other_id)
                .with_targets(vec![other_id.clone()]),
            ),
            Some(other) if !other.conflicts_with.contains(&req.id) => out.push(
                Violation::new(
                    RuleId::B4,
                    sev,
                    &req.id,
                    format!(
                        "{} conflicts with {} but not the other way round",
                        req.id, other_id
                    ),
                )
                .with_id_suffix(other_id)
                .with_targets(vec![other_id.clone()])
                .with_suggested_fix(format!(
                    "Add {} to conflicts_with of {}",
                    req.id, other_id
                )),
            ),
            Some(_) => {}
        }
    }
    out
}

/// B5: duplicates must exist and share the record's type
fn check_duplicates(req: &Requirement, all: &RequirementSet, sev: Severity) -> Vec<Violation> {
    let mut out = Vec::new();
    for other_id in &req.duplicates {
        match all.get(other_id) {
            None => out.push(
                Violation::new(
                    RuleId::B5,
                    sev,
                    &req.id,
                    format!("Duplicate target {} does not exist", other_id),
                )
                .with_id_suffix(other_id)
                .with_targets(vec![other_id.clone()]),
            ),
            Some(other) if other.req_type != req.req_type => out.push(
                Violation::new(
                    RuleId::B5,
                    sev,
                    &req.id,
                    format!(
                        "{} ({}) duplicates {} of a different type ({})",
                        req.id, req.req_type, other_id, other.req_type
                    ),
                )
                .with_id_suffix(other_id)
                .with_targets(vec![other_id.clone()]),
            ),
            Some(_) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{requirement_set, ReqId, RequirementType};
    use crate::validation::{BigramJaccard, ValidationConfig};

    fn req(id: &str, t: RequirementType) -> Requirement {
        Requirement::new(id, t, id, format!("The system shall handle {}", id))
    }

    fn with_ctx<T>(f: impl FnOnce(&RuleContext<'_>) -> T) -> T {
        let config = ValidationConfig::default();
        let sim = BigramJaccard::new();
        f(&RuleContext::new(&config, None, &sim))
    }

    fn rules_for(all: &RequirementSet, id: &str) -> Vec<RuleId> {
        with_ctx(|ctx| check(&all[&ReqId::from(id)], all, ctx))
            .iter()
            .map(|v| v.rule_id)
            .collect()
    }

    // === Scenario: refines and depends_on close a loop ===
    #[test]
    fn mixed_relation_cycle_is_reported_with_path() {
        let all = requirement_set(vec![
            req("SR-1", RequirementType::Stakeholder),
            req("SYS-1", RequirementType::System)
                .refining("SR-1")
                .depending_on("SYS-X"),
            req("SYS-X", RequirementType::System).refining("SYS-1"),
            req("SYS-1B", RequirementType::System)
                .refining("SYS-X")
                .depending_on("SYS-1"),
        ]);
        let found = with_ctx(|ctx| check_global(&all, ctx));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule_id, RuleId::B1);
        assert_eq!(found[0].cycle, vec![ReqId::from("SYS-1"), ReqId::from("SYS-X")]);
        assert_eq!(found[0].requirement_id, ReqId::from("SYS-1"));
    }

    #[test]
    fn no_global_findings_for_a_tree() {
        let all = requirement_set(vec![
            req("SR-1", RequirementType::Stakeholder),
            req("SYS-1", RequirementType::System).refining("SR-1"),
        ]);
        assert!(with_ctx(|ctx| check_global(&all, ctx)).is_empty());
    }

    #[test]
    fn fan_out_over_maximum() {
        let mut records = vec![req("STK-1", RequirementType::Stakeholder)];
        for i in 0..11 {
            records.push(req(&format!("SYS-{}", i), RequirementType::System).refining("STK-1"));
        }
        let all = requirement_set(records);
        assert!(rules_for(&all, "STK-1").contains(&RuleId::B2));
    }

    #[test]
    fn orphan_detection_uses_all_relation_kinds() {
        let all = requirement_set(vec![
            req("A", RequirementType::System),
            req("B", RequirementType::System).duplicating("C"),
            req("C", RequirementType::System),
        ]);
        assert!(rules_for(&all, "A").contains(&RuleId::B3));
        assert!(!rules_for(&all, "B").contains(&RuleId::B3));
        assert!(!rules_for(&all, "C").contains(&RuleId::B3));
    }

    #[test]
    fn one_sided_conflict_is_flagged() {
        let all = requirement_set(vec![
            req("A", RequirementType::System).conflicting_with("B"),
            req("B", RequirementType::System),
            req("C", RequirementType::System).conflicting_with("Z"),
        ]);
        assert!(rules_for(&all, "A").contains(&RuleId::B4));
        assert!(rules_for(&all, "C").contains(&RuleId::B4));

        let symmetric = requirement_set(vec![
            req("A", RequirementType::System).conflicting_with("B"),
            req("B", RequirementType::System).conflicting_with("A"),
        ]);
        assert!(!rules_for(&symmetric, "A").contains(&RuleId::B4));
    }

    #[test]
    fn cross_type_duplicate_is_flagged() {
        let all = requirement_set(vec![
            req("A", RequirementType::System).duplicating("B"),
            req("B", RequirementType::Stakeholder),
        ]);
        assert!(rules_for(&all, "A").contains(&RuleId::B5));
    }
}
