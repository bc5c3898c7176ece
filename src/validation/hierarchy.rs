//! Hierarchy rules (A1-A5): layer legality of `refines` edges

use super::config::TypePair;
use super::RuleContext;
use crate::graph::{
    children_of, find_cycle_from, refines_depth, RelationKind, Requirement, RequirementSet,
    RequirementType, RuleId, Severity, Violation,
};

/// Run every enabled hierarchy rule against one record
pub fn check(req: &Requirement, all: &RequirementSet, ctx: &RuleContext<'_>) -> Vec<Violation> {
    let mut out = Vec::new();
    if let Some(sev) = ctx.severity(RuleId::A1) {
        out.extend(check_allowed_pairs(req, all, ctx, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::A2) {
        out.extend(check_requires_parent(req, ctx, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::A3) {
        out.extend(check_refines_cycle(req, all, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::A4) {
        out.extend(check_depth(req, all, ctx, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::A5) {
        out.extend(check_requires_children(req, all, ctx, sev));
    }
    out
}

fn allowed_pairs(ctx: &RuleContext<'_>) -> Vec<TypePair> {
    match ctx.ontology {
        Some(ontology) => ontology.allowed_pairs(),
        None => ctx.config.hierarchy.allowed_pairs.clone(),
    }
}

/// A1: every refines edge must connect an allowed (parent, child) pair
fn check_allowed_pairs(
    req: &Requirement,
    all: &RequirementSet,
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Vec<Violation> {
    let pairs = allowed_pairs(ctx);
    let mut out = Vec::new();

    for parent_id in &req.refines {
        let Some(parent) = all.get(parent_id) else {
            out.push(
                Violation::new(
                    RuleId::A1,
                    sev,
                    &req.id,
                    format!("Parent requirement {} does not exist", parent_id),
                )
                .with_id_suffix(parent_id)
                .with_targets(vec![parent_id.clone()])
                .with_suggested_fix("Remove the dangling refines entry or create the parent"),
            );
            continue;
        };

        let pair = TypePair {
            parent: parent.req_type,
            child: req.req_type,
        };
        if pairs.contains(&pair) {
            continue;
        }

        let expected: Vec<&str> = pairs
            .iter()
            .filter(|p| p.child == req.req_type)
            .map(|p| p.parent.as_str())
            .collect();
        let fix = if expected.is_empty() {
            format!("A {} requirement should not refine anything", req.req_type)
        } else {
            format!(
                "Refine a requirement of type {} instead",
                expected.join(" or ")
            )
        };

        out.push(
            Violation::new(
                RuleId::A1,
                sev,
                &req.id,
                format!(
                    "{} ({}) may not refine {} ({})",
                    req.id, req.req_type, parent.id, parent.req_type
                ),
            )
            .with_id_suffix(parent_id)
            .with_targets(vec![parent_id.clone()])
            .with_details(format!("allowed parent types for {}: {:?}", req.req_type, expected))
            .with_suggested_fix(fix),
        );
    }
    out
}

/// A2: some layers must refine at least one parent
fn check_requires_parent(req: &Requirement, ctx: &RuleContext<'_>, sev: Severity) -> Option<Violation> {
    if !ctx.config.hierarchy.require_parent.contains(&req.req_type) || !req.refines.is_empty() {
        return None;
    }
    Some(
        Violation::new(
            RuleId::A2,
            sev,
            &req.id,
            format!("{} requirement {} has no parent", req.req_type, req.id),
        )
        .with_suggested_fix("Add a refines link to the requirement this one elaborates"),
    )
}

/// A3: no cycle may be reachable over refines
fn check_refines_cycle(req: &Requirement, all: &RequirementSet, sev: Severity) -> Option<Violation> {
    let cycle = find_cycle_from(&req.id, &[RelationKind::Refines], all)?;
    let path: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
    Some(
        Violation::new(
            RuleId::A3,
            sev,
            &req.id,
            format!("Refinement cycle reachable from {}", req.id),
        )
        .with_details(format!("{} -> {}", path.join(" -> "), path[0]))
        .with_targets(cycle.clone())
        .with_cycle(cycle)
        .with_suggested_fix("Remove one refines link on the cycle"),
    )
}

/// A4: refinement chains may not exceed the configured depth
fn check_depth(
    req: &Requirement,
    all: &RequirementSet,
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Option<Violation> {
    let max = ctx.config.hierarchy.max_depth;
    let depth = refines_depth(&req.id, all);
    if depth <= max {
        return None;
    }
    Some(
        Violation::new(
            RuleId::A4,
            sev,
            &req.id,
            format!("Refinement depth {} exceeds the maximum of {}", depth, max),
        )
        .with_suggested_fix("Flatten the hierarchy or merge intermediate layers"),
    )
}

/// A5: parent layers must have at least one child
fn check_requires_children(
    req: &Requirement,
    all: &RequirementSet,
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Option<Violation> {
    let expected: Vec<RequirementType> = match ctx.ontology {
        Some(ontology) => ontology.required_children(req.req_type)?.to_vec(),
        None if ctx.config.hierarchy.require_child.contains(&req.req_type) => Vec::new(),
        None => return None,
    };
    if !children_of(&req.id, all).is_empty() {
        return None;
    }

    let mut violation = Violation::new(
        RuleId::A5,
        sev,
        &req.id,
        format!("{} requirement {} has no children", req.req_type, req.id),
    );
    if !expected.is_empty() {
        let names: Vec<&str> = expected.iter().map(|t| t.as_str()).collect();
        violation = violation
            .with_details(format!("expected child types: {}", names.join(", ")))
            .with_suggested_fix(format!(
                "Add a {} requirement that refines {}",
                names.join(" or "),
                req.id
            ));
    } else {
        violation = violation.with_suggested_fix("Add a requirement that refines this one");
    }
    Some(violation)
}
