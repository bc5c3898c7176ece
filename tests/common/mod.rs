//! Shared builders for trellis integration tests
//!
//! Record constructors for each layer, the graph fixtures the scenarios
//! reuse, and helpers for comparing record sets across a fix and its
//! rollback.

#![allow(dead_code)]

use trellis::graph::requirement_set;
use trellis::{
    ReqId, Requirement, RequirementSet, RequirementType, RuleId, ValidationEngine, Violation,
};

pub fn id(s: &str) -> ReqId {
    ReqId::from(s)
}

pub fn stakeholder(id: &str, description: &str) -> Requirement {
    Requirement::new(id, RequirementType::Stakeholder, id, description)
}

pub fn system(id: &str, description: &str) -> Requirement {
    Requirement::new(id, RequirementType::System, id, description)
}

pub fn functional(id: &str, description: &str) -> Requirement {
    Requirement::new(id, RequirementType::SystemFunctional, id, description)
}

/// SR-1 <- SYS-1 -> SYS-X -> SYS-1, with SYS-1B hanging off both
///
/// `SYS-1 depends_on SYS-X` and `SYS-X refines SYS-1` close a cycle.
/// `SYS-1B` refines `SYS-X` and depends on `SYS-1` without adding another.
pub fn cycle_graph() -> RequirementSet {
    requirement_set(vec![
        stakeholder("SR-1", "Operators need alerts about failed payment runs."),
        system(
            "SYS-1",
            "The system shall notify operators about failed payment runs.",
        )
        .refining("SR-1")
        .depending_on("SYS-X"),
        system(
            "SYS-X",
            "The system shall keep a log of every payment run outcome.",
        )
        .refining("SYS-1"),
        system(
            "SYS-1B",
            "The system shall retry failed payment runs once per hour.",
        )
        .refining("SYS-X")
        .depending_on("SYS-1"),
    ])
}

/// A stakeholder need with one system requirement under it
pub fn alert_chain(system_description: &str) -> RequirementSet {
    requirement_set(vec![
        stakeholder("STK-1", "Operators need timely alerts about failed payment runs."),
        system("SYS-1", system_description).refining("STK-1"),
    ])
}

pub fn rule_ids(violations: &[Violation]) -> Vec<RuleId> {
    violations.iter().map(|v| v.rule_id).collect()
}

pub fn count(violations: &[Violation], rule: RuleId) -> usize {
    violations.iter().filter(|v| v.rule_id == rule).count()
}

/// Synchronous revalidation, the shape `run_fix_loop` expects
pub fn revalidate(
    engine: &ValidationEngine,
) -> impl FnMut(&RequirementSet) -> Result<Vec<Violation>, std::convert::Infallible> + '_ {
    move |records| Ok(engine.violations(records))
}

/// Record sets with `updated_at` cleared, for comparisons across mutations
pub fn without_timestamps(records: &RequirementSet) -> RequirementSet {
    records
        .iter()
        .map(|(id, r)| {
            let mut r = r.clone();
            r.updated_at = None;
            (id.clone(), r)
        })
        .collect()
}
