//! Core requirement graph data structures

mod relations;
mod requirement;
mod violation;

#[cfg(test)]
mod tests;

pub use relations::{
    children_of, find_cycle_from, find_cycles, has_incoming, has_outgoing, parents_of,
    refines_depth, siblings_of,
};
pub use requirement::{
    push_unique, requirement_set, Priority, RelationKind, ReqId, Requirement, RequirementSet,
    RequirementType, Status, TextMetrics,
};
pub use violation::{
    quality_score, RuleDomain, RuleId, Severity, ValidationResult, Violation,
};
