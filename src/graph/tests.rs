//! Serialization fixtures and relation query tests

use super::*;
use serde_json::{json, Value};

/// Record fixture as it appears in a stored requirements file
fn stored_requirement_fixture() -> Value {
    json!({
        "id": "SYS-001",
        "title": "Notification delivery",
        "description": "The system shall send a notification within 5 minutes.",
        "type": "system",
        "status": "approved",
        "priority": "high",
        "category": "notifications",
        "refines": ["STK-001"],
        "abstraction_score": 0.6,
        "created_at": "2025-11-30T10:00:00Z"
    })
}

fn req(id: &str, t: RequirementType) -> Requirement {
    Requirement::new(id, t, id, format!("The system shall do {}", id))
}

#[test]
fn test_requirement_deserializes_from_stored_fixture() {
    let parsed: Requirement = serde_json::from_value(stored_requirement_fixture()).unwrap();

    assert_eq!(parsed.id.as_str(), "SYS-001");
    assert_eq!(parsed.req_type, RequirementType::System);
    assert_eq!(parsed.status, Status::Approved);
    assert_eq!(parsed.priority, Priority::High);
    assert_eq!(parsed.refines, vec![ReqId::from("STK-001")]);
    assert_eq!(parsed.abstraction_score, Some(0.6));
    assert!(parsed.depends_on.is_empty());
    assert!(parsed.metrics.is_none());
}

#[test]
fn test_functional_alias_is_accepted() {
    let mut fixture = stored_requirement_fixture();
    fixture["type"] = json!("functional");
    let parsed: Requirement = serde_json::from_value(fixture).unwrap();
    assert_eq!(parsed.req_type, RequirementType::SystemFunctional);
}

#[test]
fn test_empty_relations_are_omitted_when_serialized() {
    let r = req("SYS-1", RequirementType::System);
    let value = serde_json::to_value(&r).unwrap();
    assert!(value.get("refines").is_none());
    assert!(value.get("canonical_of").is_none());
    assert_eq!(value["type"], "system");
    assert_eq!(value["status"], "draft");
}

#[test]
fn test_rule_id_serializes_as_code() {
    let v = Violation::new(RuleId::B1, Severity::Error, &ReqId::from("SYS-1"), "cycle");
    let value = serde_json::to_value(&v).unwrap();
    assert_eq!(value["rule_id"], "B1");
    assert_eq!(value["domain"], "graph_health");
    assert_eq!(value["id"], "B1-SYS-1");
}

#[test]
fn test_quality_score_weights() {
    let id = ReqId::from("X");
    let violations = vec![
        Violation::new(RuleId::A1, Severity::Error, &id, "a"),
        Violation::new(RuleId::B2, Severity::Warning, &id, "b"),
        Violation::new(RuleId::D2, Severity::Info, &id, "c"),
    ];
    assert_eq!(quality_score(&violations), 65);
    assert_eq!(quality_score(&[]), 100);

    let many: Vec<Violation> = (0..6)
        .map(|i| Violation::new(RuleId::A1, Severity::Error, &id, "x").with_id_suffix(i))
        .collect();
    assert_eq!(quality_score(&many), 0);
}

#[test]
fn test_validation_result_scores_on_construction() {
    let id = ReqId::from("X");
    let clean = ValidationResult::new(id.clone(), vec![]);
    assert!(clean.passed);
    assert_eq!(clean.score, 100);

    let result = ValidationResult::new(
        id.clone(),
        vec![Violation::new(RuleId::B1, Severity::Error, &id, "cycle")],
    );
    assert!(!result.passed);
    assert_eq!(result.score, 80);
    assert_eq!(result.count(Severity::Error), 1);
}

#[test]
fn test_severity_ordering() {
    assert!(Severity::Info < Severity::Warning);
    assert!(Severity::Warning < Severity::Error);
}

// === Relation queries ===

#[test]
fn test_children_and_siblings_skip_superseded() {
    let all = requirement_set(vec![
        req("STK-1", RequirementType::Stakeholder),
        req("SYS-1", RequirementType::System).refining("STK-1"),
        req("SYS-2", RequirementType::System).refining("STK-1"),
        req("SYS-3", RequirementType::System)
            .refining("STK-1")
            .with_status(Status::Superseded),
    ]);

    let children: Vec<&str> = children_of(&ReqId::from("STK-1"), &all)
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(children, vec!["SYS-1", "SYS-2"]);

    let siblings: Vec<&str> = siblings_of(&all[&ReqId::from("SYS-1")], &all)
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(siblings, vec!["SYS-2"]);
}

#[test]
fn test_find_cycle_from_returns_ordered_path() {
    let all = requirement_set(vec![
        req("A", RequirementType::System).refining("B"),
        req("B", RequirementType::System).refining("C"),
        req("C", RequirementType::System).refining("A"),
    ]);
    let cycle = find_cycle_from(&ReqId::from("A"), &[RelationKind::Refines], &all).unwrap();
    let ids: Vec<&str> = cycle.iter().map(|r| r.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
}

#[test]
fn test_find_cycles_reports_each_cycle_once() {
    let all = requirement_set(vec![
        req("A", RequirementType::System).refining("B"),
        req("B", RequirementType::System).refining("A"),
        req("C", RequirementType::System).refining("A"),
    ]);
    let cycles = find_cycles(&[RelationKind::Refines, RelationKind::DependsOn], &all);
    assert_eq!(cycles.len(), 1);
}

#[test]
fn test_find_cycles_skips_superseded_records() {
    let all = requirement_set(vec![
        req("A-OLD", RequirementType::System)
            .refining("SYS-B")
            .with_status(Status::Superseded),
        req("SYS-B", RequirementType::System).depending_on("A-OLD"),
    ]);
    assert!(find_cycles(&[RelationKind::Refines, RelationKind::DependsOn], &all).is_empty());
}

#[test]
fn test_acyclic_graph_has_no_cycles() {
    let all = requirement_set(vec![
        req("STK-1", RequirementType::Stakeholder),
        req("SYS-1", RequirementType::System).refining("STK-1"),
        req("FN-1", RequirementType::SystemFunctional)
            .refining("SYS-1")
            .depending_on("STK-1"),
    ]);
    assert!(find_cycles(&[RelationKind::Refines, RelationKind::DependsOn], &all).is_empty());
    assert!(find_cycle_from(&ReqId::from("FN-1"), &[RelationKind::Refines], &all).is_none());
}

#[test]
fn test_refines_depth_counts_root_as_one() {
    let all = requirement_set(vec![
        req("STK-1", RequirementType::Stakeholder),
        req("SYS-1", RequirementType::System).refining("STK-1"),
        req("FN-1", RequirementType::SystemFunctional).refining("SYS-1"),
    ]);
    assert_eq!(refines_depth(&ReqId::from("STK-1"), &all), 1);
    assert_eq!(refines_depth(&ReqId::from("FN-1"), &all), 3);
}

#[test]
fn test_refines_depth_terminates_on_cycle() {
    let all = requirement_set(vec![
        req("A", RequirementType::System).refining("B"),
        req("B", RequirementType::System).refining("A"),
    ]);
    assert_eq!(refines_depth(&ReqId::from("A"), &all), 2);
}

#[test]
fn test_incoming_and_outgoing() {
    let all = requirement_set(vec![
        req("A", RequirementType::System).conflicting_with("B"),
        req("B", RequirementType::System),
        req("C", RequirementType::System),
    ]);
    assert!(has_incoming(&ReqId::from("B"), &all));
    assert!(has_outgoing(&all[&ReqId::from("A")]));
    assert!(!has_incoming(&ReqId::from("C"), &all));
    assert!(!has_outgoing(&all[&ReqId::from("C")]));
}
