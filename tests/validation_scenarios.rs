//! Validation scenarios over whole graphs: cycles, level skips, sibling
//! duplicates, and the planner's guard behaviour on real findings.

mod common;

use common::{alert_chain, count, cycle_graph, functional, id, rule_ids, stakeholder, system};
use trellis::fix::{FixAction, FixRule, Guard};
use trellis::graph::{requirement_set, Status};
use trellis::validation::{BigramJaccard, Similarity};
use trellis::{
    ExecutionMode, FixPlanner, FixPolicy, Ontology, RuleId, ValidateOptions, ValidationConfig,
    ValidationEngine,
};

#[test]
fn cycle_is_reported_until_its_edge_is_removed() {
    let engine = ValidationEngine::default();
    let mut records = cycle_graph();

    let found = engine.violations(&records);
    assert!(count(&found, RuleId::B1) >= 1);
    let b1 = found.iter().find(|v| v.rule_id == RuleId::B1).unwrap();
    assert!(b1.cycle.contains(&id("SYS-1")));
    assert!(b1.cycle.contains(&id("SYS-X")));
    assert!(!b1.cycle.contains(&id("SR-1")));

    records.get_mut(&id("SYS-1")).unwrap().depends_on.clear();
    assert_eq!(count(&engine.violations(&records), RuleId::B1), 0);
}

#[tokio::test]
async fn cycle_is_reported_once_per_pass() {
    let engine = ValidationEngine::default();
    let results = engine
        .validate_all(&cycle_graph(), ValidateOptions::default())
        .await;
    let b1: usize = results
        .values()
        .map(|r| count(&r.violations, RuleId::B1))
        .sum();
    assert_eq!(b1, 1);
}

#[tokio::test]
async fn superseded_records_are_not_validation_targets() {
    let engine = ValidationEngine::default();
    let records = requirement_set(vec![
        stakeholder("STK-1", "Operators need timely alerts about failed payment runs."),
        system("A-OLD", "The system shall page operators about failed payment runs.")
            .refining("SYS-B")
            .with_status(Status::Superseded),
        system("SYS-B", "The system shall notify operators about failed payment runs.")
            .refining("STK-1")
            .depending_on("A-OLD"),
    ]);
    let results = engine
        .validate_all(&records, ValidateOptions::default())
        .await;
    assert!(!results.contains_key(&id("A-OLD")));
    let b1: usize = results
        .values()
        .map(|r| count(&r.violations, RuleId::B1))
        .sum();
    assert_eq!(b1, 0);
}

#[test]
fn level_skip_clears_after_rewiring_through_system_layer() {
    let engine = ValidationEngine::default();
    let mut records = requirement_set(vec![
        stakeholder("STK-1", "Operators need timely alerts about failed payment runs."),
        functional(
            "FN-1",
            "The system shall email operators when a payment run fails.",
        )
        .refining("STK-1"),
    ]);
    let skip = |found: &[trellis::Violation]| {
        found
            .iter()
            .filter(|v| v.rule_id == RuleId::A1 && v.requirement_id == id("FN-1"))
            .count()
    };
    assert_eq!(skip(&engine.violations(&records)), 1);

    records.insert(
        id("SYS-1"),
        system(
            "SYS-1",
            "The system shall notify operators about failed payment runs.",
        )
        .refining("STK-1"),
    );
    records.get_mut(&id("FN-1")).unwrap().refines = vec![id("SYS-1")];
    assert_eq!(skip(&engine.violations(&records)), 0);
}

#[test]
fn ontology_drives_allowed_layers() {
    let ontology = Ontology::from_yaml_str(include_str!("../config/ontology.yaml")).unwrap();
    let engine = ValidationEngine::default().with_ontology(ontology);
    let records = requirement_set(vec![
        stakeholder("STK-1", "Operators need timely alerts about failed payment runs."),
        functional(
            "FN-1",
            "The system shall email operators when a payment run fails.",
        )
        .refining("STK-1"),
    ]);
    assert!(rule_ids(&engine.violations(&records)).contains(&RuleId::A1));
}

#[test]
fn similarity_is_symmetric_and_bounded() {
    let sim = BigramJaccard::new();
    let pairs = [
        (
            "shall send email and sms in 5 minutes",
            "shall log events and store logs",
        ),
        (
            "The system shall send email and SMS in 5 minutes.",
            "The system shall send email and sms in 5 minutes",
        ),
        ("", "shall log events"),
    ];
    for (a, b) in pairs {
        let forward = sim.similarity(a, b);
        assert_eq!(forward, sim.similarity(b, a));
        assert!((0.0..=1.0).contains(&forward));
        // Same input, same score
        assert_eq!(forward, sim.similarity(a, b));
    }
    assert!(sim.similarity(pairs[0].0, pairs[0].1) < 0.8);
    assert!(sim.similarity(pairs[1].0, pairs[1].1) >= 0.8);
}

#[test]
fn near_identical_siblings_are_flagged_dissimilar_are_not() {
    let engine = ValidationEngine::default();
    let near = requirement_set(vec![
        stakeholder("STK-1", "Operators need timely alerts about failed payment runs."),
        system("SYS-1", "The system shall send email and SMS in 5 minutes.").refining("STK-1"),
        system("SYS-2", "The system shall send email and sms in 5 minutes").refining("STK-1"),
    ]);
    let found = engine.violations(&near);
    let d1: Vec<_> = found.iter().filter(|v| v.rule_id == RuleId::D1).collect();
    // Reported from both sides, with the same score
    assert_eq!(d1.len(), 2);
    assert_eq!(d1[0].similarity, d1[1].similarity);

    let distinct = requirement_set(vec![
        stakeholder("STK-1", "Operators need timely alerts about failed payment runs."),
        system("SYS-1", "The system shall send email and sms in 5 minutes.").refining("STK-1"),
        system("SYS-2", "The system shall log events and store logs.").refining("STK-1"),
    ]);
    assert_eq!(count(&engine.violations(&distinct), RuleId::D1), 0);
}

#[test]
fn raised_threshold_silences_duplicates() {
    let mut config = ValidationConfig::default();
    config.mece.similarity_threshold = 0.95;
    let engine = ValidationEngine::new(config);
    let records = requirement_set(vec![
        stakeholder("STK-1", "Operators need timely alerts about failed payment runs."),
        system("SYS-1", "The system shall send email and SMS in 5 minutes.").refining("STK-1"),
        system("SYS-2", "The system shall send email and sms in 5 minutes").refining("STK-1"),
    ]);
    assert_eq!(count(&engine.violations(&records), RuleId::D1), 0);
}

#[test]
fn failing_guard_contributes_no_change_set() {
    let engine = ValidationEngine::default();
    let records = alert_chain("Export payment reports as needed.");
    let found = engine.violations(&records);
    assert_eq!(count(&found, RuleId::E1), 1);

    // Guarded to functional records only; SYS-1 is a system record
    let guard = Guard {
        level: vec![trellis::RequirementType::SystemFunctional],
        ..Guard::default()
    };
    let policy = FixPolicy::new("guarded", ExecutionMode::Strict).with_rule(
        FixRule::new("vague", "E1", 10)
            .with_guard(guard)
            .with_action(FixAction::new("rewrite_text", trellis::fix::ActionMode::Auto)),
    );
    let plan = FixPlanner::new(policy).plan_fixes(&found, &records);
    assert!(plan.is_empty());
    assert_eq!(plan.total_changes, 0);
}

#[test]
fn planned_change_sets_are_never_empty() {
    let engine = ValidationEngine::default();
    let mut records = cycle_graph();
    records.insert(
        id("SYS-9"),
        system("SYS-9", "Export payment reports as needed.").refining("SR-1"),
    );
    let found = engine.violations(&records);

    let plan = FixPlanner::new(FixPolicy::default()).plan_fixes(&found, &records);
    assert!(!plan.is_empty());
    assert!(plan.change_sets.iter().all(|cs| !cs.changes.is_empty()));
    assert_eq!(
        plan.total_changes,
        plan.change_sets.iter().map(|cs| cs.changes.len()).sum::<usize>()
    );
    assert!(plan.preview.starts_with("# Fix plan"));
}

#[tokio::test]
async fn report_lists_failing_records() {
    let engine = ValidationEngine::default();
    let records = cycle_graph();
    let results = engine
        .validate_all(&records, ValidateOptions::default().with_refreshed_metrics())
        .await;
    let report = engine.generate_report(&results, &records);
    assert!(report.contains("SYS-1"));
    assert!(report.contains("B1"));
}
