//! Abstraction rules (C1-C3): consistency of abstraction scores across layers

use super::RuleContext;
use crate::graph::{
    parents_of, siblings_of, Requirement, RequirementSet, RuleId, Severity, Violation,
};

pub fn check(req: &Requirement, all: &RequirementSet, ctx: &RuleContext<'_>) -> Vec<Violation> {
    let mut out = Vec::new();
    if let Some(sev) = ctx.severity(RuleId::C1) {
        out.extend(check_sibling_variance(req, all, ctx, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::C2) {
        out.extend(check_parent_gap(req, all, ctx, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::C3) {
        out.extend(check_range(req, sev));
    }
    out
}

/// Population variance; `None` below two samples
fn variance(scores: &[f64]) -> Option<f64> {
    if scores.len() < 2 {
        return None;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    Some(scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n)
}

/// C1: siblings should sit at a similar level of abstraction
fn check_sibling_variance(
    req: &Requirement,
    all: &RequirementSet,
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Option<Violation> {
    let own = req.abstraction_score?;
    let siblings = siblings_of(req, all);
    let mut scores = vec![own];
    scores.extend(siblings.iter().filter_map(|s| s.abstraction_score));

    let var = variance(&scores)?;
    let max = ctx.config.abstraction.max_variance;
    if var <= max {
        return None;
    }
    Some(
        Violation::new(
            RuleId::C1,
            sev,
            &req.id,
            format!(
                "Abstraction varies too much among siblings (variance {:.3} > {})",
                var, max
            ),
        )
        .with_targets(
            siblings
                .iter()
                .filter(|s| s.abstraction_score.is_some())
                .map(|s| s.id.clone())
                .collect(),
        )
        .with_suggested_fix("Rewrite siblings to the same level of detail"),
    )
}

/// C2: a child must be sufficiently more concrete than each parent
fn check_parent_gap(
    req: &Requirement,
    all: &RequirementSet,
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Vec<Violation> {
    let Some(own) = req.abstraction_score else {
        return Vec::new();
    };
    let min = ctx.config.abstraction.min_difference;

    parents_of(req, all)
        .into_iter()
        .filter_map(|parent| {
            let parent_score = parent.abstraction_score?;
            let diff = parent_score - own;
            // Small epsilon so that 0.7 - 0.6 counts as a full 0.1 step
            if diff + 1e-9 >= min {
                return None;
            }
            Some(
                Violation::new(
                    RuleId::C2,
                    sev,
                    &req.id,
                    format!(
                        "{} is not more concrete than parent {} (difference {:.2} < {})",
                        req.id, parent.id, diff, min
                    ),
                )
                .with_id_suffix(&parent.id)
                .with_targets(vec![parent.id.clone()])
                .with_suggested_fix("Introduce an intermediate layer or make the child more specific"),
            )
        })
        .collect()
}

/// C3: scores live in [0.0, 1.0]
fn check_range(req: &Requirement, sev: Severity) -> Option<Violation> {
    let score = req.abstraction_score?;
    if (0.0..=1.0).contains(&score) {
        return None;
    }
    Some(Violation::new(
        RuleId::C3,
        sev,
        &req.id,
        format!("Abstraction score {} is outside [0.0, 1.0]", score),
    ))
}
