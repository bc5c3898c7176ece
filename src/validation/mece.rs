//! MECE rules (D1-D3): sibling groups should not overlap and should cover
//! their parent

use super::metrics::metrics_of;
use super::RuleContext;
use crate::graph::{
    children_of, siblings_of, Requirement, RequirementSet, RuleId, Severity, Violation,
};

pub fn check(req: &Requirement, all: &RequirementSet, ctx: &RuleContext<'_>) -> Vec<Violation> {
    let mut out = Vec::new();
    if let Some(sev) = ctx.severity(RuleId::D1) {
        out.extend(check_sibling_duplicates(req, all, ctx, sev));
    }
    let children = children_of(&req.id, all);
    if children.is_empty() {
        return out;
    }
    if let Some(sev) = ctx.severity(RuleId::D2) {
        out.extend(check_coverage(req, &children, ctx, sev));
    }
    if let Some(sev) = ctx.severity(RuleId::D3) {
        out.extend(check_granularity(req, &children, ctx, sev));
    }
    out
}

/// D1: near-duplicate siblings
fn check_sibling_duplicates(
    req: &Requirement,
    all: &RequirementSet,
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Vec<Violation> {
    let threshold = ctx.config.mece.similarity_threshold;
    let text = req.full_text();

    siblings_of(req, all)
        .into_iter()
        .filter_map(|sibling| {
            let score = ctx.similarity.similarity(&text, &sibling.full_text());
            if score < threshold {
                return None;
            }
            Some(
                Violation::new(
                    RuleId::D1,
                    sev,
                    &req.id,
                    format!(
                        "{} overlaps sibling {} (similarity {:.2})",
                        req.id, sibling.id, score
                    ),
                )
                .with_id_suffix(&sibling.id)
                .with_targets(vec![sibling.id.clone()])
                .with_similarity(score)
                .with_suggested_fix(format!("Merge {} into {} or reword one of them", sibling.id, req.id)),
            )
        })
        .collect()
}

/// D2: children together should cover the parent's wording
fn check_coverage(
    req: &Requirement,
    children: &[&Requirement],
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Option<Violation> {
    let combined: Vec<String> = children.iter().map(|c| c.full_text()).collect();
    let coverage = ctx
        .similarity
        .coverage(&req.full_text(), &combined.join(" "));
    let min = ctx.config.mece.min_coverage;
    if coverage >= min {
        return None;
    }
    Some(
        Violation::new(
            RuleId::D2,
            sev,
            &req.id,
            format!(
                "Children cover only {:.0}% of {}",
                coverage * 100.0,
                req.id
            ),
        )
        .with_details(format!("coverage {:.2} < {}", coverage, min))
        .with_targets(children.iter().map(|c| c.id.clone()).collect())
        .with_suggested_fix("Add children for the uncovered parts of the parent"),
    )
}

/// D3: too many children, or children too small to stand alone
fn check_granularity(
    req: &Requirement,
    children: &[&Requirement],
    ctx: &RuleContext<'_>,
    sev: Severity,
) -> Vec<Violation> {
    let mece = &ctx.config.mece;
    let mut out = Vec::new();

    if children.len() > mece.max_children {
        out.push(
            Violation::new(
                RuleId::D3,
                sev,
                &req.id,
                format!(
                    "{} is split into {} children (maximum {})",
                    req.id,
                    children.len(),
                    mece.max_children
                ),
            )
            .with_id_suffix("count")
            .with_suggested_fix("Group the children under intermediate requirements"),
        );
    }

    let short: Vec<_> = children
        .iter()
        .filter(|c| metrics_of(c).length_tokens < mece.min_tokens_per_child)
        .map(|c| c.id.clone())
        .collect();
    if !short.is_empty() {
        out.push(
            Violation::new(
                RuleId::D3,
                sev,
                &req.id,
                format!(
                    "{} children of {} are shorter than {} words",
                    short.len(),
                    req.id,
                    mece.min_tokens_per_child
                ),
            )
            .with_id_suffix("size")
            .with_targets(short)
            .with_suggested_fix("Merge fragmentary children or flesh them out"),
        );
    }
    out
}
