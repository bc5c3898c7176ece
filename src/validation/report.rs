//! Markdown validation report

use crate::graph::{ReqId, RequirementSet, RuleDomain, Severity, ValidationResult};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Render results as a markdown report.
///
/// Failing records are listed worst score first.
pub fn render(results: &BTreeMap<ReqId, ValidationResult>, all: &RequirementSet) -> String {
    let total = results.len();
    let passed = results.values().filter(|r| r.passed).count();
    let average = if total == 0 {
        100.0
    } else {
        results.values().map(|r| r.score as f64).sum::<f64>() / total as f64
    };
    let pass_rate = if total == 0 {
        100.0
    } else {
        passed as f64 * 100.0 / total as f64
    };

    let mut by_severity: BTreeMap<Severity, usize> = BTreeMap::new();
    let mut by_domain: BTreeMap<RuleDomain, usize> = BTreeMap::new();
    for v in results.values().flat_map(|r| &r.violations) {
        *by_severity.entry(v.severity).or_default() += 1;
        *by_domain.entry(v.domain).or_default() += 1;
    }

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "# Requirement Validation Report\n");
    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- Requirements validated: {}", total);
    let _ = writeln!(out, "- Passed: {} ({:.1}%)", passed, pass_rate);
    let _ = writeln!(out, "- Failed: {}", total - passed);
    let _ = writeln!(out, "- Average score: {:.1}\n", average);

    let _ = writeln!(out, "## Violations by severity\n");
    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        let _ = writeln!(
            out,
            "- {}: {}",
            severity,
            by_severity.get(&severity).copied().unwrap_or(0)
        );
    }

    let _ = writeln!(out, "\n## Violations by domain\n");
    if by_domain.is_empty() {
        let _ = writeln!(out, "_none_");
    }
    for (domain, count) in &by_domain {
        let _ = writeln!(out, "- {}: {}", domain, count);
    }

    let mut failing: Vec<&ValidationResult> = results.values().filter(|r| !r.passed).collect();
    failing.sort_by(|a, b| a.score.cmp(&b.score).then(a.requirement_id.cmp(&b.requirement_id)));

    if !failing.is_empty() {
        let _ = writeln!(out, "\n## Requirements with violations\n");
    }
    for result in failing {
        let title = all
            .get(&result.requirement_id)
            .map(|r| r.title.as_str())
            .unwrap_or("");
        let _ = writeln!(
            out,
            "### {} {} (score {})\n",
            result.requirement_id, title, result.score
        );
        for v in &result.violations {
            let _ = writeln!(
                out,
                "- **[{}] {}** ({}): {}",
                v.severity, v.rule_id, v.domain, v.message
            );
            if let Some(details) = &v.details {
                let _ = writeln!(out, "  - details: {}", details);
            }
            if let Some(fix) = &v.suggested_fix {
                let _ = writeln!(out, "  - suggested fix: {}", fix);
            }
            if let Some(opinion) = &v.opinion {
                let _ = writeln!(out, "  - reviewer note: {}", opinion);
            }
        }
        let _ = writeln!(out);
    }
    out
}
