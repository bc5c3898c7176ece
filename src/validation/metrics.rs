//! Derived text metrics: word counts, atomicity and subject detection

use crate::graph::{Requirement, RequirementSet, TextMetrics};
use regex_lite::Regex;
use std::sync::OnceLock;

/// Words that join separate concerns in one statement
const CONJUNCTIONS: &[&str] = &[
    "and",
    "or",
    "also",
    "additionally",
    "furthermore",
    "moreover",
    "plus",
];

fn subject_regex() -> Option<&'static Regex> {
    static SUBJECT: OnceLock<Option<Regex>> = OnceLock::new();
    SUBJECT
        .get_or_init(|| {
            Regex::new(
                r"(?i)^\s*((the|a|an)\s+)?[\w-]+(\s+[\w-]+)?\s+(shall|must|should|will|can|may)\b",
            )
            .ok()
        })
        .as_ref()
}

/// Lowercased words with surrounding punctuation stripped
pub fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn conjunction_count(text: &str) -> usize {
    words(text)
        .iter()
        .filter(|w| CONJUNCTIONS.contains(&w.as_str()))
        .count()
}

/// 1.0 for a single-concern statement, lower as conjunctions pile up
pub fn atomicity(text: &str) -> f64 {
    let tokens = token_count(text);
    if tokens == 0 {
        return 1.0;
    }
    let density = 2.0 * conjunction_count(text) as f64 / tokens as f64;
    1.0 - density.min(1.0)
}

/// Whether the text opens with "<actor> shall|must|should|..."
pub fn has_subject(text: &str) -> bool {
    subject_regex().is_some_and(|re| re.is_match(text))
}

pub fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?', '。'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

/// Compute metrics for a single record
pub fn analyze(req: &Requirement) -> TextMetrics {
    let mut all_text = req.full_text();
    if let Some(rationale) = &req.rationale {
        all_text.push(' ');
        all_text.push_str(rationale);
    }
    TextMetrics {
        length_tokens: token_count(&all_text),
        atomicity_score: atomicity(&req.description),
        has_subject: has_subject(&req.description),
        sentence_count: sentence_count(&req.description),
    }
}

/// Recompute the metrics of every record in place
pub fn refresh_derived_metrics(records: &mut RequirementSet) {
    for req in records.values_mut() {
        req.metrics = Some(analyze(req));
    }
}

/// Stored metrics if present, otherwise computed on the fly
pub fn metrics_of(req: &Requirement) -> TextMetrics {
    req.metrics.clone().unwrap_or_else(|| analyze(req))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RequirementType;

    #[test]
    fn single_concern_is_fully_atomic() {
        assert_eq!(atomicity("The system shall send an email"), 1.0);
    }

    #[test]
    fn conjunctions_lower_atomicity() {
        let score = atomicity("The system shall send email and sms and push");
        assert!(score < 0.7, "score was {}", score);
    }

    #[test]
    fn empty_text_is_atomic() {
        assert_eq!(atomicity(""), 1.0);
    }

    #[test]
    fn detects_modal_subject() {
        assert!(has_subject("The system shall log every request."));
        assert!(has_subject("Operators must approve refunds."));
        assert!(!has_subject("Log every request."));
    }

    #[test]
    fn counts_sentences() {
        assert_eq!(sentence_count("One. Two! Three?"), 3);
        assert_eq!(sentence_count("No terminator"), 1);
        assert_eq!(sentence_count(""), 0);
    }

    #[test]
    fn analyze_includes_title_and_rationale_in_token_count() {
        let mut req = Requirement::new(
            "SYS-1",
            RequirementType::System,
            "Mail",
            "The system shall send mail",
        );
        req.rationale = Some("Users expect it".to_string());
        let m = analyze(&req);
        assert_eq!(m.length_tokens, 1 + 5 + 3);
        assert!(m.has_subject);
        assert_eq!(m.sentence_count, 1);
    }

    #[test]
    fn refresh_fills_metrics_for_every_record() {
        let mut records = crate::graph::requirement_set(vec![
            Requirement::new("A", RequirementType::System, "a", "The system shall a"),
            Requirement::new("B", RequirementType::System, "b", "b and c"),
        ]);
        refresh_derived_metrics(&mut records);
        assert!(records.values().all(|r| r.metrics.is_some()));
    }
}
