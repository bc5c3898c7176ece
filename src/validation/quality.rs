//! Quality/style rules (E1-E7): purely local checks on a record's wording

use super::config::StyleConfig;
use super::metrics::{atomicity, sentence_count, token_count};
use super::RuleContext;
use crate::graph::{Requirement, RequirementType, RuleId, Violation};
use regex_lite::Regex;
use std::collections::BTreeMap;
use tracing::warn;

/// Regexes from the style configuration, compiled once per validation pass
#[derive(Debug, Default)]
pub struct StylePatterns {
    passive: Vec<Regex>,
    subjects: BTreeMap<RequirementType, Regex>,
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("(?i){}", pattern)) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "ignoring invalid style pattern");
            None
        }
    }
}

impl StylePatterns {
    pub fn compile(style: &StyleConfig) -> Self {
        let passive = style
            .passive_patterns
            .iter()
            .filter_map(|p| compile(p))
            .collect();
        let subjects = style
            .per_type
            .iter()
            .filter_map(|(t, s)| {
                let re = compile(s.subject_pattern.as_deref()?)?;
                Some((*t, re))
            })
            .collect();
        Self { passive, subjects }
    }
}

pub fn check(req: &Requirement, ctx: &RuleContext<'_>) -> Vec<Violation> {
    let mut out = Vec::new();
    let text = &req.description;
    let style = &ctx.config.style;
    let type_style = ctx.config.type_style(req.req_type);
    let lowered = text.to_lowercase();

    // E1: vague wording
    if let Some(sev) = ctx.severity(RuleId::E1) {
        let hits: Vec<&str> = style
            .vague_terms
            .iter()
            .filter(|term| lowered.contains(&term.to_lowercase()))
            .map(|t| t.as_str())
            .collect();
        if !hits.is_empty() {
            out.push(
                Violation::new(
                    RuleId::E1,
                    sev,
                    &req.id,
                    format!("Vague wording: {}", hits.join(", ")),
                )
                .with_suggested_fix("Replace vague terms with measurable criteria"),
            );
        }
    }

    // E2: passive voice hides the actor
    if let Some(sev) = ctx.severity(RuleId::E2) {
        if ctx.patterns.passive.iter().any(|re| re.is_match(text)) {
            out.push(
                Violation::new(RuleId::E2, sev, &req.id, "Passive voice hides the actor")
                    .with_suggested_fix("Name who or what performs the action"),
            );
        }
    }

    // E3: required subject for this layer
    if let Some(sev) = ctx.severity(RuleId::E3) {
        if let Some(re) = ctx.patterns.subjects.get(&req.req_type) {
            if !re.is_match(text) {
                out.push(
                    Violation::new(
                        RuleId::E3,
                        sev,
                        &req.id,
                        format!("{} requirement does not state its subject", req.req_type),
                    )
                    .with_details(format!("expected to match /{}/", re.as_str()))
                    .with_suggested_fix("Start with the actor, e.g. \"The system shall ...\""),
                );
            }
        }
    }

    // E4: length bounds
    if let (Some(sev), Some(ts)) = (ctx.severity(RuleId::E4), type_style) {
        let tokens = token_count(text);
        if let Some(min) = ts.min_tokens.filter(|min| tokens < *min) {
            out.push(
                Violation::new(
                    RuleId::E4,
                    sev,
                    &req.id,
                    format!("Description has {} words (minimum {})", tokens, min),
                )
                .with_id_suffix("short"),
            );
        }
        if let Some(max) = ts.max_tokens.filter(|max| tokens > *max) {
            out.push(
                Violation::new(
                    RuleId::E4,
                    sev,
                    &req.id,
                    format!("Description has {} words (maximum {})", tokens, max),
                )
                .with_id_suffix("long")
                .with_suggested_fix("Split the requirement"),
            );
        }
    }

    // E5: one concern per requirement
    if let Some(sev) = ctx.severity(RuleId::E5) {
        let score = atomicity(text);
        if score < style.min_atomicity {
            out.push(
                Violation::new(
                    RuleId::E5,
                    sev,
                    &req.id,
                    format!(
                        "Requirement bundles several concerns (atomicity {:.2} < {})",
                        score, style.min_atomicity
                    ),
                )
                .with_suggested_fix("Split into one requirement per concern"),
            );
        }
    }

    // E6: phrases that belong to another layer
    if let (Some(sev), Some(ts)) = (ctx.severity(RuleId::E6), type_style) {
        let hits: Vec<&str> = ts
            .forbidden_phrases
            .iter()
            .filter(|p| contains_phrase(&lowered, &p.to_lowercase()))
            .map(|p| p.as_str())
            .collect();
        if !hits.is_empty() {
            out.push(
                Violation::new(
                    RuleId::E6,
                    sev,
                    &req.id,
                    format!(
                        "Wording not suited to a {} requirement: {}",
                        req.req_type,
                        hits.join(", ")
                    ),
                ),
            );
        }
    }

    // E7: sentence complexity
    if let (Some(sev), Some(max)) = (
        ctx.severity(RuleId::E7),
        type_style.and_then(|ts| ts.max_sentences),
    ) {
        let sentences = sentence_count(text);
        if sentences > max {
            out.push(
                Violation::new(
                    RuleId::E7,
                    sev,
                    &req.id,
                    format!("Description has {} sentences (maximum {})", sentences, max),
                )
                .with_suggested_fix("Move detail into child requirements"),
            );
        }
    }

    out
}

/// Whole-word phrase match on already lowercased text
fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{BigramJaccard, ValidationConfig};

    fn rules(req: &Requirement) -> Vec<RuleId> {
        let config = ValidationConfig::default();
        let sim = BigramJaccard::new();
        let ctx = RuleContext::new(&config, None, &sim);
        check(req, &ctx).iter().map(|v| v.rule_id).collect()
    }

    fn system(description: &str) -> Requirement {
        Requirement::new("SYS-1", RequirementType::System, "Title", description)
    }

    #[test]
    fn clean_system_requirement_passes() {
        let found = rules(&system("The system shall send an alert email within five minutes."));
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn vague_terms_are_flagged() {
        assert!(rules(&system("The system shall respond appropriately to errors.")).contains(&RuleId::E1));
    }

    #[test]
    fn passive_voice_is_flagged() {
        assert!(rules(&system("The system shall ensure alerts are delivered quickly.")).contains(&RuleId::E2));
    }

    #[test]
    fn missing_subject_is_flagged() {
        assert!(rules(&system("Send an alert email within five minutes.")).contains(&RuleId::E3));
    }

    #[test]
    fn too_short_is_flagged() {
        assert!(rules(&system("The system shall")).contains(&RuleId::E4));
    }

    #[test]
    fn bundled_concerns_are_flagged() {
        assert!(rules(&system("The system shall send email and sms and push")).contains(&RuleId::E5));
    }

    #[test]
    fn implementation_words_in_stakeholder_need_are_flagged() {
        let req = Requirement::new(
            "STK-1",
            RequirementType::Stakeholder,
            "Records",
            "Clerks need records stored in a database for audits.",
        );
        assert!(rules(&req).contains(&RuleId::E6));
    }

    #[test]
    fn phrase_match_respects_word_boundaries() {
        assert!(contains_phrase("use the api today", "api"));
        assert!(!contains_phrase("rapid delivery", "api"));
    }

    #[test]
    fn too_many_sentences_are_flagged() {
        let req = Requirement::new(
            "FN-1",
            RequirementType::SystemFunctional,
            "Export",
            "The module shall export data. It runs nightly. It retries twice.",
        );
        assert!(rules(&req).contains(&RuleId::E7));
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let mut style = StyleConfig::default();
        style.passive_patterns = vec!["(unclosed".to_string()];
        let patterns = StylePatterns::compile(&style);
        assert!(patterns.passive.is_empty());
        assert_eq!(patterns.subjects.len(), 3);
    }
}
