//! Text similarity strategies used by the MECE rules
//!
//! The rules only see the `Similarity` trait, so a stronger metric can be
//! dropped in without touching rule logic.

use std::collections::HashSet;

/// A symmetric text similarity measure in [0.0, 1.0]
pub trait Similarity: Send + Sync {
    /// Must satisfy `similarity(a, b) == similarity(b, a)`
    fn similarity(&self, a: &str, b: &str) -> f64;

    /// Share of `parent`'s features that appear in `children`.
    /// An empty parent is fully covered.
    fn coverage(&self, parent: &str, children: &str) -> f64;
}

const ENGLISH_PARTICLES: &[&str] = &[
    "a", "an", "the", "of", "to", "in", "on", "at", "by", "for", "with", "is", "are", "be",
];

const JAPANESE_PARTICLES: &[&str] = &[
    "から", "まで", "より", "は", "が", "を", "に", "で", "と", "の", "も", "へ", "や",
];

/// Jaccard index over character bigrams
#[derive(Debug, Clone, Default)]
pub struct BigramJaccard;

impl BigramJaccard {
    pub fn new() -> Self {
        Self
    }

    /// Lowercase, strip punctuation and particles, collapse whitespace
    pub fn normalize(text: &str) -> String {
        let mut cleaned: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        for particle in JAPANESE_PARTICLES {
            cleaned = cleaned.replace(particle, " ");
        }
        cleaned
            .split_whitespace()
            .filter(|w| !ENGLISH_PARTICLES.contains(w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn bigrams(text: &str) -> HashSet<(char, char)> {
        let chars: Vec<char> = Self::normalize(text).chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    }
}

impl Similarity for BigramJaccard {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let left = Self::bigrams(a);
        let right = Self::bigrams(b);
        let union = left.union(&right).count();
        if union == 0 {
            return 0.0;
        }
        left.intersection(&right).count() as f64 / union as f64
    }

    fn coverage(&self, parent: &str, children: &str) -> f64 {
        let parent = Self::bigrams(parent);
        if parent.is_empty() {
            return 1.0;
        }
        let children = Self::bigrams(children);
        parent.iter().filter(|b| children.contains(*b)).count() as f64 / parent.len() as f64
    }
}
