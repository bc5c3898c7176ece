//! External text opinion: an optional, non-authoritative second look at a
//! finding (typically a language model)
//!
//! The engine never depends on a reply: unavailability, errors and timeouts
//! all leave the original violation untouched.

use crate::graph::{Requirement, RequirementSet, Violation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the service thinks about one violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    /// 0.0-1.0: how sure the service is the finding is real
    pub confidence: f64,
    /// Free-text remark shown next to the finding
    #[serde(default)]
    pub comment: Option<String>,
    /// Replacement suggestion, if the service has a better one
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

impl Opinion {
    /// A new violation carrying this opinion; the input is not modified
    pub fn annotate(&self, violation: &Violation) -> Violation {
        let mut enriched = violation.clone();
        enriched.confidence = Some(self.confidence.clamp(0.0, 1.0));
        if let Some(comment) = &self.comment {
            enriched.opinion = Some(comment.clone());
        }
        if let Some(fix) = &self.suggested_fix {
            enriched.suggested_fix = Some(fix.clone());
        }
        enriched
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpinionError {
    #[error("opinion service not available: {0}")]
    Unavailable(String),
    #[error("opinion request failed: {0}")]
    RequestFailed(String),
    #[error("opinion response parse error: {0}")]
    ParseError(String),
}

/// Service that can weigh in on a violation.
#[async_trait]
pub trait TextOpinion: Send + Sync {
    /// Check if the service is reachable.
    async fn is_available(&self) -> bool;

    async fn evaluate(
        &self,
        requirement: &Requirement,
        violation: &Violation,
        context: &RequirementSet,
    ) -> Result<Opinion, OpinionError>;
}

/// Default collaborator: never available, never consulted
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpinion;

#[async_trait]
impl TextOpinion for NoOpinion {
    async fn is_available(&self) -> bool {
        false
    }

    async fn evaluate(
        &self,
        _requirement: &Requirement,
        _violation: &Violation,
        _context: &RequirementSet,
    ) -> Result<Opinion, OpinionError> {
        Err(OpinionError::Unavailable("no opinion service configured".to_string()))
    }
}

/// Canned opinions keyed by violation id, for tests and dry runs
#[derive(Default)]
pub struct MockOpinion {
    available: bool,
    delay: Option<std::time::Duration>,
    opinions: HashMap<String, Opinion>,
}

impl MockOpinion {
    pub fn available() -> Self {
        Self {
            available: true,
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_opinion(mut self, violation_id: impl Into<String>, opinion: Opinion) -> Self {
        self.opinions.insert(violation_id.into(), opinion);
        self
    }

    /// Sleep before answering, to exercise timeouts
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TextOpinion for MockOpinion {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn evaluate(
        &self,
        _requirement: &Requirement,
        violation: &Violation,
        _context: &RequirementSet,
    ) -> Result<Opinion, OpinionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.available {
            return Err(OpinionError::Unavailable(
                "mock opinion configured as unavailable".to_string(),
            ));
        }
        self.opinions
            .get(&violation.id)
            .cloned()
            .ok_or_else(|| OpinionError::RequestFailed(format!("no opinion for {}", violation.id)))
    }
}
