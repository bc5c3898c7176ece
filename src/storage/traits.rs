//! Storage trait definitions

use crate::fix::ChangeSet;
use crate::graph::{ReqId, Requirement, RequirementSet};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Change set not found: {0}")]
    ChangeSetNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for requirement storage backends
///
/// Implementations must be thread-safe (Send + Sync).
pub trait RequirementStore: Send + Sync {
    // === Requirement Operations ===

    /// Load every record, superseded ones included
    fn get_all(&self) -> StorageResult<RequirementSet>;

    /// Load one record by id
    fn get_one(&self, id: &ReqId) -> StorageResult<Option<Requirement>>;

    /// Insert or update one record
    fn upsert(&self, requirement: &Requirement) -> StorageResult<()>;

    /// Make the stored set equal to `records` in one transaction.
    /// Records absent from `records` are deleted.
    fn replace_all(&self, records: &RequirementSet) -> StorageResult<()>;

    // === Change Set Log ===

    /// Insert or update a change set (status transitions overwrite)
    fn save_change_set(&self, change_set: &ChangeSet) -> StorageResult<()>;

    fn load_change_set(&self, id: &str) -> StorageResult<Option<ChangeSet>>;

    /// Like `load_change_set`, but a missing id is an error
    fn require_change_set(&self, id: &str) -> StorageResult<ChangeSet> {
        self.load_change_set(id)?
            .ok_or_else(|| StorageError::ChangeSetNotFound(id.to_string()))
    }

    /// All logged change sets, oldest first
    fn list_change_sets(&self) -> StorageResult<Vec<ChangeSet>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: RequirementStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
