//! Storage backends for trellis
//!
//! Records and the change set log are persisted through the
//! `RequirementStore` trait. The primary implementation is `SqliteStore`.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{OpenStore, RequirementStore, StorageError, StorageResult};
