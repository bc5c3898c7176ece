//! Trellis: Requirement Graph Validation and Fix Engine
//!
//! Checks a graph of requirement records against structural and semantic
//! rules, then repairs what it finds through policy-driven, transactional
//! and (where possible) reversible change sets.
//!
//! # Core Concepts
//!
//! - **Requirements**: records linked by `refines`, `depends_on`,
//!   `conflicts_with` and `duplicates`
//! - **Violations**: findings of the validation rules (A1-E7), pure data
//! - **Change sets**: ordered groups of changes applied all-or-nothing
//! - **Fix policy**: prioritized rules mapping violation codes to fix actions
//!
//! # Example
//!
//! ```
//! use trellis::{FixExecutor, FixPolicy, Requirement, RequirementType, ValidationEngine};
//! use trellis::graph::requirement_set;
//!
//! let records = requirement_set(vec![Requirement::new(
//!     "SYS-1",
//!     RequirementType::System,
//!     "Export",
//!     "Export reports as CSV",
//! )]);
//! let engine = ValidationEngine::default();
//! let executor = FixExecutor::new(FixPolicy::default());
//! let result = executor.run_fix_loop(&records, |r| {
//!     Ok::<_, std::convert::Infallible>(engine.violations(r))
//! });
//! assert!(result.iterations <= FixPolicy::default().stopping.max_iterations);
//! ```

pub mod config;
pub mod fix;
pub mod graph;
pub mod storage;
pub mod validation;

pub use config::{ConfigError, ConfigResult};
pub use fix::{
    Change, ChangeEngine, ChangeError, ChangeOutcome, ChangeSet, ChangeSetStatus, ExecutionMode,
    FixExecutor, FixPlan, FixPlanner, FixPolicy, FixResult, Operation, OperationKind, StopReason,
};
pub use graph::{
    ReqId, Requirement, RequirementSet, RequirementType, RuleDomain, RuleId, Severity, Status,
    ValidationResult, Violation,
};
pub use storage::{OpenStore, RequirementStore, SqliteStore, StorageError, StorageResult};
pub use validation::{
    NoOpinion, Ontology, TextOpinion, ValidateOptions, ValidationCache, ValidationConfig,
    ValidationEngine,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
