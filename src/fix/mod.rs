//! Fix engine: policy-driven repair of validation findings
//!
//! - [`FixPlanner`] maps violations to proposed [`ChangeSet`]s
//! - [`ChangeEngine`] applies and rolls back change sets transactionally
//! - [`FixExecutor`] iterates plan -> apply -> revalidate under a [`FixPolicy`]

mod change;
mod engine;
mod executor;
mod planner;
mod policy;

pub use change::{
    Change, ChangeSet, ChangeSetMetadata, ChangeSetStatus, DiffEntry, EdgeRef, FixPlan,
    ImpactEstimate, Operation, OperationKind, Position, SplitOrigin,
};
pub use engine::{split_id, ChangeEngine, ChangeError, ChangeOutcome};
pub use executor::{FixExecutor, FixResult, RollbackResult, StopReason, DEFAULT_APPLIER};
pub use planner::{split_text, FixPlanner, DEFAULT_SUBJECT};
pub use policy::{
    ActionKind, ActionMode, ActionParams, ApprovalRequired, ExecutionMode, FixAction, FixPolicy,
    FixRule, Governance, Guard, Stopping,
};
