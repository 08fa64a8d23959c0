//! Execution Loop (spec.md §4.9-4.10, §4.12): the periodic poll that
//! admits, polls, submits, and retires workflows, plus the in-process
//! `CreateGroup` handler and per-workflow file logging and metrics that
//! support it.

pub mod context;
pub mod executor;
pub mod handlers;
pub mod logger;
pub mod metrics;

pub use context::ExecutionContext;
pub use executor::Executor;
pub use handlers::{GroupCreationLibrary, GroupCreationResult, UnavailableGroupCreationLibrary};
pub use logger::WorkflowLogger;
