//! State Store (spec.md §4.1): MongoDB-backed persistence for workflow
//! documents. A single collection keyed by `workflow_id` (unique index,
//! spec.md §6); all writes go through typed mutators that are single-document
//! atomic, never read-modify-write (spec.md §4.1: "Callers MUST NOT
//! read-modify-write counters").

mod store;

pub use store::WorkflowStore;
