//! Core primitives shared across the workflow orchestration service:
//! id generation, the domain error type, layered configuration, and the
//! shared workflow document model.

pub mod config;
pub mod error;
pub mod id;
pub mod model;

pub use config::{CliOverrides, Config};
pub use error::{Error, Result};
pub use id::{generate_local_step_id, generate_workflow_id, is_well_formed_workflow_id};
pub use model::{ExecutionMetadata, Step, StepStatus, Workflow, WorkflowStatus};
