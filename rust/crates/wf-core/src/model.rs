//! The workflow document shape (spec.md §3). This is the single shared
//! domain model: the compiler, DAG, storage, and executor crates all work
//! against these types rather than each owning a parallel copy, per the
//! "single typed container for params" design note (spec.md §9).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow-level status (spec.md §3). The last three variants are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Planned,
    Pending,
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Succeeded | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Planned => "planned",
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Queued => "queued",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Succeeded => "succeeded",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Per-step status (spec.md §3). Terminal states: `succeeded`, `failed`,
/// `skipped`, `upstream_failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Planned,
    Pending,
    Ready,
    Queued,
    Running,
    Succeeded,
    Failed,
    Skipped,
    UpstreamFailed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded
                | StepStatus::Failed
                | StepStatus::Skipped
                | StepStatus::UpstreamFailed
        )
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Planned => "planned",
            StepStatus::Pending => "pending",
            StepStatus::Ready => "ready",
            StepStatus::Queued => "queued",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::UpstreamFailed => "upstream_failed",
        };
        write!(f, "{s}")
    }
}

/// One step in a workflow DAG (spec.md §3). `step_name` is the stable
/// identity used by the DAG; `step_id`/`task_id` are assigned at dispatch
/// and, for scheduler-backed steps, are always equal (I6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_name: String,
    pub app: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub outputs: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub depends_on: Option<BTreeSet<String>>,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default = "default_step_status")]
    pub status: StepStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub elapsed_time: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

fn default_step_status() -> StepStatus {
    StepStatus::Planned
}

impl Step {
    pub fn depends_on_iter(&self) -> impl Iterator<Item = &String> {
        self.depends_on.iter().flatten()
    }
}

/// Counters and sets tracking in-flight/completed steps for one workflow
/// (spec.md §3). Present iff the owning workflow's status is `>= pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub total_steps: u32,
    pub pending_steps: u32,
    pub running_steps: u32,
    pub completed_steps: u32,
    pub failed_steps: u32,
    #[serde(default)]
    pub currently_running_step_ids: BTreeSet<String>,
    #[serde(default)]
    pub completed_step_ids: BTreeSet<String>,
    pub max_parallel_steps: u32,
}

impl ExecutionMetadata {
    pub fn new(total_steps: u32, max_parallel_steps: u32) -> Self {
        Self {
            total_steps,
            pending_steps: total_steps,
            running_steps: 0,
            completed_steps: 0,
            failed_steps: 0,
            currently_running_step_ids: BTreeSet::new(),
            completed_step_ids: BTreeSet::new(),
            max_parallel_steps,
        }
    }
}

/// The persisted workflow document (spec.md §3), keyed by `workflow_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub workflow_name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub base_context: BTreeMap<String, String>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub workflow_outputs: Option<Vec<String>>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub execution_metadata: Option<ExecutionMetadata>,
    #[serde(default)]
    pub log_file_path: Option<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Workflow {
    pub fn find_step(&self, step_name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_name == step_name)
    }

    pub fn find_step_mut(&mut self, step_name: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.step_name == step_name)
    }
}
