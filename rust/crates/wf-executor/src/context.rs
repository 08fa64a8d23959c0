//! Workflow Execution Context (spec.md §4.9): in-memory per-workflow
//! execution state derived from the stored document.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use wf_core::{Error, Workflow, WorkflowStatus};
use wf_dag::Dag;

use crate::logger::WorkflowLogger;

pub struct ExecutionContext {
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: WorkflowStatus,
    pub auth_token: Option<String>,
    pub dag: Dag,
    pub completed: HashSet<String>,
    pub running: HashSet<String>,
    pub failed: HashSet<String>,
    pub max_parallel_steps: u32,
    pub logger: WorkflowLogger,
    pub last_poll_time: Option<DateTime<Utc>>,
    pub total_steps: u32,
}

impl ExecutionContext {
    /// Build a fresh context from a just-loaded document (spec.md §4.9):
    /// the DAG is constructed fresh, `succeeded`/`running`/`failed` sets are
    /// populated from step statuses, and the logger is opened against
    /// `log_file_path` (falling back to `workflow_log_dir` if the document
    /// predates a log file being assigned).
    pub fn build(workflow: &Workflow, workflow_log_dir: &str) -> Result<Self, Error> {
        let dag = Dag::build(workflow.steps.clone()).map_err(|e| Error::Internal(e.to_string()))?;

        let mut completed = HashSet::new();
        let mut running = HashSet::new();
        let mut failed = HashSet::new();
        for step in &workflow.steps {
            match step.status {
                wf_core::StepStatus::Succeeded => {
                    completed.insert(step.step_name.clone());
                }
                wf_core::StepStatus::Running => {
                    running.insert(step.step_name.clone());
                }
                wf_core::StepStatus::Failed => {
                    failed.insert(step.step_name.clone());
                }
                _ => {}
            }
        }

        let max_parallel_steps = workflow
            .execution_metadata
            .as_ref()
            .map(|m| m.max_parallel_steps)
            .unwrap_or(1);
        let total_steps = workflow
            .execution_metadata
            .as_ref()
            .map(|m| m.total_steps)
            .unwrap_or(workflow.steps.len() as u32);

        let (logger, _log_file_path) = WorkflowLogger::open(workflow_log_dir, &workflow.workflow_id)?;

        Ok(Self {
            workflow_id: workflow.workflow_id.clone(),
            workflow_name: workflow.workflow_name.clone(),
            status: workflow.status,
            auth_token: workflow.auth_token.clone(),
            dag,
            completed,
            running,
            failed,
            max_parallel_steps,
            logger,
            last_poll_time: None,
            total_steps,
        })
    }

    /// `capacity() = max(0, max_parallel - |running|)` (spec.md §4.9).
    pub fn capacity(&self) -> u32 {
        self.max_parallel_steps.saturating_sub(self.running.len() as u32)
    }

    pub fn is_complete(&self) -> bool {
        self.dag.complete()
    }

    pub fn has_failed(&self) -> bool {
        self.dag.failed()
    }

    pub fn has_succeeded(&self) -> bool {
        self.dag.succeeded()
    }

    pub fn ready_step_names(&self) -> Vec<String> {
        self.dag.ready(&self.completed).into_iter().map(|s| s.step_name.clone()).collect()
    }
}
