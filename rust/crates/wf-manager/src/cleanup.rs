//! Workflow log cleanup (SPEC_FULL.md §5): an operator-facing maintenance
//! routine, separate from the DAG engine itself, that prunes per-workflow
//! log files for terminal workflows once they are older than a retention
//! window. Grounded in `original_source/utils/workflow_cleaner.py`'s
//! age-based pruning of `log_file_path` entries for `cancelled`/`succeeded`/
//! `failed` workflows.

use chrono::Utc;
use tracing::{instrument, warn};
use wf_core::{Error, Workflow, WorkflowStatus};
use wf_storage::WorkflowStore;

/// One workflow's log file was removed (or would have been, without
/// `dry_run`) during a cleanup pass.
#[derive(Debug, Clone)]
pub struct PrunedLog {
    pub workflow_id: String,
    pub log_file_path: String,
}

/// Result of a single cleanup pass.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub scanned: usize,
    pub pruned: Vec<PrunedLog>,
}

const TERMINAL_STATUSES: [WorkflowStatus; 3] =
    [WorkflowStatus::Succeeded, WorkflowStatus::Failed, WorkflowStatus::Cancelled];

/// Removes log files for terminal workflows whose `completed_at` is older
/// than `retention`. Workflows without `completed_at` (e.g. `cancelled`
/// before ever running) or without a `log_file_path` are skipped — there is
/// nothing to prune. File-removal errors are logged and otherwise ignored:
/// a half-swept directory is never worse than the status quo, and this
/// routine never touches the authoritative document in the State Store.
#[instrument(skip(store))]
pub async fn prune_stale_logs(
    store: &WorkflowStore,
    retention: chrono::Duration,
    dry_run: bool,
) -> Result<CleanupReport, Error> {
    let mut report = CleanupReport::default();
    let cutoff = Utc::now() - retention;

    for status in TERMINAL_STATUSES {
        let workflows = store.list_by_status(status).await?;
        report.scanned += workflows.len();
        for workflow in workflows {
            if let Some(pruned) = prune_one(&workflow, cutoff, dry_run) {
                report.pruned.push(pruned);
            }
        }
    }

    Ok(report)
}

fn prune_one(workflow: &Workflow, cutoff: chrono::DateTime<Utc>, dry_run: bool) -> Option<PrunedLog> {
    let completed_at = workflow.completed_at?;
    if completed_at > cutoff {
        return None;
    }
    let log_file_path = workflow.log_file_path.clone()?;

    if !dry_run {
        if let Err(e) = std::fs::remove_file(&log_file_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(workflow_id = %workflow.workflow_id, path = %log_file_path, error = %e, "failed to remove stale workflow log");
                return None;
            }
        }
    }

    Some(PrunedLog {
        workflow_id: workflow.workflow_id.clone(),
        log_file_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_core::{ExecutionMetadata, Workflow};

    fn terminal_workflow(completed_at: chrono::DateTime<Utc>, log_file_path: Option<&str>) -> Workflow {
        let now = Utc::now();
        Workflow {
            workflow_id: "wf_1_aaaa".to_string(),
            workflow_name: "demo".to_string(),
            version: "1.0".to_string(),
            base_context: Default::default(),
            steps: vec![],
            workflow_outputs: None,
            status: WorkflowStatus::Succeeded,
            created_at: now,
            updated_at: now,
            started_at: Some(now),
            completed_at: Some(completed_at),
            auth_token: None,
            execution_metadata: Some(ExecutionMetadata::new(0, 3)),
            log_file_path: log_file_path.map(str::to_string),
        }
    }

    #[test]
    fn skips_workflow_newer_than_cutoff() {
        let workflow = terminal_workflow(Utc::now(), Some("/tmp/does-not-exist.log"));
        let cutoff = Utc::now() - chrono::Duration::days(30);
        assert!(prune_one(&workflow, cutoff, true).is_none());
    }

    #[test]
    fn skips_workflow_without_log_file_path() {
        let workflow = terminal_workflow(Utc::now() - chrono::Duration::days(60), None);
        let cutoff = Utc::now() - chrono::Duration::days(30);
        assert!(prune_one(&workflow, cutoff, true).is_none());
    }

    #[test]
    fn dry_run_reports_without_touching_filesystem() {
        let path = "/tmp/wf-manager-cleanup-test-does-not-exist.log";
        let workflow = terminal_workflow(Utc::now() - chrono::Duration::days(60), Some(path));
        let cutoff = Utc::now() - chrono::Duration::days(30);
        let pruned = prune_one(&workflow, cutoff, true).expect("should be pruned");
        assert_eq!(pruned.workflow_id, "wf_1_aaaa");
        assert_eq!(pruned.log_file_path, path);
    }
}
