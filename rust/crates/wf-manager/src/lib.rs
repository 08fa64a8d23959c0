//! Workflow Manager (spec.md §4.11): the single entry point for `plan`,
//! `register`, `validate`, `submit`, `cancel`, and `status`/`get`. This is
//! the only component allowed to create or terminally mutate a workflow
//! document (spec.md §3 "Ownership") — the HTTP layer and the Executor both
//! go through here rather than touching the store directly for anything
//! that changes a workflow's identity or lifecycle stage.
//!
//! Grounded in `original_source/core/workflow_manager.py`: the idempotent
//! submit branching (`submit_workflow`) and the sanitize-then-revalidate
//! shape of `submit_planned_workflow` are ported field-for-field, expressed
//! through the already-built `wf_compiler::compile` pipeline instead of the
//! original's inline validation calls.

mod cleanup;

use std::sync::Arc;

use bson::Bson;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::instrument;

use wf_compiler::{CompilePath, OutputDeconflictConfig};
use wf_core::{Error, ExecutionMetadata, Step, StepStatus, Workflow, WorkflowStatus};
use wf_storage::WorkflowStore;
use wf_workspace::WorkspaceProbe;

pub use cleanup::{CleanupReport, PrunedLog};

/// Result of `plan`/`register`: enough for the caller to locate the
/// document without re-fetching it.
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub workflow_name: String,
    pub step_count: usize,
}

/// Result of `validate`: the fully compiled document plus everything the
/// compile pipeline noticed along the way, none of it persisted.
#[derive(Debug, Clone)]
pub struct ValidateOutcome {
    pub valid: bool,
    pub workflow: Workflow,
    pub warnings: Vec<String>,
    pub auto_fixes: Vec<String>,
}

/// Result of `submit`/`submit_planned`.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub workflow_id: String,
    pub status: WorkflowStatus,
}

/// A read-only status projection (spec.md §6 `GET .../status`).
#[derive(Debug, Clone)]
pub struct StatusProjection {
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub steps: Vec<StepStatusProjection>,
}

#[derive(Debug, Clone)]
pub struct StepStatusProjection {
    pub step_name: String,
    pub app: String,
    pub step_id: Option<String>,
    pub status: StepStatus,
    pub error_message: Option<String>,
}

/// The Workflow Manager façade (spec.md §4.11).
pub struct WorkflowManager {
    store: WorkflowStore,
    probe: Arc<dyn WorkspaceProbe>,
    deconflict_cfg: OutputDeconflictConfig,
    default_max_parallel_steps: u32,
    workflow_log_dir: String,
}

impl WorkflowManager {
    pub fn new(
        store: WorkflowStore,
        probe: Arc<dyn WorkspaceProbe>,
        deconflict_cfg: OutputDeconflictConfig,
        default_max_parallel_steps: u32,
        workflow_log_dir: impl Into<String>,
    ) -> Self {
        Self {
            store,
            probe,
            deconflict_cfg,
            default_max_parallel_steps,
            workflow_log_dir: workflow_log_dir.into(),
        }
    }

    /// `plan(raw)` (spec.md §4.11): light cleanup plus resolver pass 1 only
    /// (base-context substitution) — no schema validation, no rule
    /// application. Always assigns a fresh `workflow_id`, persisted with
    /// `status=planned`.
    #[instrument(skip(self, raw, auth_token))]
    pub async fn plan(&self, raw: Value, auth_token: Option<String>) -> Result<RegisterOutcome, Error> {
        let cleaned = wf_compiler::clean_raw_input(raw, CompilePath::Plan)?;
        let mut workflow = build_workflow(cleaned, auth_token)?;
        workflow.workflow_id = wf_core::generate_workflow_id();
        if workflow.workflow_name.trim().is_empty() {
            workflow.workflow_name = "Planned Workflow".to_string();
        }
        wf_resolver::resolve_base_context(&mut workflow)?;

        let step_count = workflow.steps.len();
        let workflow_name = workflow.workflow_name.clone();
        let workflow_id = workflow.workflow_id.clone();
        self.store.save(&workflow).await?;
        Ok(RegisterOutcome {
            workflow_id,
            status: WorkflowStatus::Planned,
            workflow_name,
            step_count,
        })
    }

    /// `register(raw)` (spec.md §4.11): the full compile pipeline
    /// (spec.md §4.7) then persisted with `status=planned`. A fresh
    /// `workflow_id` is always assigned — `clean_raw_input` rejects a
    /// caller-supplied one on this path (spec.md §4.7 step 2).
    #[instrument(skip(self, raw, auth_token))]
    pub async fn register(&self, raw: Value, auth_token: Option<String>) -> Result<RegisterOutcome, Error> {
        let mut workflow = self.compile_new(raw, auth_token).await?;
        workflow.status = WorkflowStatus::Planned;

        let step_count = workflow.steps.len();
        let workflow_name = workflow.workflow_name.clone();
        let workflow_id = workflow.workflow_id.clone();
        self.store.save(&workflow).await?;
        Ok(RegisterOutcome {
            workflow_id,
            status: WorkflowStatus::Planned,
            workflow_name,
            step_count,
        })
    }

    /// `validate(raw)` (spec.md §4.11): same pipeline as `register`, but
    /// nothing is persisted. Returns the compiled document plus whatever
    /// warnings/auto-fixes the pipeline produced.
    #[instrument(skip(self, raw, auth_token))]
    pub async fn validate(&self, raw: Value, auth_token: Option<String>) -> Result<ValidateOutcome, Error> {
        let cleaned = wf_compiler::clean_raw_input(raw, CompilePath::RegisterOrValidate)?;
        let original_steps = cleaned.get("steps").cloned();
        let mut workflow = build_workflow(cleaned, auth_token)?;
        workflow.workflow_id = wf_core::generate_workflow_id();

        let probe_ref: &dyn WorkspaceProbe = self.probe.as_ref();
        let outcome = wf_compiler::compile(
            workflow,
            CompilePath::RegisterOrValidate,
            Some(probe_ref),
            self.deconflict_cfg.clone(),
        )
        .await?;

        let mut auto_fixes = Vec::new();
        let final_steps = serde_json::to_value(&outcome.workflow.steps).ok();
        if original_steps != final_steps {
            auto_fixes.push(
                "variable resolution, field coercion, and service defaults were applied to one or more steps"
                    .to_string(),
            );
        }
        auto_fixes.extend(outcome.auto_fixes);

        Ok(ValidateOutcome {
            valid: true,
            workflow: outcome.workflow,
            warnings: outcome.warnings,
            auto_fixes,
        })
    }

    /// `submit(payload)` (spec.md §4.11): idempotent at-least-once entry
    /// point. A payload containing only `workflow_id` (no `steps`) submits
    /// an already-`register`ed workflow; anything else is registered first,
    /// then submitted.
    #[instrument(skip(self, payload, auth_token))]
    pub async fn submit(&self, payload: Value, auth_token: Option<String>) -> Result<SubmitOutcome, Error> {
        if let Some(workflow_id) = id_only_payload(&payload) {
            return self.submit_planned(&workflow_id, auth_token).await;
        }
        let registered = self.register(payload, auth_token.clone()).await?;
        self.submit_planned(&registered.workflow_id, auth_token).await
    }

    /// `submit_planned(workflow_id)` (spec.md §4.11): loads a `planned`
    /// document, strips any runtime fields a caller might have smuggled in,
    /// re-runs the full compile pipeline (late validation, spec.md §4.7),
    /// then transitions to `pending` with a freshly seeded
    /// `execution_metadata` and `log_file_path`. Calling this twice on an
    /// already-`pending` (or later) workflow is a no-op success — the
    /// idempotent-submission contract spec.md §4.11 and §8 require.
    #[instrument(skip(self, auth_token))]
    pub async fn submit_planned(&self, workflow_id: &str, auth_token: Option<String>) -> Result<SubmitOutcome, Error> {
        let mut workflow = self.store.get(workflow_id).await?;

        if workflow.status != WorkflowStatus::Planned {
            if workflow.status == WorkflowStatus::Pending {
                return Ok(SubmitOutcome {
                    workflow_id: workflow_id.to_string(),
                    status: WorkflowStatus::Pending,
                });
            }
            return Err(Error::InvalidTransition {
                workflow_id: workflow_id.to_string(),
                from: workflow.status.to_string(),
                to: WorkflowStatus::Pending.to_string(),
            });
        }

        sanitize_for_resubmission(&mut workflow);
        if let Some(token) = auth_token {
            workflow.auth_token = Some(token);
        }

        let probe_ref: &dyn WorkspaceProbe = self.probe.as_ref();
        let outcome = wf_compiler::compile(
            workflow,
            CompilePath::SubmitPlanned,
            Some(probe_ref),
            self.deconflict_cfg.clone(),
        )
        .await?;
        let mut workflow = outcome.workflow;

        let total_steps = workflow.steps.len() as u32;
        for step in &mut workflow.steps {
            step.status = StepStatus::Pending;
        }
        workflow.status = WorkflowStatus::Pending;
        workflow.execution_metadata = Some(ExecutionMetadata::new(total_steps, self.default_max_parallel_steps));
        workflow.log_file_path = Some(format!("{}/{}.log", self.workflow_log_dir, workflow.workflow_id));

        self.store
            .update_workflow_fields(workflow_id, workflow_update_document(&workflow)?)
            .await?;

        Ok(SubmitOutcome {
            workflow_id: workflow_id.to_string(),
            status: WorkflowStatus::Pending,
        })
    }

    /// `cancel(workflow_id)` (spec.md §4.11): rejects terminal workflows,
    /// except that cancelling an already-cancelled workflow is a no-op
    /// (spec.md §8: "cancel applied twice is idempotent on cancelled").
    #[instrument(skip(self))]
    pub async fn cancel(&self, workflow_id: &str) -> Result<(), Error> {
        let workflow = self.store.get(workflow_id).await?;
        if workflow.status == WorkflowStatus::Cancelled {
            return Ok(());
        }
        if workflow.status.is_terminal() {
            return Err(Error::Conflict {
                message: format!(
                    "workflow '{workflow_id}' cannot be cancelled from terminal status '{}'",
                    workflow.status
                ),
            });
        }
        self.store
            .update_workflow_fields(workflow_id, bson::doc! { "status": "cancelled" })
            .await
    }

    /// `status(workflow_id)` (spec.md §6 `GET .../status`): a read-only
    /// projection, cheaper than `get` for polling clients.
    #[instrument(skip(self))]
    pub async fn status(&self, workflow_id: &str) -> Result<StatusProjection, Error> {
        let workflow = self.store.get(workflow_id).await?;
        let steps = workflow
            .steps
            .iter()
            .map(|s| StepStatusProjection {
                step_name: s.step_name.clone(),
                app: s.app.clone(),
                step_id: s.step_id.clone().or_else(|| s.task_id.clone()),
                status: s.status,
                error_message: s.error_message.clone(),
            })
            .collect();
        Ok(StatusProjection {
            workflow_id: workflow.workflow_id,
            workflow_name: workflow.workflow_name,
            status: workflow.status,
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
            steps,
        })
    }

    /// `get(workflow_id)` (spec.md §6 `GET .../{id}`): the full document.
    #[instrument(skip(self))]
    pub async fn get(&self, workflow_id: &str) -> Result<Workflow, Error> {
        self.store.get(workflow_id).await
    }

    /// Low-level status setter used by the Executor (spec.md §4.10) for
    /// transitions that don't go through `submit`/`cancel` — e.g.
    /// `queued -> running`, or the terminal `-> succeeded`/`-> failed`.
    #[instrument(skip(self))]
    pub async fn update_workflow_status(&self, workflow_id: &str, status: WorkflowStatus) -> Result<(), Error> {
        self.store
            .update_workflow_fields(workflow_id, bson::doc! { "status": status.to_string() })
            .await
    }

    /// Prunes per-workflow log files for terminal workflows past
    /// `retention` (SPEC_FULL.md §5 "Workflow cleanup"). Never mutates the
    /// State Store — this is filesystem housekeeping only.
    #[instrument(skip(self))]
    pub async fn cleanup_stale_logs(&self, retention: chrono::Duration, dry_run: bool) -> Result<CleanupReport, Error> {
        cleanup::prune_stale_logs(&self.store, retention, dry_run).await
    }

    /// Shared compile step behind `register`/`validate`: clean, build,
    /// assign a fresh id, run the full pipeline.
    async fn compile_new(&self, raw: Value, auth_token: Option<String>) -> Result<Workflow, Error> {
        let cleaned = wf_compiler::clean_raw_input(raw, CompilePath::RegisterOrValidate)?;
        let mut workflow = build_workflow(cleaned, auth_token)?;
        workflow.workflow_id = wf_core::generate_workflow_id();

        let probe_ref: &dyn WorkspaceProbe = self.probe.as_ref();
        let outcome = wf_compiler::compile(
            workflow,
            CompilePath::RegisterOrValidate,
            Some(probe_ref),
            self.deconflict_cfg.clone(),
        )
        .await?;
        Ok(outcome.workflow)
    }
}

/// Returns `Some(workflow_id)` iff `payload` is exactly `{"workflow_id":
/// "..."}` — no `steps` key — the shape spec.md §4.11 treats as "submit an
/// already-planned workflow" rather than "register and submit inline".
fn id_only_payload(payload: &Value) -> Option<String> {
    let obj = payload.as_object()?;
    if obj.contains_key("steps") {
        return None;
    }
    obj.get("workflow_id")?.as_str().map(str::to_string)
}

/// Deserializes a cleaned raw JSON body into a fresh [`Workflow`] skeleton:
/// `status=planned`, timestamps set to now, no `execution_metadata` or
/// `log_file_path` yet. The caller is responsible for assigning
/// `workflow_id`.
fn build_workflow(raw: Value, auth_token: Option<String>) -> Result<Workflow, Error> {
    #[derive(serde::Deserialize, Default)]
    #[serde(default)]
    struct RawWorkflow {
        workflow_name: Option<String>,
        version: Option<String>,
        base_context: std::collections::BTreeMap<String, String>,
        steps: Vec<Step>,
        workflow_outputs: Option<Vec<String>>,
    }

    let parsed: RawWorkflow = serde_json::from_value(raw)
        .map_err(|e| Error::CompileError(vec![format!("malformed workflow document: {e}")]))?;
    let now = Utc::now();
    Ok(Workflow {
        workflow_id: String::new(),
        workflow_name: parsed.workflow_name.unwrap_or_default(),
        version: parsed.version.unwrap_or_else(|| "1.0".to_string()),
        base_context: parsed.base_context,
        steps: parsed.steps,
        workflow_outputs: parsed.workflow_outputs,
        status: WorkflowStatus::Planned,
        created_at: now,
        updated_at: now,
        started_at: None,
        completed_at: None,
        auth_token,
        execution_metadata: None,
        log_file_path: None,
    })
}

/// Strips every runtime/dispatch field before re-running the compile
/// pipeline on a `planned` document (spec.md §4.11 `submit_planned`),
/// mirroring `_sanitize_workflow_for_validation` in
/// `original_source/core/workflow_manager.py` — `workflow_id` itself is
/// preserved, everything the Executor would have written is not.
fn sanitize_for_resubmission(workflow: &mut Workflow) {
    workflow.status = WorkflowStatus::Planned;
    workflow.execution_metadata = None;
    workflow.log_file_path = None;
    workflow.started_at = None;
    workflow.completed_at = None;
    for step in &mut workflow.steps {
        step.step_id = None;
        step.task_id = None;
        step.status = StepStatus::Planned;
        step.submitted_at = None;
        step.started_at = None;
        step.completed_at = None;
        step.elapsed_time = None;
        step.error_message = None;
    }
}

/// Builds the `$set` document for persisting a freshly re-compiled,
/// `pending` workflow back over its `planned` predecessor.
fn workflow_update_document(workflow: &Workflow) -> Result<bson::Document, Error> {
    let mut doc = bson::Document::new();
    doc.insert("workflow_name", workflow.workflow_name.clone());
    doc.insert("version", workflow.version.clone());
    doc.insert(
        "base_context",
        bson::to_bson(&workflow.base_context).map_err(bson_err)?,
    );
    doc.insert("steps", bson::to_bson(&workflow.steps).map_err(bson_err)?);
    doc.insert(
        "workflow_outputs",
        bson::to_bson(&workflow.workflow_outputs).map_err(bson_err)?,
    );
    doc.insert("status", workflow.status.to_string());
    doc.insert(
        "execution_metadata",
        bson::to_bson(&workflow.execution_metadata).map_err(bson_err)?,
    );
    doc.insert(
        "log_file_path",
        bson::to_bson(&workflow.log_file_path).map_err(bson_err)?,
    );
    if let Some(token) = &workflow.auth_token {
        doc.insert("auth_token", Bson::String(token.clone()));
    }
    Ok(doc)
}

fn bson_err(e: bson::ser::Error) -> Error {
    Error::StorageError(format!("failed to serialize workflow field: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_only_payload_detects_submit_planned_shape() {
        assert_eq!(
            id_only_payload(&json!({"workflow_id": "wf_1_aaaa"})),
            Some("wf_1_aaaa".to_string())
        );
    }

    #[test]
    fn id_only_payload_rejects_when_steps_present() {
        assert_eq!(id_only_payload(&json!({"workflow_id": "wf_1_aaaa", "steps": []})), None);
    }

    #[test]
    fn id_only_payload_rejects_non_object() {
        assert_eq!(id_only_payload(&json!(["wf_1_aaaa"])), None);
    }

    #[test]
    fn build_workflow_defaults_version_and_status() {
        let workflow = build_workflow(json!({"workflow_name": "demo"}), None).unwrap();
        assert_eq!(workflow.version, "1.0");
        assert_eq!(workflow.status, WorkflowStatus::Planned);
        assert!(workflow.steps.is_empty());
    }

    #[test]
    fn sanitize_for_resubmission_clears_runtime_fields_but_keeps_identity() {
        let mut workflow = build_workflow(
            json!({
                "workflow_name": "demo",
                "steps": [{"step_name": "a", "app": "Homology", "params": {}, "status": "succeeded", "step_id": "task_1"}]
            }),
            Some("token".to_string()),
        )
        .unwrap();
        workflow.workflow_id = "wf_1_aaaa".to_string();
        workflow.status = WorkflowStatus::Succeeded;
        workflow.execution_metadata = Some(ExecutionMetadata::new(1, 3));

        sanitize_for_resubmission(&mut workflow);

        assert_eq!(workflow.workflow_id, "wf_1_aaaa");
        assert_eq!(workflow.status, WorkflowStatus::Planned);
        assert!(workflow.execution_metadata.is_none());
        assert_eq!(workflow.steps[0].status, StepStatus::Planned);
        assert!(workflow.steps[0].step_id.is_none());
    }
}
