//! Output Deconflict (spec.md §4.7.1). For each step that declares both
//! `params.output_path` and `params.output_file`, checks the workspace for
//! a name collision and rewrites `output_file` to `<file>_k` for the
//! smallest free `k >= 2`, up to a configured attempt cap.

use serde_json::Value;
use wf_core::{Error, Workflow};
use wf_workspace::WorkspaceProbe;

/// `CHECK_OUTPUT_FILE_CONFLICTS` / `MAX_OUTPUT_FILE_ATTEMPTS` (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct OutputDeconflictConfig {
    pub enabled: bool,
    pub max_attempts: u32,
}

impl Default for OutputDeconflictConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 100,
        }
    }
}

/// Resolves `${NAME}` references in `output_path` against `base_context` as
/// long as every reference is a bare identifier. Returns `None` if any
/// reference is dotted/bracketed (i.e. only resolvable at a later pass) —
/// per spec.md §4.7.1: "if any component cannot be resolved... skip this
/// step."
fn resolve_simple(path: &str, base_context: &std::collections::BTreeMap<String, String>) -> Option<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    let mut ok = true;
    let resolved = re.replace_all(path, |caps: &regex::Captures| {
        let name = &caps[1];
        if name.contains('.') || name.contains('[') {
            ok = false;
            return caps[0].to_string();
        }
        base_context
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
            .unwrap_or_else(|| {
                ok = false;
                caps[0].to_string()
            })
    });
    if ok {
        Some(resolved.into_owned())
    } else {
        None
    }
}

pub async fn deconflict_outputs(
    workflow: &mut Workflow,
    probe: &dyn WorkspaceProbe,
    cfg: &OutputDeconflictConfig,
) -> Result<Vec<String>, Error> {
    let mut warnings = Vec::new();
    if !cfg.enabled {
        return Ok(warnings);
    }
    let base_context = workflow.base_context.clone();

    for step in &mut workflow.steps {
        let Value::Object(params) = &mut step.params else {
            continue;
        };
        let (Some(output_path), Some(output_file)) = (
            params.get("output_path").and_then(|v| v.as_str()).map(str::to_string),
            params.get("output_file").and_then(|v| v.as_str()).map(str::to_string),
        ) else {
            continue;
        };

        let Some(resolved_path) = resolve_simple(&output_path, &base_context) else {
            continue;
        };

        let collides = probe.exists(&resolved_path, &output_file).await;
        if !collides {
            continue;
        }

        let mut chosen = None;
        for k in 2..=(cfg.max_attempts.max(2)) {
            let candidate = format!("{output_file}_{k}");
            if !probe.exists(&resolved_path, &candidate).await {
                chosen = Some(candidate);
                break;
            }
        }

        match chosen {
            Some(candidate) => {
                warnings.push(format!(
                    "step '{}': output_file '{output_file}' collided in workspace; renamed to '{candidate}'",
                    step.step_name
                ));
                params.insert("output_file".to_string(), Value::String(candidate.clone()));

                // `resolve_params_pass` already baked `${params.output_file}`
                // into this step's `outputs` before deconflict ran (spec.md
                // §4.7 steps 4 and 10), so the baked strings still carry the
                // pre-rename filename. Re-sync them by swapping the literal
                // old value for the new one, mirroring what a second pass of
                // the same substitution would have produced.
                if let Some(outputs) = &mut step.outputs {
                    for v in outputs.values_mut() {
                        if v.contains(&output_file) {
                            *v = v.replace(&output_file, &candidate);
                        }
                    }
                }
            }
            None => {
                return Err(Error::Validation {
                    message: format!(
                        "step '{}': no free output_file name for '{output_file}' within {} attempts",
                        step.step_name, cfg.max_attempts
                    ),
                    field: Some("output_file".to_string()),
                });
            }
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wf_core::{Step, StepStatus, WorkflowStatus};
    use wf_workspace::FakeWorkspaceProbe;

    fn workflow(steps: Vec<Step>) -> Workflow {
        Workflow {
            workflow_id: "wf_1_aaaa".into(),
            workflow_name: "test".into(),
            version: "1.0".into(),
            base_context: BTreeMap::from([("workspace_output_folder".into(), "/out".into())]),
            steps,
            workflow_outputs: None,
            status: WorkflowStatus::Planned,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            auth_token: Some("tok".into()),
            execution_metadata: None,
            log_file_path: None,
        }
    }

    fn step_with_output() -> Step {
        Step {
            step_name: "a".into(),
            app: "Homology".into(),
            params: json!({
                "output_path": "${workspace_output_folder}",
                "output_file": "report",
            }),
            outputs: None,
            depends_on: None,
            step_id: None,
            task_id: None,
            status: StepStatus::Planned,
            submitted_at: None,
            started_at: None,
            completed_at: None,
            elapsed_time: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn no_collision_leaves_output_file_untouched() {
        let mut wf = workflow(vec![step_with_output()]);
        let probe = FakeWorkspaceProbe::default();
        let warnings = deconflict_outputs(&mut wf, &probe, &OutputDeconflictConfig::default())
            .await
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(wf.steps[0].params["output_file"], "report");
    }

    #[tokio::test]
    async fn collision_renames_to_smallest_free_suffix() {
        let mut wf = workflow(vec![step_with_output()]);
        let probe = FakeWorkspaceProbe::new(["/out/report".to_string(), "/out/report_2".to_string()]);
        let warnings = deconflict_outputs(&mut wf, &probe, &OutputDeconflictConfig::default())
            .await
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(wf.steps[0].params["output_file"], "report_3");
    }

    #[tokio::test]
    async fn collision_rename_is_reflected_in_baked_outputs() {
        let mut wf = workflow(vec![step_with_output()]);
        wf.steps[0].outputs = Some(BTreeMap::from([(
            "report_file".to_string(),
            "/out/report".to_string(),
        )]));
        let probe = FakeWorkspaceProbe::new(["/out/report".to_string(), "/out/report_2".to_string()]);
        let warnings = deconflict_outputs(&mut wf, &probe, &OutputDeconflictConfig::default())
            .await
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(wf.steps[0].params["output_file"], "report_3");
        assert_eq!(wf.steps[0].outputs.as_ref().unwrap()["report_file"], "/out/report_3");
    }

    #[tokio::test]
    async fn dotted_output_path_reference_is_skipped() {
        let mut wf = workflow(vec![step_with_output()]);
        wf.steps[0].params["output_path"] = Value::String("${steps.a.outputs.dir}".to_string());
        let probe = FakeWorkspaceProbe::new(["anything".to_string()]);
        let warnings = deconflict_outputs(&mut wf, &probe, &OutputDeconflictConfig::default())
            .await
            .unwrap();
        assert!(warnings.is_empty());
    }
}
