//! Workflow Compiler (spec.md §4.7): the end-to-end compile pipeline shared
//! by `register` / `validate` / `submit_planned` (spec.md §4.11). Given a
//! raw input object, runs clean -> resolve -> coerce/rule-check ->
//! schema-validate -> defaults/validators -> DAG/cycle check -> output
//! deconflict, collecting errors in a single batch rather than failing on
//! the first violation (spec.md §7: "Never partial: nothing is persisted").

mod deconflict;
mod schema;

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::instrument;
use wf_core::{Error, Step, Workflow};
use wf_workspace::WorkspaceProbe;

pub use deconflict::OutputDeconflictConfig;

/// Which entry point is invoking the pipeline; governs whether a top-level
/// `workflow_id` is accepted or rejected (spec.md §4.7 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePath {
    /// `plan`: accepts a caller-supplied `workflow_id`, skips schema
    /// validation entirely (spec.md §4.11).
    Plan,
    /// `register` / `validate`: rejects a caller-supplied top-level
    /// `workflow_id` (a fresh one is assigned by the Manager).
    RegisterOrValidate,
    /// `submit_planned`: re-running the pipeline on an already-registered,
    /// already-identified document (late validation).
    SubmitPlanned,
}

/// Output of a successful compile: the cleaned-and-resolved document plus
/// any non-fatal warnings/auto-fixes accumulated along the way (used by
/// `validate`, spec.md §4.11).
pub struct CompileOutcome {
    pub workflow: Workflow,
    pub warnings: Vec<String>,
    pub auto_fixes: Vec<String>,
}

/// Fields known to forbid empty arrays while permitting absence (spec.md
/// §4.7 step 3). Empty arrays for these fields are stripped before coercion
/// so that, e.g., an empty `paired_end_libs: []` doesn't spuriously satisfy
/// a conditional-required check.
const EMPTY_ARRAY_FORBIDDEN_FIELDS: &[&str] =
    &["paired_end_libs", "single_end_libs", "srr_ids", "contigs", "genome_ids"];

/// Steps 1-2 of the compile pipeline (spec.md §4.7), run on the raw JSON
/// body before it is deserialized into a [`Workflow`]: strip wrapper fields
/// (`workflow_json`, planner metadata) and accept/reject a top-level
/// `workflow_id` depending on `path`.
pub fn clean_raw_input(mut raw: Value, path: CompilePath) -> Result<Value, Error> {
    if let Value::Object(map) = &mut raw {
        if let Some(inner) = map.remove("workflow_json") {
            raw = inner;
        }
    }
    if let Value::Object(map) = &mut raw {
        map.remove("planner_metadata");
        if path == CompilePath::RegisterOrValidate && map.contains_key("workflow_id") {
            return Err(Error::CompileError(vec![
                "'workflow_id' must not be supplied to register/validate; it is assigned by the server".to_string(),
            ]));
        }
    }
    Ok(raw)
}

/// Run the full compile pipeline (spec.md §4.7) over `workflow`.
///
/// `probe` is only consulted when `workflow.auth_token` is present (spec.md
/// §4.7 step 10: "If a workspace credential is present"). Pass `None` to
/// skip Output Deconflict entirely (e.g. for `plan`, which never compiles).
#[instrument(skip(workflow, probe, deconflict_cfg), fields(workflow_name = %workflow.workflow_name))]
pub async fn compile(
    mut workflow: Workflow,
    path: CompilePath,
    probe: Option<&dyn WorkspaceProbe>,
    deconflict_cfg: OutputDeconflictConfig,
) -> Result<CompileOutcome, Error> {
    let mut warnings = Vec::new();
    let auto_fixes = Vec::new();

    // Step 3: strip empty-but-forbidden array fields (non-fatal cleanup).
    for step in &mut workflow.steps {
        if let Value::Object(params) = &mut step.params {
            for field in EMPTY_ARRAY_FORBIDDEN_FIELDS {
                if matches!(params.get(*field), Some(Value::Array(a)) if a.is_empty()) {
                    params.remove(*field);
                }
            }
        }
    }

    // Step 4: Variable Resolver passes 1-3.
    wf_resolver::resolve_base_context(&mut workflow)?;
    wf_resolver::resolve_params_pass(&mut workflow)?;
    wf_resolver::resolve_step_outputs_pass(&mut workflow)?;

    // Step 5: Field-Coercion & Rule Registry (aliases -> enums -> coercion ->
    // conditional-required), batched across all steps.
    let mut rule_errors = Vec::new();
    for step in &mut workflow.steps {
        step.app = wf_rules::normalize_app(&step.app);
        let errs = wf_rules::apply(&step.app, &mut step.params);
        rule_errors.extend(
            errs.into_iter()
                .map(|e| format!("step '{}': {e}", step.step_name)),
        );
    }
    if !rule_errors.is_empty() {
        return Err(Error::CompileError(rule_errors));
    }

    // Step 6: schema validation (top-level shape, step uniqueness).
    schema::validate_shape(&workflow, path)?;

    // Step 7: per-step Defaults then Validator, batched.
    let mut validator_errors = Vec::new();
    for step in &mut workflow.steps {
        let outcome =
            wf_validators::apply_defaults_and_validate(&step.app, step.params.clone(), step.outputs.as_ref());
        step.params = outcome.params;
        warnings.extend(
            outcome
                .warnings
                .into_iter()
                .map(|w| format!("step '{}': {w}", step.step_name)),
        );
        validator_errors.extend(
            outcome
                .errors
                .into_iter()
                .map(|e| format!("step '{}': {e}", step.step_name)),
        );
    }
    if !validator_errors.is_empty() {
        return Err(Error::CompileError(validator_errors));
    }

    // Step 8: dependency graph build, missing-dependency and cycle check.
    wf_dag::Dag::build(workflow.steps.clone()).map_err(|e| Error::CompileError(vec![e.to_string()]))?;

    // Step 9: scan for dangling `${steps.N...}` references.
    check_step_references(&workflow)?;

    // Step 10: Output Deconflict, only when a workspace credential is
    // present.
    if let (Some(probe), true) = (probe, workflow.auth_token.is_some()) {
        let fixes = deconflict::deconflict_outputs(&mut workflow, probe, &deconflict_cfg).await?;
        warnings.extend(fixes);
    }

    Ok(CompileOutcome {
        workflow,
        warnings,
        auto_fixes,
    })
}

static STEP_REF: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
    regex::Regex::new(r"\$\{steps\.([A-Za-z0-9_\-]+)\.(?:outputs|params)\.[A-Za-z0-9_]+\}").expect("static regex")
});

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(a) => a.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(o) => o.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

/// Step 9 (spec.md §4.7): every `${steps.N...}` reference in `params`,
/// `outputs`, or `workflow_outputs` must name a step that actually exists.
fn check_step_references(workflow: &Workflow) -> Result<(), Error> {
    let known: BTreeSet<&str> = workflow.steps.iter().map(|s| s.step_name.as_str()).collect();
    let mut errors = Vec::new();
    let mut strings = Vec::new();
    for step in &workflow.steps {
        collect_strings(&step.params, &mut strings);
        if let Some(outputs) = &step.outputs {
            strings.extend(outputs.values().cloned());
        }
    }
    if let Some(outs) = &workflow.workflow_outputs {
        strings.extend(outs.iter().cloned());
    }
    for s in &strings {
        for caps in STEP_REF.captures_iter(s) {
            let name = &caps[1];
            if !known.contains(name) {
                errors.push(format!("reference to unknown step '{name}' in '{s}'"));
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::CompileError(errors))
    }
}

/// Used by the Executor's defensive gate (spec.md §4.10 submit_step step 2):
/// re-check the precomputed-database allowlist at dispatch time, not just
/// at compile time.
pub fn check_precomputed_database_allowlist(step: &Step) -> Result<(), Error> {
    if !matches!(step.app.as_str(), "Homology" | "blast") {
        return Ok(());
    }
    let Some(db_source) = step.params.get("db_source").and_then(|v| v.as_str()) else {
        return Ok(());
    };
    if db_source != "precomputed_database" {
        return Ok(());
    }
    let db = step.params.get("db_precomputed_database").and_then(|v| v.as_str());
    match db {
        Some(db) if wf_rules::PRECOMPUTED_DB_ALLOWLIST.contains(&db) => Ok(()),
        other => Err(Error::Validation {
            message: format!(
                "db_precomputed_database {other:?} is not in the allowlist {:?}",
                wf_rules::PRECOMPUTED_DB_ALLOWLIST
            ),
            field: Some("db_precomputed_database".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wf_core::{StepStatus, WorkflowStatus};

    fn step(name: &str, app: &str, params: Value, depends_on: Option<&[&str]>) -> Step {
        Step {
            step_name: name.to_string(),
            app: app.to_string(),
            params,
            outputs: None,
            depends_on: depends_on.map(|d| d.iter().map(|s| s.to_string()).collect()),
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

    fn workflow(steps: Vec<Step>) -> Workflow {
        Workflow {
            workflow_id: "wf_1_aaaa".into(),
            workflow_name: "test".into(),
            version: "1.0".into(),
            base_context: BTreeMap::new(),
            steps,
            workflow_outputs: None,
            status: WorkflowStatus::Planned,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            auth_token: None,
            execution_metadata: None,
            log_file_path: None,
        }
    }

    #[tokio::test]
    async fn valid_workflow_compiles_clean() {
        use serde_json::json;
        let wf = workflow(vec![step(
            "annotate",
            "GenomeAnnotation",
            json!({
                "contigs": "x", "organism_name": "E. coli", "domain": "Bacteria", "genetic_code": 11,
            }),
            None,
        )]);
        let outcome = compile(wf, CompilePath::RegisterOrValidate, None, OutputDeconflictConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome.workflow.steps.len(), 1);
    }

    #[tokio::test]
    async fn cycle_is_rejected_as_compile_error() {
        use serde_json::json;
        let wf = workflow(vec![
            step("a", "Homology", json!({}), Some(&["b"])),
            step("b", "Homology", json!({}), Some(&["a"])),
        ]);
        let err = compile(wf, CompilePath::RegisterOrValidate, None, OutputDeconflictConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CompileError(_)));
    }

    #[tokio::test]
    async fn dangling_step_reference_is_rejected() {
        use serde_json::json;
        let wf = workflow(vec![step(
            "a",
            "GenomeAnnotation",
            json!({
                "contigs": "${steps.nonexistent.outputs.contigs_path}",
                "organism_name": "x", "domain": "Bacteria", "genetic_code": 11,
            }),
            None,
        )]);
        let err = compile(wf, CompilePath::RegisterOrValidate, None, OutputDeconflictConfig::default())
            .await
            .unwrap_err();
        match err {
            Error::CompileError(errs) => assert!(errs.iter().any(|e| e.contains("nonexistent"))),
            _ => panic!("expected CompileError"),
        }
    }

    #[test]
    fn clean_raw_input_unwraps_workflow_json_wrapper() {
        use serde_json::json;
        let raw = json!({"workflow_json": {"workflow_name": "w"}, "planner_metadata": {"x": 1}});
        let cleaned = clean_raw_input(raw, CompilePath::RegisterOrValidate).unwrap();
        assert_eq!(cleaned, json!({"workflow_name": "w"}));
    }

    #[test]
    fn clean_raw_input_rejects_workflow_id_on_register() {
        use serde_json::json;
        let raw = json!({"workflow_id": "wf_1_aaaa", "workflow_name": "w"});
        let err = clean_raw_input(raw, CompilePath::RegisterOrValidate).unwrap_err();
        assert!(matches!(err, Error::CompileError(_)));
    }

    #[test]
    fn clean_raw_input_allows_workflow_id_on_plan() {
        use serde_json::json;
        let raw = json!({"workflow_id": "wf_1_aaaa", "workflow_name": "w"});
        assert!(clean_raw_input(raw, CompilePath::Plan).is_ok());
    }

    #[test]
    fn precomputed_database_gate_rejects_unknown_db() {
        use serde_json::json;
        let s = step(
            "a",
            "Homology",
            json!({"db_source": "precomputed_database", "db_precomputed_database": "not-allowed"}),
            None,
        );
        let err = check_precomputed_database_allowlist(&s).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
