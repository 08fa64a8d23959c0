//! Variable Resolver (spec.md §4.6).
//!
//! Template syntax is `${NAME}` inside strings. Three passes run over a
//! workflow document during compile; a separate `resolve_runtime` operation
//! runs at dispatch time against the *current* document so references to
//! earlier steps' real outputs only materialize once those steps complete.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use wf_core::{Error, Step, Workflow};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"));

fn is_simple_identifier(name: &str) -> bool {
    !name.contains('.') && !name.contains('[') && !name.contains(']')
}

/// Replace every `${NAME}` in `s` where `NAME` is a bare identifier, using
/// `base_context` first and the process environment second. Leaves dotted
/// or bracketed references untouched for later passes. Errors if a simple
/// reference can't be resolved either way.
fn substitute_base_context(
    s: &str,
    base_context: &std::collections::BTreeMap<String, String>,
) -> Result<String, Error> {
    let mut err: Option<String> = None;
    let out = PLACEHOLDER.replace_all(s, |caps: &regex::Captures| {
        let name = &caps[1];
        if !is_simple_identifier(name) {
            return caps[0].to_string();
        }
        if let Some(v) = base_context.get(name) {
            return v.clone();
        }
        if let Ok(v) = std::env::var(name) {
            return v;
        }
        err = Some(name.to_string());
        caps[0].to_string()
    });
    match err {
        Some(name) => Err(Error::CompileError(vec![format!(
            "could not resolve '${{{name}}}': not present in base_context or environment"
        )])),
        None => Ok(out.into_owned()),
    }
}

fn walk_strings_mut(
    value: &mut Value,
    f: &mut impl FnMut(&str) -> Result<String, Error>,
) -> Result<(), Error> {
    match value {
        Value::String(s) => {
            *s = f(s)?;
        }
        Value::Array(arr) => {
            for v in arr {
                walk_strings_mut(v, f)?;
            }
        }
        Value::Object(map) => {
            for v in map.values_mut() {
                walk_strings_mut(v, f)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Pass 1 (spec.md §4.6): base-context substitution over step `params`,
/// step `outputs`, and `workflow_outputs`. Never recurses into
/// `base_context` itself.
pub fn resolve_base_context(workflow: &mut Workflow) -> Result<(), Error> {
    let ctx = workflow.base_context.clone();
    for step in &mut workflow.steps {
        walk_strings_mut(&mut step.params, &mut |s| substitute_base_context(s, &ctx))?;
        if let Some(outputs) = &mut step.outputs {
            for v in outputs.values_mut() {
                *v = substitute_base_context(v, &ctx)?;
            }
        }
    }
    if let Some(outs) = &mut workflow.workflow_outputs {
        for v in outs.iter_mut() {
            *v = substitute_base_context(v, &ctx)?;
        }
    }
    Ok(())
}

static PARAMS_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{params\.([A-Za-z0-9_]+)\}").expect("static regex"));

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pass 2 (spec.md §4.6): for each step, in its `outputs` only, substitute
/// `${params.KEY}` with the step's own `params[KEY]`.
pub fn resolve_params_pass(workflow: &mut Workflow) -> Result<(), Error> {
    for step in &mut workflow.steps {
        let params = step.params.clone();
        let step_name = step.step_name.clone();
        let Some(outputs) = &mut step.outputs else {
            continue;
        };
        for v in outputs.values_mut() {
            let mut err: Option<String> = None;
            let replaced = PARAMS_REF.replace_all(v, |caps: &regex::Captures| {
                let key = &caps[1];
                match params.get(key) {
                    Some(val) => stringify(val),
                    None => {
                        err = Some(key.to_string());
                        caps[0].to_string()
                    }
                }
            });
            if let Some(key) = err {
                return Err(Error::CompileError(vec![format!(
                    "step '{step_name}': output references '${{params.{key}}}' which is not set in params"
                )]));
            }
            *v = replaced.into_owned();
        }
    }
    Ok(())
}

static STEP_OUTPUT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{steps\.([A-Za-z0-9_\-]+)\.outputs\.([A-Za-z0-9_]+)\}").expect("static regex"));

/// Pass 3 (spec.md §4.6): over `workflow_outputs`, substitute
/// `${steps.N.outputs.O}` with `workflow.steps[N].outputs[O]`.
pub fn resolve_step_outputs_pass(workflow: &mut Workflow) -> Result<(), Error> {
    let steps = workflow.steps.clone();
    let Some(outs) = &mut workflow.workflow_outputs else {
        return Ok(());
    };
    for v in outs.iter_mut() {
        let mut err: Option<String> = None;
        let replaced = STEP_OUTPUT_REF.replace_all(v, |caps: &regex::Captures| {
            let step_name = &caps[1];
            let key = &caps[2];
            match steps.iter().find(|s| s.step_name == step_name) {
                Some(step) => match step.outputs.as_ref().and_then(|o| o.get(key)) {
                    Some(val) => val.clone(),
                    None => {
                        err = Some(format!(
                            "unknown output '{key}' on step '{step_name}'"
                        ));
                        caps[0].to_string()
                    }
                },
                None => {
                    err = Some(format!("unknown step '{step_name}'"));
                    caps[0].to_string()
                }
            }
        });
        if let Some(msg) = err {
            return Err(Error::CompileError(vec![format!(
                "workflow_outputs reference {msg}"
            )]));
        }
        *v = replaced.into_owned();
    }
    Ok(())
}

static STEP_PARAMS_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{steps\.([A-Za-z0-9_\-]+)\.params\.([A-Za-z0-9_]+)\}").expect("static regex"));

/// Runtime resolution (spec.md §4.6): expand `${steps.N.outputs.O}` and
/// `${steps.N.params.O}` against the *current* document. Unresolved
/// references are left as-is and reported as warnings — they are legal
/// when the referenced step has not completed yet.
pub fn resolve_runtime(params: &Value, steps: &[Step]) -> (Value, Vec<String>) {
    let mut warnings = Vec::new();
    let mut out = params.clone();
    let _ = walk_strings_mut(&mut out, &mut |s| {
        Ok(substitute_runtime_string(s, steps, &mut warnings))
    });
    (out, warnings)
}

fn substitute_runtime_string(s: &str, steps: &[Step], warnings: &mut Vec<String>) -> String {
    let after_outputs = STEP_OUTPUT_REF.replace_all(s, |caps: &regex::Captures| {
        let step_name = &caps[1];
        let key = &caps[2];
        match steps.iter().find(|st| st.step_name == step_name) {
            Some(step) => match step.outputs.as_ref().and_then(|o| o.get(key)) {
                Some(val) => val.clone(),
                None => {
                    warnings.push(format!(
                        "unresolved runtime reference '${{steps.{step_name}.outputs.{key}}}': step has no such output yet"
                    ));
                    caps[0].to_string()
                }
            },
            None => {
                warnings.push(format!(
                    "unresolved runtime reference '${{steps.{step_name}.outputs.{key}}}': unknown step"
                ));
                caps[0].to_string()
            }
        }
    });

    STEP_PARAMS_REF
        .replace_all(&after_outputs, |caps: &regex::Captures| {
            let step_name = &caps[1];
            let key = &caps[2];
            match steps.iter().find(|st| st.step_name == step_name) {
                Some(step) => match step.params.get(key) {
                    Some(val) => stringify(val),
                    None => {
                        warnings.push(format!(
                            "unresolved runtime reference '${{steps.{step_name}.params.{key}}}': no such param"
                        ));
                        caps[0].to_string()
                    }
                },
                None => {
                    warnings.push(format!(
                        "unresolved runtime reference '${{steps.{step_name}.params.{key}}}': unknown step"
                    ));
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};
    use wf_core::{StepStatus, WorkflowStatus};

    fn make_workflow() -> Workflow {
        Workflow {
            workflow_id: "wf_1_aaaa".into(),
            workflow_name: "test".into(),
            version: "1.0".into(),
            base_context: BTreeMap::from([
                ("base_url".into(), "https://p3.example.org".into()),
                ("workspace_output_folder".into(), "/home/user/out".into()),
            ]),
            steps: vec![Step {
                step_name: "a".into(),
                app: "Homology".into(),
                params: json!({"base": "${base_url}", "output_path": "${workspace_output_folder}", "output_file": "report"}),
                outputs: Some(BTreeMap::from([(
                    "report_path".into(),
                    "${params.output_path}/${params.output_file}".into(),
                )])),
                depends_on: None,
                step_id: None,
                task_id: None,
                status: StepStatus::Planned,
                submitted_at: None,
                started_at: None,
                completed_at: None,
                elapsed_time: None,
                error_message: None,
            }],
            workflow_outputs: Some(vec!["${steps.a.outputs.report_path}".into()]),
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

    #[test]
    fn three_passes_resolve_end_to_end() {
        let mut wf = make_workflow();
        resolve_base_context(&mut wf).unwrap();
        assert_eq!(wf.steps[0].params["base"], "https://p3.example.org");
        assert_eq!(wf.steps[0].params["output_path"], "/home/user/out");

        resolve_params_pass(&mut wf).unwrap();
        assert_eq!(
            wf.steps[0].outputs.as_ref().unwrap()["report_path"],
            "/home/user/out/report"
        );

        resolve_step_outputs_pass(&mut wf).unwrap();
        assert_eq!(
            wf.workflow_outputs.as_ref().unwrap()[0],
            "/home/user/out/report"
        );
    }

    #[test]
    fn unresolved_base_context_errors() {
        let mut wf = make_workflow();
        wf.steps[0].params = json!({"x": "${totally_unknown_var}"});
        let err = resolve_base_context(&mut wf).unwrap_err();
        assert!(matches!(err, Error::CompileError(_)));
    }

    #[test]
    fn runtime_resolution_substitutes_completed_step_outputs() {
        let mut upstream = Step {
            step_name: "upstream".into(),
            app: "Homology".into(),
            params: json!({}),
            outputs: Some(BTreeMap::from([("result_path".into(), "/out/result.json".into())])),
            depends_on: None,
            step_id: Some("task-1".into()),
            task_id: Some("task-1".into()),
            status: StepStatus::Succeeded,
            submitted_at: None,
            started_at: None,
            completed_at: None,
            elapsed_time: None,
            error_message: None,
        };
        upstream.depends_on = None;
        let steps = vec![upstream];
        let params = json!({"input_path": "${steps.upstream.outputs.result_path}"});
        let (resolved, warnings) = resolve_runtime(&params, &steps);
        assert!(warnings.is_empty());
        assert_eq!(resolved["input_path"], "/out/result.json");
    }

    #[test]
    fn runtime_resolution_warns_on_not_yet_completed_step() {
        let pending = Step {
            step_name: "upstream".into(),
            app: "Homology".into(),
            params: json!({}),
            outputs: None,
            depends_on: None,
            step_id: None,
            task_id: None,
            status: StepStatus::Pending,
            submitted_at: None,
            started_at: None,
            completed_at: None,
            elapsed_time: None,
            error_message: None,
        };
        let params = json!({"input_path": "${steps.upstream.outputs.result_path}"});
        let (resolved, warnings) = resolve_runtime(&params, &[pending]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(resolved["input_path"], "${steps.upstream.outputs.result_path}");
    }

    #[test]
    fn missing_params_set_ref_in_an_output_errors() {
        let mut wf = make_workflow();
        wf.steps[0].params = json!({});
        let err = resolve_params_pass(&mut wf).unwrap_err();
        assert!(matches!(err, Error::CompileError(_)));
    }
}
