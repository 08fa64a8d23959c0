//! Step 6 of the compile pipeline (spec.md §4.7): top-level shape and step
//! uniqueness. Deeper, per-application shape checks belong to Step
//! Validators (spec.md §4.5) and run afterward.

use wf_core::Error;

use crate::CompilePath;

pub fn validate_shape(workflow: &wf_core::Workflow, path: CompilePath) -> Result<(), Error> {
    if path == CompilePath::Plan {
        return Ok(());
    }

    let mut errors = Vec::new();

    if workflow.workflow_name.trim().is_empty() {
        errors.push("'workflow_name' is required and must be non-empty".to_string());
    }
    if workflow.steps.is_empty() {
        errors.push("workflow must declare at least one step".to_string());
    }

    let mut seen = std::collections::HashSet::new();
    for step in &workflow.steps {
        if step.step_name.trim().is_empty() {
            errors.push("every step requires a non-empty 'step_name'".to_string());
            continue;
        }
        if !seen.insert(step.step_name.as_str()) {
            errors.push(format!("duplicate step_name '{}'", step.step_name));
        }
        if step.app.trim().is_empty() {
            errors.push(format!("step '{}' is missing 'app'", step.step_name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::CompileError(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wf_core::{Step, StepStatus, WorkflowStatus};

    fn workflow(steps: Vec<Step>) -> wf_core::Workflow {
        wf_core::Workflow {
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

    fn step(name: &str) -> Step {
        Step {
            step_name: name.to_string(),
            app: "Homology".to_string(),
            params: json!({}),
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

    #[test]
    fn duplicate_step_names_rejected() {
        let wf = workflow(vec![step("a"), step("a")]);
        let err = validate_shape(&wf, CompilePath::RegisterOrValidate).unwrap_err();
        match err {
            Error::CompileError(errs) => assert!(errs.iter().any(|e| e.contains("duplicate"))),
            _ => panic!("expected CompileError"),
        }
    }

    #[test]
    fn empty_steps_rejected() {
        let wf = workflow(vec![]);
        assert!(validate_shape(&wf, CompilePath::RegisterOrValidate).is_err());
    }

    #[test]
    fn plan_path_skips_validation() {
        let wf = workflow(vec![]);
        assert!(validate_shape(&wf, CompilePath::Plan).is_ok());
    }
}
