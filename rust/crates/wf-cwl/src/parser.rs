//! CWL document parsing and structural validation (spec.md §5, grounded in
//! `original_source/cwl/parser.py`).

use serde_json::Value;
use wf_core::Error;

/// True if `data` looks like a CWL document rather than the internal
/// workflow JSON shape — used by the `/api/v1/workflows/cwl` handler to
/// give a clear error if the wrong endpoint is hit.
pub fn detect_cwl_format(data: &Value) -> bool {
    let Some(obj) = data.as_object() else {
        return false;
    };
    if matches!(obj.get("class").and_then(Value::as_str), Some("Workflow" | "CommandLineTool")) {
        return true;
    }
    if obj.contains_key("cwlVersion") {
        return true;
    }
    matches!(obj.get("steps"), Some(Value::Object(_)))
}

/// Parses CWL source text as YAML first (CWL's native format), falling
/// back to JSON — YAML is close enough to a JSON superset that this order
/// matches the original's behavior for both formats.
pub fn parse_cwl_text(text: &str) -> Result<Value, Error> {
    if let Ok(value) = serde_yaml::from_str::<Value>(text) {
        return Ok(value);
    }
    serde_json::from_str(text)
        .map_err(|e| Error::CompileError(vec![format!("failed to parse CWL document: {e}")]))
}

/// Validates the minimal CWL workflow shape: `class: Workflow` with a
/// mapping-typed `steps`.
pub fn validate_cwl_workflow(cwl: &Value) -> Result<(), Error> {
    let obj = cwl
        .as_object()
        .ok_or_else(|| Error::CompileError(vec!["CWL workflow must be a mapping".to_string()]))?;

    let class = obj
        .get("class")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::CompileError(vec!["CWL workflow missing 'class' field".to_string()]))?;
    if class != "Workflow" {
        return Err(Error::CompileError(vec![format!(
            "expected CWL class 'Workflow', got '{class}'"
        )]));
    }

    match obj.get("steps") {
        Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(Error::CompileError(vec![
            "CWL workflow 'steps' must be a mapping of step_name -> step_def".to_string(),
        ])),
        None => Err(Error::CompileError(vec!["CWL workflow missing 'steps' field".to_string()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_cwl_by_class() {
        assert!(detect_cwl_format(&json!({"class": "Workflow", "steps": {}})));
        assert!(!detect_cwl_format(&json!({"workflow_name": "x", "steps": []})));
    }

    #[test]
    fn detects_cwl_by_dict_shaped_steps() {
        assert!(detect_cwl_format(&json!({"steps": {"a": {}}})));
        assert!(!detect_cwl_format(&json!({"steps": [{"step_name": "a"}]})));
    }

    #[test]
    fn validate_rejects_wrong_class() {
        let err = validate_cwl_workflow(&json!({"class": "CommandLineTool", "steps": {}})).unwrap_err();
        assert!(matches!(err, Error::CompileError(_)));
    }

    #[test]
    fn validate_rejects_list_shaped_steps() {
        let err = validate_cwl_workflow(&json!({"class": "Workflow", "steps": []})).unwrap_err();
        assert!(matches!(err, Error::CompileError(_)));
    }

    #[test]
    fn validate_accepts_minimal_workflow() {
        assert!(validate_cwl_workflow(&json!({"class": "Workflow", "steps": {}})).is_ok());
    }

    #[test]
    fn parse_cwl_text_handles_yaml() {
        let text = "class: Workflow\nsteps: {}\n";
        let parsed = parse_cwl_text(text).unwrap();
        assert_eq!(parsed["class"], "Workflow");
    }

    #[test]
    fn parse_cwl_text_handles_json() {
        let text = r#"{"class": "Workflow", "steps": {}}"#;
        let parsed = parse_cwl_text(text).unwrap();
        assert_eq!(parsed["class"], "Workflow");
    }
}
