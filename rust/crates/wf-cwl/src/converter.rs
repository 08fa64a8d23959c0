//! CWL Workflow -> internal workflow JSON conversion (spec.md §5, grounded
//! in `original_source/cwl/converter.py`). The output is the same JSON
//! shape `wf_manager::WorkflowManager::register` accepts, so a caller can
//! feed `convert()`'s result straight into `register`/`validate`.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::instrument;
use wf_core::Error;

use crate::{expression, parser, tool_mapper};

const DEFAULT_BASE_URL: &str = "https://www.bv-brc.org";

#[instrument(skip(cwl))]
pub fn convert(cwl: Value) -> Result<Value, Error> {
    parser::validate_cwl_workflow(&cwl)?;
    let obj = cwl.as_object().expect("validated by validate_cwl_workflow");

    let workflow_name = extract_workflow_name(obj);
    let version = extract_version(obj);
    let base_context = convert_workflow_inputs(obj.get("inputs"));
    let steps = convert_steps(obj.get("steps"))?;
    let workflow_outputs = convert_workflow_outputs(obj.get("outputs"));

    tracing::info!(workflow_name, step_count = steps.len(), "converted CWL workflow");

    let mut workflow = Map::new();
    workflow.insert("workflow_name".to_string(), json!(workflow_name));
    workflow.insert("version".to_string(), json!(version));
    workflow.insert("base_context".to_string(), json!(base_context));
    workflow.insert("steps".to_string(), json!(steps));
    if !workflow_outputs.is_empty() {
        workflow.insert("workflow_outputs".to_string(), json!(workflow_outputs));
    }
    Ok(Value::Object(workflow))
}

fn extract_workflow_name(obj: &Map<String, Value>) -> String {
    if let Some(label) = obj.get("label").and_then(Value::as_str) {
        return label.to_string();
    }
    if let Some(id) = obj.get("id").and_then(Value::as_str) {
        let stem = id.rsplit('/').next().unwrap_or(id);
        return stem.strip_suffix(".cwl").unwrap_or(stem).to_string();
    }
    "cwl-workflow".to_string()
}

fn extract_version(obj: &Map<String, Value>) -> String {
    obj.get("cwlVersion")
        .and_then(Value::as_str)
        .or_else(|| obj.get("version").and_then(Value::as_str))
        .unwrap_or("1.0")
        .to_string()
}

/// CWL workflow-level `inputs` become `base_context` template variables
/// (spec.md §3): every input is re-exposed as `${input_id}` so steps can
/// reference it the same way a native base_context entry would be
/// referenced, plus the two conventional fields the executor expects.
fn convert_workflow_inputs(inputs: Option<&Value>) -> BTreeMap<String, Value> {
    let mut base_context = BTreeMap::new();
    if let Some(Value::Object(inputs)) = inputs {
        for input_id in inputs.keys() {
            base_context.insert(input_id.clone(), json!(format!("${{{input_id}}}")));
        }
    }

    base_context
        .entry("base_url".to_string())
        .or_insert_with(|| json!(DEFAULT_BASE_URL));

    if !base_context.contains_key("workspace_output_folder") {
        let fallback = base_context
            .iter()
            .find(|(k, _)| {
                let lower = k.to_lowercase();
                lower.contains("workspace") || lower.contains("output")
            })
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| json!("${workspace_output_folder}"));
        base_context.insert("workspace_output_folder".to_string(), fallback);
    }

    base_context
}

fn convert_steps(steps: Option<&Value>) -> Result<Vec<Value>, Error> {
    let Some(Value::Object(steps)) = steps else {
        return Ok(Vec::new());
    };

    let mut custom_steps = Vec::new();
    for (step_name, step_def) in steps {
        let Some(step_def) = step_def.as_object() else {
            tracing::warn!(step_name, "skipping CWL step: not a mapping");
            continue;
        };

        let app_name = match step_def.get("run") {
            Some(Value::String(tool_ref)) => tool_mapper::map_tool_to_app(tool_ref),
            Some(Value::Object(tool_def)) => extract_app_from_inline_tool(tool_def),
            _ => {
                return Err(Error::CompileError(vec![format!(
                    "step '{step_name}' missing 'run' field (tool reference)"
                )]))
            }
        };

        let step_inputs = step_def.get("in").cloned().unwrap_or_else(|| json!({}));
        let params = convert_step_inputs(&step_inputs);
        let step_outputs = step_def
            .get("out")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let outputs = convert_step_outputs(&step_outputs);
        let depends_on: Vec<String> = expression::extract_step_dependencies(&step_inputs).into_iter().collect();

        let mut step = Map::new();
        step.insert("step_name".to_string(), json!(step_name));
        step.insert("app".to_string(), json!(app_name));
        step.insert("params".to_string(), Value::Object(params));
        step.insert("outputs".to_string(), json!(outputs));
        if !depends_on.is_empty() {
            step.insert("depends_on".to_string(), json!(depends_on));
        }
        custom_steps.push(Value::Object(step));
    }
    Ok(custom_steps)
}

fn extract_app_from_inline_tool(tool_def: &Map<String, Value>) -> String {
    if let Some(label) = tool_def.get("label").and_then(Value::as_str) {
        return tool_mapper::map_tool_to_app(label);
    }
    if let Some(id) = tool_def.get("id").and_then(Value::as_str) {
        return tool_mapper::map_tool_to_app(id);
    }
    "UnknownApp".to_string()
}

fn convert_step_inputs(step_inputs: &Value) -> Map<String, Value> {
    let mut params = Map::new();
    if let Value::Object(inputs) = step_inputs {
        for (name, value) in inputs {
            params.insert(name.clone(), convert_input_value(value));
        }
    }
    params
}

fn convert_input_value(value: &Value) -> Value {
    match value {
        Value::String(s) => json!(expression::translate_expression(s)),
        Value::Object(obj) => {
            if let Some(path) = obj.get("path").and_then(Value::as_str) {
                json!(path)
            } else if let Some(location) = obj.get("location").and_then(Value::as_str) {
                json!(location)
            } else {
                let converted: Map<String, Value> =
                    obj.iter().map(|(k, v)| (k.clone(), convert_input_value(v))).collect();
                Value::Object(converted)
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(convert_input_value).collect()),
        other => other.clone(),
    }
}

/// Output paths follow the convention `${params.output_path}/<output_id>`
/// (spec.md §4.6's `${params.KEY}` form), resolved against the step's own
/// `output_path` param at runtime rather than at conversion time.
fn convert_step_outputs(step_outputs: &[Value]) -> BTreeMap<String, String> {
    step_outputs
        .iter()
        .filter_map(Value::as_str)
        .map(|output_id| (output_id.to_string(), format!("${{params.output_path}}/{output_id}")))
        .collect()
}

fn convert_workflow_outputs(outputs: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(outputs)) = outputs else {
        return Vec::new();
    };
    let mut workflow_outputs = Vec::new();
    for output_def in outputs {
        match output_def {
            Value::String(s) => workflow_outputs.push(s.clone()),
            Value::Object(obj) => {
                if let Some(source) = obj.get("outputSource").and_then(Value::as_str) {
                    workflow_outputs.push(expression::translate_expression(&format!("$({source})")));
                } else if let Some(id) = obj.get("id").and_then(Value::as_str) {
                    workflow_outputs.push(id.to_string());
                }
            }
            _ => {}
        }
    }
    workflow_outputs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cwl() -> Value {
        json!({
            "cwlVersion": "v1.2",
            "class": "Workflow",
            "label": "annotate-and-analyze",
            "inputs": {
                "contigs_path": {"type": "string"},
                "workspace_output_folder": {"type": "string"},
            },
            "steps": {
                "annotate": {
                    "run": "genome-annotation.cwl",
                    "in": {
                        "contigs": "$(inputs.contigs_path)",
                        "domain": "Bacteria",
                    },
                    "out": ["annotation_path"],
                },
                "analyze": {
                    "run": "comprehensive_genome_analysis.cwl",
                    "in": {
                        "contigs": "$(steps.annotate.annotation_path)",
                    },
                    "out": ["report_path"],
                },
            },
            "outputs": [
                {"id": "final_report", "outputSource": "steps.analyze.report_path"},
            ],
        })
    }

    #[test]
    fn converts_full_workflow_shape() {
        let result = convert(sample_cwl()).unwrap();
        assert_eq!(result["workflow_name"], "annotate-and-analyze");
        assert_eq!(result["version"], "v1.2");
        assert_eq!(result["base_context"]["base_url"], DEFAULT_BASE_URL);
        assert_eq!(result["base_context"]["contigs_path"], "${contigs_path}");
        assert_eq!(result["steps"].as_array().unwrap().len(), 2);
        assert_eq!(result["workflow_outputs"][0], "${steps.analyze.outputs.report_path}");
    }

    #[test]
    fn converted_step_picks_up_app_name_and_dependency() {
        let result = convert(sample_cwl()).unwrap();
        let steps = result["steps"].as_array().unwrap();
        let analyze = steps.iter().find(|s| s["step_name"] == "analyze").unwrap();
        assert_eq!(analyze["app"], "ComprehensiveGenomeAnalysis");
        assert_eq!(analyze["depends_on"][0], "annotate");
        assert_eq!(analyze["params"]["contigs"], "${steps.annotate.outputs.annotation_path}");
    }

    #[test]
    fn missing_run_field_is_rejected() {
        let cwl = json!({
            "class": "Workflow",
            "steps": {"a": {"in": {}, "out": []}},
        });
        let err = convert(cwl).unwrap_err();
        assert!(matches!(err, Error::CompileError(_)));
    }

    #[test]
    fn workspace_output_folder_falls_back_to_matching_input() {
        let cwl = json!({
            "class": "Workflow",
            "inputs": {"my_workspace_dir": {"type": "string"}},
            "steps": {},
        });
        let result = convert(cwl).unwrap();
        assert_eq!(result["base_context"]["workspace_output_folder"], "${my_workspace_dir}");
    }
}
