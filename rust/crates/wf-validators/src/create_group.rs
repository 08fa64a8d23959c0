//! CreateGroup step validator (spec.md §4.5, §4.12). `CreateGroup` is an
//! in-process step (it never reaches the Scheduler Gateway) but still
//! passes through Defaults/Validator at compile time like any other step.

use serde_json::Value;

use crate::{require_enum, require_non_empty_array, require_non_empty_string, StepValidator};

const KNOWN_OUTPUTS: &[&str] = &["group_path"];

pub struct CreateGroupValidator;

impl StepValidator for CreateGroupValidator {
    fn known_outputs(&self) -> &'static [&'static str] {
        KNOWN_OUTPUTS
    }

    fn validate(&self, params: &Value) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        require_non_empty_array(params, "job_result_paths", &mut errors);
        require_enum(params, "group_type", &["genome", "feature"], &mut errors);
        require_non_empty_string(params, "group_name", &mut errors);
        (Vec::new(), errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_step_passes() {
        let v = CreateGroupValidator;
        let params = json!({
            "job_result_paths": ["${steps.a.outputs.result_path}"],
            "group_type": "genome",
            "group_name": "my-group",
        });
        let (_, errors) = v.validate(&params);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn invalid_group_type_is_rejected() {
        let v = CreateGroupValidator;
        let params = json!({
            "job_result_paths": ["x"],
            "group_type": "dataset",
            "group_name": "g",
        });
        let (_, errors) = v.validate(&params);
        assert!(errors.iter().any(|e| e.contains("group_type")));
    }
}
