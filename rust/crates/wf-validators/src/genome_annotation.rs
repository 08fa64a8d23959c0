//! GenomeAnnotation step validator (spec.md §4.5).

use serde_json::Value;

use crate::{require_enum, require_non_empty_string, warn_if_output_path_suspicious, StepValidator};

const KNOWN_OUTPUTS: &[&str] = &["genome_object_path", "annotation_report_path"];
const GENETIC_CODES: &[&str] = &["1", "4", "11", "25"];

pub struct GenomeAnnotationValidator;

impl StepValidator for GenomeAnnotationValidator {
    fn known_outputs(&self) -> &'static [&'static str] {
        KNOWN_OUTPUTS
    }

    fn validate(&self, params: &Value) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        require_non_empty_string(params, "contigs", &mut errors);
        require_non_empty_string(params, "organism_name", &mut errors);
        require_enum(params, "domain", &["Bacteria", "Archaea", "Viral"], &mut errors);

        match params.get("genetic_code") {
            Some(Value::Number(n)) if GENETIC_CODES.contains(&n.to_string().as_str()) => {}
            Some(other) => errors.push(format!(
                "'genetic_code' value '{other}' is invalid; must be one of {GENETIC_CODES:?}"
            )),
            None => errors.push(format!(
                "'genetic_code' is required and must be one of {GENETIC_CODES:?}"
            )),
        }

        if let Some(w) = warn_if_output_path_suspicious(params) {
            warnings.push(w);
        }

        (warnings, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_annotation_step_passes() {
        let v = GenomeAnnotationValidator;
        let params = json!({
            "contigs": "${steps.assemble.outputs.contigs_path}",
            "organism_name": "Escherichia coli",
            "domain": "Bacteria",
            "genetic_code": 11,
        });
        let (_, errors) = v.validate(&params);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn invalid_domain_is_rejected() {
        let v = GenomeAnnotationValidator;
        let params = json!({
            "contigs": "x", "organism_name": "E. coli", "domain": "Fungi", "genetic_code": 11,
        });
        let (_, errors) = v.validate(&params);
        assert!(errors.iter().any(|e| e.contains("domain")));
    }
}
