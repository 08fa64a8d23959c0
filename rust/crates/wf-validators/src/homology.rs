//! Homology/BLAST step validator and defaults (spec.md §4.5).

use serde_json::{json, Value};

use crate::{require_enum, require_non_empty_string, warn_if_output_path_suspicious, StepValidator};
use crate::DefaultsProvider;
use wf_rules::PRECOMPUTED_DB_ALLOWLIST;

const KNOWN_OUTPUTS: &[&str] = &["report_path", "alignment_path"];

pub struct HomologyValidator;

impl StepValidator for HomologyValidator {
    fn known_outputs(&self) -> &'static [&'static str] {
        KNOWN_OUTPUTS
    }

    fn validate(&self, params: &Value) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let input_source = require_enum(
            params,
            "input_source",
            &["fasta_data", "fasta_file", "id_list"],
            &mut errors,
        );
        match input_source {
            Some("fasta_data") => require_non_empty_string(params, "input_fasta_data", &mut errors),
            Some("fasta_file") => require_non_empty_string(params, "input_fasta_file", &mut errors),
            _ => {}
        }

        let db_source = require_enum(
            params,
            "db_source",
            &["fasta_data", "fasta_file", "id_list", "precomputed_database"],
            &mut errors,
        );
        if db_source == Some("precomputed_database") {
            if let Some(db) = params.get("db_precomputed_database").and_then(|v| v.as_str()) {
                if !PRECOMPUTED_DB_ALLOWLIST.contains(&db) {
                    errors.push(format!(
                        "db_precomputed_database '{db}' is invalid; must be one of {PRECOMPUTED_DB_ALLOWLIST:?}"
                    ));
                }
            }
        }

        if let Some(e_value) = params.get("e_value").and_then(|v| v.as_f64()) {
            if !(e_value > 0.0) {
                errors.push("'e_value' must be greater than 0".to_string());
            }
        }
        for field in ["min_coverage", "min_identity"] {
            if let Some(v) = params.get(field).and_then(|v| v.as_f64()) {
                if !(0.0..=100.0).contains(&v) {
                    errors.push(format!("'{field}' must be between 0 and 100"));
                }
            }
        }

        if let Some(w) = warn_if_output_path_suspicious(params) {
            warnings.push(w);
        }

        (warnings, errors)
    }
}

pub struct HomologyDefaults;

impl DefaultsProvider for HomologyDefaults {
    fn defaults(&self) -> Value {
        json!({
            "e_value": 1e-5,
            "min_coverage": 0.0,
            "min_identity": 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_precomputed_database_step_passes() {
        let v = HomologyValidator;
        let params = json!({
            "input_source": "fasta_data",
            "input_fasta_data": ">seq\nACGT",
            "db_source": "precomputed_database",
            "db_precomputed_database": "bacteria-archaea",
            "e_value": 1e-5,
        });
        let (warnings, errors) = v.validate(&params);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(warnings.is_empty());
    }

    #[test]
    fn invalid_e_value_is_rejected() {
        let v = HomologyValidator;
        let params = json!({
            "input_source": "fasta_data",
            "input_fasta_data": ">seq\nACGT",
            "db_source": "id_list",
            "db_id_list": ["83332.1"],
            "e_value": -1.0,
        });
        let (_, errors) = v.validate(&params);
        assert!(errors.iter().any(|e| e.contains("e_value")));
    }

    #[test]
    fn missing_fasta_data_for_fasta_data_source_is_rejected() {
        let v = HomologyValidator;
        let params = json!({"input_source": "fasta_data", "db_source": "id_list", "db_id_list": ["1"]});
        let (_, errors) = v.validate(&params);
        assert!(errors.iter().any(|e| e.contains("input_fasta_data")));
    }
}
