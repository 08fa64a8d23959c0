//! ComprehensiveGenomeAnalysis step validator and defaults (spec.md §4.5).
//!
//! The conditional "exactly one input family for `input_type`" rule lives
//! in `wf-rules` (spec.md §4.4); this validator additionally rejects
//! *conflicting* families being present at the same time, per spec.md §4.4:
//! "conflicting families must be absent."

use serde_json::{json, Value};

use crate::{require_enum, warn_if_output_path_suspicious, DefaultsProvider, StepValidator};

const KNOWN_OUTPUTS: &[&str] = &["genome_object_path", "full_genome_report_path"];

const READS_FAMILY: &[&str] = &["paired_end_libs", "single_end_libs", "srr_ids"];
const CONTIGS_FAMILY: &[&str] = &["contigs"];
const GENBANK_FAMILY: &[&str] = &["genbank_file"];

fn family_for(input_type: &str) -> &'static [&'static str] {
    match input_type {
        "reads" => READS_FAMILY,
        "contigs" => CONTIGS_FAMILY,
        "genbank" => GENBANK_FAMILY,
        _ => &[],
    }
}

fn present(params: &Value, field: &str) -> bool {
    match params.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

pub struct ComprehensiveGenomeAnalysisValidator;

impl StepValidator for ComprehensiveGenomeAnalysisValidator {
    fn known_outputs(&self) -> &'static [&'static str] {
        KNOWN_OUTPUTS
    }

    fn validate(&self, params: &Value) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let input_type = require_enum(params, "input_type", &["reads", "contigs", "genbank"], &mut errors);
        require_enum(params, "recipe", &["default", "fast", "full"], &mut errors);
        require_enum(params, "domain", &["Bacteria", "Archaea", "Viral"], &mut errors);

        if let Some(input_type) = input_type {
            let own_family = family_for(input_type);
            let all_families = [READS_FAMILY, CONTIGS_FAMILY, GENBANK_FAMILY];
            for family in all_families {
                if family == own_family {
                    continue;
                }
                for field in family {
                    if present(params, field) {
                        errors.push(format!(
                            "'{field}' conflicts with input_type={input_type} and must be absent"
                        ));
                    }
                }
            }
        }

        if let Some(w) = warn_if_output_path_suspicious(params) {
            warnings.push(w);
        }

        (warnings, errors)
    }
}

pub struct ComprehensiveGenomeAnalysisDefaults;

impl DefaultsProvider for ComprehensiveGenomeAnalysisDefaults {
    fn defaults(&self) -> Value {
        json!({
            "recipe": "default",
            "genetic_code": 11,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_input_with_srr_ids_passes() {
        let v = ComprehensiveGenomeAnalysisValidator;
        let params = json!({
            "input_type": "reads",
            "recipe": "default",
            "domain": "Bacteria",
            "srr_ids": ["SRR123"],
        });
        let (_, errors) = v.validate(&params);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn conflicting_families_are_rejected() {
        let v = ComprehensiveGenomeAnalysisValidator;
        let params = json!({
            "input_type": "contigs",
            "recipe": "default",
            "domain": "Bacteria",
            "contigs": "${steps.a.outputs.contigs_path}",
            "srr_ids": ["SRR123"],
        });
        let (_, errors) = v.validate(&params);
        assert!(errors.iter().any(|e| e.contains("srr_ids")));
    }
}
