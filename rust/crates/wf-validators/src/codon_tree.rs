//! CodonTree step validator and defaults (spec.md §4.5).

use serde_json::{json, Value};

use crate::{require_non_empty_array, DefaultsProvider, StepValidator};

const KNOWN_OUTPUTS: &[&str] = &["tree_path"];

pub struct CodonTreeValidator;

impl StepValidator for CodonTreeValidator {
    fn known_outputs(&self) -> &'static [&'static str] {
        KNOWN_OUTPUTS
    }

    fn validate(&self, params: &Value) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        require_non_empty_array(params, "genome_ids", &mut errors);

        if let Some(n) = params.get("number_of_genes") {
            match n.as_u64() {
                Some(v) if v > 0 => {}
                _ => errors.push("'number_of_genes' must be a positive integer".to_string()),
            }
        }

        (Vec::new(), errors)
    }
}

pub struct CodonTreeDefaults;

impl DefaultsProvider for CodonTreeDefaults {
    fn defaults(&self) -> Value {
        json!({ "number_of_genes": 100 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_non_empty_genome_ids() {
        let v = CodonTreeValidator;
        let (_, errors) = v.validate(&json!({}));
        assert!(errors.iter().any(|e| e.contains("genome_ids")));
    }

    #[test]
    fn valid_step_passes() {
        let v = CodonTreeValidator;
        let (_, errors) = v.validate(&json!({"genome_ids": ["83332.1", "208964.12"]}));
        assert!(errors.is_empty());
    }
}
