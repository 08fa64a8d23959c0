//! Conditional-required rules (spec.md §4.4): `{service -> [rule]}`. Every
//! rule whose condition matches must have all `required` fields present
//! (non-empty) and at least one of `required_one_of` present. Errors from
//! this layer are early errors, reported as a batch.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

/// Allowlisted `db_precomputed_database` values (spec.md §4.4, §8). Shared
/// with the Executor's defensive re-check at dispatch time (spec.md §4.10).
pub const PRECOMPUTED_DB_ALLOWLIST: &[&str] = &["bacteria-archaea", "viral-reference"];

pub struct ConditionalRule {
    pub condition_field: &'static str,
    pub equals: &'static str,
    pub required: &'static [&'static str],
    pub required_one_of: &'static [&'static str],
    pub message: &'static str,
}

static CONDITIONAL_RULES: Lazy<HashMap<&'static str, Vec<ConditionalRule>>> = Lazy::new(|| {
    HashMap::from([
        (
            "Homology",
            vec![
                ConditionalRule {
                    condition_field: "db_source",
                    equals: "precomputed_database",
                    required: &["db_precomputed_database"],
                    required_one_of: &[],
                    message: "db_source=precomputed_database requires db_precomputed_database to be one of bacteria-archaea, viral-reference",
                },
                ConditionalRule {
                    condition_field: "input_source",
                    equals: "id_list",
                    required: &["input_id_list"],
                    required_one_of: &[],
                    message: "input_source=id_list requires a non-empty input_id_list",
                },
                ConditionalRule {
                    condition_field: "db_source",
                    equals: "id_list",
                    required: &["db_id_list"],
                    required_one_of: &[],
                    message: "db_source=id_list requires a non-empty db_id_list",
                },
            ],
        ),
        (
            "ComprehensiveGenomeAnalysis",
            vec![
                ConditionalRule {
                    condition_field: "input_type",
                    equals: "reads",
                    required: &[],
                    required_one_of: &["paired_end_libs", "single_end_libs", "srr_ids"],
                    message: "input_type=reads requires one of paired_end_libs, single_end_libs, srr_ids",
                },
                ConditionalRule {
                    condition_field: "input_type",
                    equals: "contigs",
                    required: &["contigs"],
                    required_one_of: &[],
                    message: "input_type=contigs requires contigs",
                },
                ConditionalRule {
                    condition_field: "input_type",
                    equals: "genbank",
                    required: &["genbank_file"],
                    required_one_of: &[],
                    message: "input_type=genbank requires genbank_file",
                },
            ],
        ),
    ])
});

fn is_present_non_empty(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

/// Check all conditional rules registered for `service` against `params`,
/// returning every violation (not just the first).
pub fn check_conditional_rules(service: &str, params: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(rules) = CONDITIONAL_RULES.get(service) else {
        return errors;
    };
    let Value::Object(map) = params else {
        return errors;
    };

    for rule in rules {
        let condition_matches = map
            .get(rule.condition_field)
            .and_then(|v| v.as_str())
            .map(|v| v == rule.equals)
            .unwrap_or(false);
        if !condition_matches {
            continue;
        }

        for required in rule.required {
            if !is_present_non_empty(map.get(*required)) {
                errors.push(rule.message.to_string());
            }
        }
        if !rule.required_one_of.is_empty()
            && !rule.required_one_of.iter().any(|f| is_present_non_empty(map.get(*f)))
        {
            errors.push(rule.message.to_string());
        }

        // Cross-field allowlist enforced alongside the presence check
        // (spec.md §4.4): `db_source == precomputed_database` additionally
        // constrains `db_precomputed_database` to a fixed set.
        if rule.condition_field == "db_source" && rule.equals == "precomputed_database" {
            if let Some(db) = map.get("db_precomputed_database").and_then(|v| v.as_str()) {
                if !PRECOMPUTED_DB_ALLOWLIST.contains(&db) {
                    errors.push(format!(
                        "db_precomputed_database '{db}' is not allowed; must be one of {PRECOMPUTED_DB_ALLOWLIST:?}"
                    ));
                }
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn precomputed_database_requires_allowlisted_value() {
        let params = json!({"db_source": "precomputed_database", "db_precomputed_database": "patric"});
        let errors = check_conditional_rules("Homology", &params);
        assert_eq!(errors.len(), 1, "patric should already be normalized upstream, so it fails the allowlist here: {errors:?}");
    }

    #[test]
    fn precomputed_database_passes_with_allowlisted_value() {
        let params = json!({"db_source": "precomputed_database", "db_precomputed_database": "bacteria-archaea"});
        assert!(check_conditional_rules("Homology", &params).is_empty());
    }

    #[test]
    fn missing_required_field_reported() {
        let params = json!({"db_source": "id_list"});
        let errors = check_conditional_rules("Homology", &params);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn required_one_of_satisfied_by_any_member() {
        let params = json!({"input_type": "reads", "srr_ids": ["SRR123"]});
        assert!(check_conditional_rules("ComprehensiveGenomeAnalysis", &params).is_empty());
    }

    #[test]
    fn required_one_of_violated_when_none_present() {
        let params = json!({"input_type": "reads"});
        let errors = check_conditional_rules("ComprehensiveGenomeAnalysis", &params);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn batches_multiple_violations() {
        let params = json!({
            "db_source": "precomputed_database",
            "db_precomputed_database": "unknown-db",
        });
        // required present (non-empty) but allowlist violated -> one error
        let errors = check_conditional_rules("Homology", &params);
        assert_eq!(errors.len(), 1);
    }
}
