//! Per-service field aliases (spec.md §4.4): `{alias -> canonical}`. If the
//! alias is present and the canonical is absent, the value is moved.
//! Idempotent: once moved, the alias key no longer exists.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

static FIELD_ALIASES: Lazy<HashMap<&'static str, HashMap<&'static str, &'static str>>> =
    Lazy::new(|| {
        HashMap::from([
            (
                "Homology",
                HashMap::from([
                    ("database_source", "db_source"),
                    ("database", "db_precomputed_database"),
                    ("query_type", "input_source"),
                    ("input_fasta_file", "input_fasta_data"),
                    ("query_ids", "input_id_list"),
                    ("database_ids", "db_id_list"),
                ]),
            ),
            (
                "ComprehensiveGenomeAnalysis",
                HashMap::from([
                    ("sequencing_type", "input_type"),
                    ("recipe_name", "recipe"),
                    ("taxonomy_domain", "domain"),
                    ("translation_table", "genetic_code"),
                ]),
            ),
            (
                "GenomeAnnotation",
                HashMap::from([
                    ("taxonomy_domain", "domain"),
                    ("scientific_name", "organism_name"),
                ]),
            ),
            (
                "CreateGroup",
                HashMap::from([("results", "job_result_paths"), ("name", "group_name")]),
            ),
        ])
    });

pub fn apply_aliases(service: &str, params: &mut Value) {
    let Value::Object(map) = params else {
        return;
    };
    let Some(aliases) = FIELD_ALIASES.get(service) else {
        return;
    };
    for (alias, canonical) in aliases {
        if let Some(value) = map.get(*alias).cloned() {
            if !map.contains_key(*canonical) {
                map.insert((*canonical).to_string(), value);
            }
            map.remove(*alias);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alias_moves_value_when_canonical_absent() {
        let mut params = json!({"database_source": "precomputed_database"});
        apply_aliases("Homology", &mut params);
        assert_eq!(params["db_source"], "precomputed_database");
        assert!(params.get("database_source").is_none());
    }

    #[test]
    fn alias_is_idempotent_and_never_overwrites() {
        let mut params = json!({"database_source": "id_list", "db_source": "precomputed_database"});
        apply_aliases("Homology", &mut params);
        assert_eq!(params["db_source"], "precomputed_database");
        assert!(params.get("database_source").is_none());

        let mut again = params.clone();
        apply_aliases("Homology", &mut again);
        assert_eq!(again, params);
    }
}
