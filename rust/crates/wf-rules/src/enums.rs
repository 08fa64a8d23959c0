//! Enum normalization (spec.md §4.4): for select services, map
//! lowercase/alias variants to canonical enum values.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

type FieldEnumTable = HashMap<&'static str, HashMap<&'static str, &'static str>>;

static ENUM_ALIASES: Lazy<HashMap<&'static str, FieldEnumTable>> = Lazy::new(|| {
    HashMap::from([
        (
            "Homology",
            HashMap::from([
                (
                    "db_precomputed_database",
                    HashMap::from([
                        ("patric", "bacteria-archaea"),
                        ("bacteria", "bacteria-archaea"),
                        ("archaea", "bacteria-archaea"),
                        ("bacteria-archaea", "bacteria-archaea"),
                        ("bacteria_archaea", "bacteria-archaea"),
                        ("viral", "viral-reference"),
                        ("virus", "viral-reference"),
                        ("viral-reference", "viral-reference"),
                        ("viral_reference", "viral-reference"),
                    ]),
                ),
                (
                    "input_source",
                    HashMap::from([
                        ("idlist", "id_list"),
                        ("id-list", "id_list"),
                        ("id_list", "id_list"),
                        ("fasta", "fasta_data"),
                        ("fasta_data", "fasta_data"),
                        ("fasta_file", "fasta_file"),
                    ]),
                ),
                (
                    "db_source",
                    HashMap::from([
                        ("idlist", "id_list"),
                        ("id-list", "id_list"),
                        ("id_list", "id_list"),
                        ("precomputed", "precomputed_database"),
                        ("precomputed_database", "precomputed_database"),
                        ("precomputed-database", "precomputed_database"),
                        ("fasta", "fasta_data"),
                        ("fasta_data", "fasta_data"),
                    ]),
                ),
            ]),
        ),
        (
            "ComprehensiveGenomeAnalysis",
            HashMap::from([
                (
                    "input_type",
                    HashMap::from([
                        ("read", "reads"),
                        ("reads", "reads"),
                        ("contig", "contigs"),
                        ("contigs", "contigs"),
                        ("genbank", "genbank"),
                        ("gbk", "genbank"),
                        ("gbk_file", "genbank"),
                    ]),
                ),
                (
                    "domain",
                    HashMap::from([
                        ("bacteria", "Bacteria"),
                        ("archaea", "Archaea"),
                        ("viral", "Viral"),
                        ("virus", "Viral"),
                    ]),
                ),
                (
                    "recipe",
                    HashMap::from([
                        ("default", "default"),
                        ("fast", "fast"),
                        ("full", "full"),
                        ("comprehensive", "full"),
                    ]),
                ),
            ]),
        ),
    ])
});

/// Normalize enum-like fields for `service`. Values that are not strings, or
/// strings not found in the alias table, are left untouched so the Step
/// Validator layer can reject them with a precise error.
pub fn apply_enum_normalization(service: &str, params: &mut Value) {
    let Value::Object(map) = params else {
        return;
    };
    let Some(fields) = ENUM_ALIASES.get(service) else {
        return;
    };
    for (field, variants) in fields {
        let Some(Value::String(current)) = map.get(*field) else {
            continue;
        };
        if let Some(canonical) = variants.get(current.to_ascii_lowercase().as_str()) {
            map.insert((*field).to_string(), Value::String((*canonical).to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn precomputed_database_alias_normalizes() {
        let mut params = json!({"db_precomputed_database": "patric"});
        apply_enum_normalization("Homology", &mut params);
        assert_eq!(params["db_precomputed_database"], "bacteria-archaea");
    }

    #[test]
    fn unknown_variant_is_left_for_validator_to_reject() {
        let mut params = json!({"db_precomputed_database": "unknown-db"});
        apply_enum_normalization("Homology", &mut params);
        assert_eq!(params["db_precomputed_database"], "unknown-db");
    }

    #[test]
    fn cga_input_type_normalizes_case_insensitively() {
        let mut params = json!({"input_type": "Reads"});
        apply_enum_normalization("ComprehensiveGenomeAnalysis", &mut params);
        assert_eq!(params["input_type"], "reads");
    }
}
