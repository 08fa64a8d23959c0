//! Field-Coercion & Rule Registry (spec.md §4.4): a pure, table-driven
//! transformation applied before schema validation. Orchestrates, in the
//! order the compile pipeline expects (spec.md §4.7 step 5): field aliases
//! -> enum normalization -> type coercion -> conditional-required
//! validation (batched).

pub mod aliases;
pub mod apps;
pub mod coercion;
pub mod conditional;
pub mod enums;

pub use apps::normalize_app;
pub use conditional::PRECOMPUTED_DB_ALLOWLIST;

use serde_json::Value;

/// Run the full registry pipeline for one step's `params`, given its
/// already-normalized `service` (canonical app name). Returns the batch of
/// conditional-rule violations, if any; aliasing/enum/coercion never fail.
pub fn apply(service: &str, params: &mut Value) -> Vec<String> {
    aliases::apply_aliases(service, params);
    enums::apply_enum_normalization(service, params);
    coercion::coerce_fields(service, params);
    conditional::check_conditional_rules(service, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_pipeline_normalizes_and_validates_blast_step() {
        let mut params = json!({
            "database_source": "precomputed_database",
            "database": "patric",
            "query_ids": "83332.1",
        });
        let errors = apply("Homology", &mut params);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(params["db_source"], "precomputed_database");
        assert_eq!(params["db_precomputed_database"], "bacteria-archaea");
        assert_eq!(params["input_id_list"], json!(["83332.1"]));
    }

    #[test]
    fn full_pipeline_rejects_unknown_precomputed_database() {
        let mut params = json!({
            "db_source": "precomputed_database",
            "db_precomputed_database": "unknown-db",
        });
        let errors = apply("Homology", &mut params);
        assert_eq!(errors.len(), 1);
    }
}
