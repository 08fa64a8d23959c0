//! Type coercion (spec.md §4.4): service-specific coercers applied first,
//! then a fixed ordered list of pattern-based rules for any field no
//! service-specific rule already fired on. Coercion is non-destructive — a
//! value already of the target type is returned unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub enum Coercer {
    List,
    Integer,
    Float,
    Bool,
}

impl Coercer {
    fn apply(self, v: &Value) -> Value {
        match self {
            Coercer::List => match v {
                Value::Array(_) => v.clone(),
                Value::Null => Value::Array(vec![]),
                Value::String(s) if s.is_empty() => Value::Array(vec![]),
                other => Value::Array(vec![other.clone()]),
            },
            Coercer::Integer => match v {
                Value::Number(n) if n.is_i64() || n.is_u64() => v.clone(),
                Value::Number(n) => n
                    .as_f64()
                    .map(|f| json!(f.round() as i64))
                    .unwrap_or_else(|| v.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|i| json!(i))
                    .unwrap_or_else(|_| v.clone()),
                Value::Bool(b) => json!(if *b { 1 } else { 0 }),
                other => other.clone(),
            },
            Coercer::Float => match v {
                Value::Number(n) if n.as_f64().is_some() && n.is_f64() => v.clone(),
                Value::Number(n) => n.as_f64().map(|f| json!(f)).unwrap_or_else(|| v.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(|f| json!(f))
                    .unwrap_or_else(|_| v.clone()),
                other => other.clone(),
            },
            Coercer::Bool => match v {
                Value::Bool(_) => v.clone(),
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => json!(true),
                    "false" | "0" | "no" | "off" => json!(false),
                    _ => v.clone(),
                },
                Value::Number(n) => json!(n.as_i64().map(|i| i != 0).unwrap_or(true)),
                other => other.clone(),
            },
        }
    }
}

/// `{service -> {field -> coercer}}`, applied before the pattern-based
/// rules.
static SERVICE_COERCION: Lazy<HashMap<&'static str, HashMap<&'static str, Coercer>>> =
    Lazy::new(|| {
        HashMap::from([
            (
                "Homology",
                HashMap::from([
                    ("input_id_list", Coercer::List),
                    ("db_id_list", Coercer::List),
                    ("e_value", Coercer::Float),
                    ("min_coverage", Coercer::Float),
                    ("min_identity", Coercer::Float),
                ]),
            ),
            (
                "ComprehensiveGenomeAnalysis",
                HashMap::from([
                    ("paired_end_libs", Coercer::List),
                    ("single_end_libs", Coercer::List),
                    ("srr_ids", Coercer::List),
                    ("genetic_code", Coercer::Integer),
                ]),
            ),
            (
                "CreateGroup",
                HashMap::from([("job_result_paths", Coercer::List)]),
            ),
        ])
    });

/// Fixed, ordered pattern -> coercer rules (spec.md §4.4). The first
/// matching pattern wins, but only if no service-specific rule already
/// fired on that field.
static PATTERN_RULES: Lazy<Vec<(Regex, Coercer)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"_(id_list|ids|list)$").unwrap(), Coercer::List),
        (
            Regex::new(r"^(paired_end_libs|single_end_libs|srr_ids|genome_ids|feature_ids)$")
                .unwrap(),
            Coercer::List,
        ),
        (
            Regex::new(r"_(count|num|size|length)$").unwrap(),
            Coercer::Integer,
        ),
        (
            Regex::new(r"_(value|threshold|ratio|fraction|coverage|identity)$").unwrap(),
            Coercer::Float,
        ),
        (Regex::new(r"^(enable_|use_|skip_|is_)").unwrap(), Coercer::Bool),
    ]
});

pub fn coerce_fields(service: &str, params: &mut Value) {
    let Value::Object(map) = params else {
        return;
    };
    let service_rules = SERVICE_COERCION.get(service);
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        if let Some(rules) = service_rules {
            if let Some(coercer) = rules.get(key.as_str()) {
                let coerced = map.get(&key).map(|v| coercer.apply(v));
                if let Some(coerced) = coerced {
                    map.insert(key, coerced);
                }
                continue;
            }
        }
        for (re, coercer) in PATTERN_RULES.iter() {
            if re.is_match(&key) {
                let coerced = map.get(&key).map(|v| coercer.apply(v));
                if let Some(coerced) = coerced {
                    map.insert(key, coerced);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_specific_list_coercion_wraps_scalar() {
        let mut params = json!({"input_id_list": "genome.1234.5"});
        coerce_fields("Homology", &mut params);
        assert_eq!(params["input_id_list"], json!(["genome.1234.5"]));
    }

    #[test]
    fn already_correct_type_is_unchanged() {
        let mut params = json!({"input_id_list": ["a", "b"], "e_value": 1.5});
        coerce_fields("Homology", &mut params);
        assert_eq!(params["input_id_list"], json!(["a", "b"]));
        assert_eq!(params["e_value"], json!(1.5));
    }

    #[test]
    fn pattern_rule_coerces_unlisted_field_by_suffix() {
        let mut params = json!({"reference_genome_ids": "83332.1"});
        coerce_fields("GenomeAnnotation", &mut params);
        assert_eq!(params["reference_genome_ids"], json!(["83332.1"]));
    }

    #[test]
    fn integer_string_coerces_to_number() {
        let mut params = json!({"retry_count": "3"});
        coerce_fields("GenomeAnnotation", &mut params);
        assert_eq!(params["retry_count"], json!(3));
    }

    #[test]
    fn bool_pattern_coerces_string_flag() {
        let mut params = json!({"enable_debug": "true"});
        coerce_fields("GenomeAnnotation", &mut params);
        assert_eq!(params["enable_debug"], json!(true));
    }
}
