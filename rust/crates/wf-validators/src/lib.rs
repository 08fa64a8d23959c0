//! Step Validators and the companion Defaults registry (spec.md §4.5).
//!
//! Each validator is registered against exactly one canonical `app` id and
//! produces `(params', warnings[], errors[])`. Defaults are merged
//! non-destructively before validation runs; Defaults and Validators are
//! independent registries — a service may register either or both.

mod codon_tree;
mod comprehensive_genome_analysis;
mod create_group;
mod genome_annotation;
mod homology;

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Result of running one step through its registered validator.
pub struct ValidationOutcome {
    pub params: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// A strict, per-application typed-schema check (spec.md §4.5).
pub trait StepValidator: Send + Sync {
    /// The known output names this app can declare; used to warn on
    /// unrecognized `outputs` entries.
    fn known_outputs(&self) -> &'static [&'static str];

    /// Strict field-level validation. Implementations should not mutate
    /// `params` beyond what the typed schema requires (defaults are applied
    /// separately before this runs).
    fn validate(&self, params: &Value) -> (Vec<String>, Vec<String>);
}

/// Non-destructive default values for an application: keys present in the
/// input are never overwritten; nested objects are merged key-wise.
pub trait DefaultsProvider: Send + Sync {
    fn defaults(&self) -> Value;
}

static VALIDATORS: Lazy<HashMap<&'static str, Box<dyn StepValidator>>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, Box<dyn StepValidator>> = HashMap::new();
    m.insert("Homology", Box::new(homology::HomologyValidator));
    m.insert(
        "GenomeAnnotation",
        Box::new(genome_annotation::GenomeAnnotationValidator),
    );
    m.insert(
        "ComprehensiveGenomeAnalysis",
        Box::new(comprehensive_genome_analysis::ComprehensiveGenomeAnalysisValidator),
    );
    m.insert("CodonTree", Box::new(codon_tree::CodonTreeValidator));
    m.insert("CreateGroup", Box::new(create_group::CreateGroupValidator));
    m
});

static DEFAULTS: Lazy<HashMap<&'static str, Box<dyn DefaultsProvider>>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, Box<dyn DefaultsProvider>> = HashMap::new();
    m.insert("Homology", Box::new(homology::HomologyDefaults));
    m.insert(
        "ComprehensiveGenomeAnalysis",
        Box::new(comprehensive_genome_analysis::ComprehensiveGenomeAnalysisDefaults),
    );
    m.insert("CodonTree", Box::new(codon_tree::CodonTreeDefaults));
    m
});

/// Merge `defaults` into `params` non-destructively: keys already present in
/// `params` (at any nesting level) are left untouched.
pub fn merge_defaults(defaults: &Value, params: &mut Value) {
    let (Value::Object(d), Value::Object(p)) = (defaults, params) else {
        return;
    };
    for (key, default_value) in d {
        match p.get_mut(key) {
            None => {
                p.insert(key.clone(), default_value.clone());
            }
            Some(existing) if existing.is_object() && default_value.is_object() => {
                merge_defaults(default_value, existing);
            }
            Some(_) => {}
        }
    }
}

/// Apply registered defaults (if any) for `app`, then run the registered
/// validator (if any), then check `outputs` against the app's declared
/// `known_outputs` (spec.md §4.5 point 4). Unknown apps pass through with no
/// warnings/errors — the registry is opt-in per spec.md §9 ("registries
/// instead of inheritance").
pub fn apply_defaults_and_validate(
    app: &str,
    mut params: Value,
    outputs: Option<&BTreeMap<String, String>>,
) -> ValidationOutcome {
    if let Some(defaults) = DEFAULTS.get(app) {
        let d = defaults.defaults();
        merge_defaults(&d, &mut params);
    }
    let mut outcome = match VALIDATORS.get(app) {
        Some(validator) => {
            let (warnings, errors) = validator.validate(&params);
            ValidationOutcome {
                params,
                warnings,
                errors,
            }
        }
        None => ValidationOutcome {
            params,
            warnings: Vec::new(),
            errors: Vec::new(),
        },
    };
    if let Some(validator) = VALIDATORS.get(app) {
        outcome
            .warnings
            .extend(check_output_declarations(outputs, validator.known_outputs()));
    }
    outcome
}

/// Verify that any declared `outputs` entries are known outputs for `app`
/// (warn-only when unknown) and reference `${params.output_path}` or
/// `${params.output_file}` (warn otherwise). Shared across validators since
/// the check is identical for every application (spec.md §4.5 point 4).
pub(crate) fn check_output_declarations(
    outputs: Option<&BTreeMap<String, String>>,
    known_outputs: &[&str],
) -> Vec<String> {
    let mut warnings = Vec::new();
    let Some(outputs) = outputs else {
        return warnings;
    };
    for (name, template) in outputs {
        if !known_outputs.is_empty() && !known_outputs.contains(&name.as_str()) {
            warnings.push(format!("output '{name}' is not a known output for this app"));
        }
        if !template.contains("${params.output_path}") && !template.contains("${params.output_file}") {
            warnings.push(format!(
                "output '{name}' does not reference ${{params.output_path}} or ${{params.output_file}}"
            ));
        }
    }
    warnings
}

/// Warn when `output_path` is present but neither a template reference nor
/// an absolute path (spec.md §4.5 point 3).
pub(crate) fn warn_if_output_path_suspicious(params: &Value) -> Option<String> {
    let path = params.get("output_path")?.as_str()?;
    if path.starts_with("${") || path.starts_with('/') {
        return None;
    }
    Some(format!(
        "output_path '{path}' is neither a template reference nor an absolute path"
    ))
}

pub(crate) fn require_non_empty_string(params: &Value, field: &str, errors: &mut Vec<String>) {
    match params.get(field).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => {}
        _ => errors.push(format!("'{field}' is required and must be a non-empty string")),
    }
}

pub(crate) fn require_non_empty_array(params: &Value, field: &str, errors: &mut Vec<String>) {
    match params.get(field) {
        Some(Value::Array(a)) if !a.is_empty() => {}
        _ => errors.push(format!("'{field}' is required and must be a non-empty array")),
    }
}

pub(crate) fn require_enum<'a>(
    params: &'a Value,
    field: &str,
    allowed: &[&str],
    errors: &mut Vec<String>,
) -> Option<&'a str> {
    match params.get(field).and_then(|v| v.as_str()) {
        Some(v) if allowed.contains(&v) => Some(v),
        Some(v) => {
            errors.push(format!(
                "'{field}' value '{v}' is invalid; must be one of {allowed:?}"
            ));
            None
        }
        None => {
            errors.push(format!("'{field}' is required and must be one of {allowed:?}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_defaults_never_overwrites_present_keys() {
        let defaults = json!({"e_value": 1e-5, "nested": {"a": 1, "b": 2}});
        let mut params = json!({"e_value": 1e-10, "nested": {"a": 99}});
        merge_defaults(&defaults, &mut params);
        assert_eq!(params["e_value"], 1e-10);
        assert_eq!(params["nested"]["a"], 99);
        assert_eq!(params["nested"]["b"], 2);
    }

    #[test]
    fn unknown_app_passes_through_untouched() {
        let outcome = apply_defaults_and_validate("SomeUnregisteredApp", json!({"x": 1}), None);
        assert!(outcome.errors.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.params, json!({"x": 1}));
    }

    #[test]
    fn unknown_output_name_warns_for_registered_app() {
        let outputs = BTreeMap::from([(
            "not_a_real_output".to_string(),
            "${params.output_path}/${params.output_file}".to_string(),
        )]);
        let outcome = apply_defaults_and_validate(
            "CreateGroup",
            json!({
                "job_result_paths": ["x"],
                "group_type": "genome",
                "group_name": "g",
            }),
            Some(&outputs),
        );
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("not_a_real_output") && w.contains("not a known output")));
    }
}
