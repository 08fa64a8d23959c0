//! Translates CWL `$(...)` expressions into the internal `${...}` template
//! form (spec.md §5, grounded in
//! `original_source/cwl/expression_translator.py`).

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static CWL_EXPRESSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\(([^)]+)\)").expect("static regex"));
static STEP_OUTPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^steps\.([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)$").expect("static regex"));
static INPUT_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^inputs\.([A-Za-z_][A-Za-z0-9_]*)$").expect("static regex"));
static BARE_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

/// Translates every `$(...)` expression found in `expr` into `${...}` form.
/// Strings with no CWL expression pass through unchanged.
pub fn translate_expression(expr: &str) -> String {
    if !expr.contains("$(") {
        return expr.to_string();
    }
    let mut out = expr.to_string();
    for caps in CWL_EXPRESSION.captures_iter(expr) {
        let whole = caps[0].to_string();
        let translated = translate_single(caps[1].trim());
        out = out.replace(&whole, &translated);
    }
    out
}

fn translate_single(expr: &str) -> String {
    if let Some(caps) = STEP_OUTPUT.captures(expr) {
        return format!("${{steps.{}.outputs.{}}}", &caps[1], &caps[2]);
    }
    if let Some(caps) = INPUT_REF.captures(expr) {
        return format!("${{{}}}", &caps[1]);
    }
    if let Some(name) = expr.strip_prefix("self.") {
        return format!("${{{name}}}");
    }
    if BARE_IDENT.is_match(expr) {
        return format!("${{{expr}}}");
    }
    tracing::warn!(expression = %expr, "complex CWL expression translated verbatim, may need manual review");
    format!("${{{expr}}}")
}

/// Extracts the set of step names a step's `in:` mapping depends on, by
/// scanning every string value for `$(steps.NAME.output)` references.
pub fn extract_step_dependencies(step_inputs: &Value) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    collect_dependencies(step_inputs, &mut deps);
    deps
}

fn collect_dependencies(value: &Value, deps: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for caps in CWL_EXPRESSION.captures_iter(s) {
                if let Some(step_caps) = STEP_OUTPUT.captures(caps[1].trim()) {
                    deps.insert(step_caps[1].to_string());
                }
            }
        }
        Value::Object(o) => o.values().for_each(|v| collect_dependencies(v, deps)),
        Value::Array(a) => a.iter().for_each(|v| collect_dependencies(v, deps)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn translates_step_output_reference() {
        assert_eq!(
            translate_expression("$(steps.annotate.contigs_path)"),
            "${steps.annotate.outputs.contigs_path}"
        );
    }

    #[test]
    fn translates_input_reference() {
        assert_eq!(translate_expression("$(inputs.genome_id)"), "${genome_id}");
    }

    #[test]
    fn translates_self_reference() {
        assert_eq!(translate_expression("$(self.output_path)"), "${output_path}");
    }

    #[test]
    fn passes_through_plain_strings() {
        assert_eq!(translate_expression("Bacteria"), "Bacteria");
    }

    #[test]
    fn extract_step_dependencies_scans_nested_structures() {
        let inputs = json!({
            "contigs": "$(steps.assemble.contigs_path)",
            "nested": {"ref_genome": "$(steps.download.genome_path)"},
        });
        let deps = extract_step_dependencies(&inputs);
        assert_eq!(deps.len(), 2);
        assert!(deps.contains("assemble"));
        assert!(deps.contains("download"));
    }
}
