//! Maps a CWL tool reference (`run:`) to an internal app name (spec.md §5,
//! grounded in `original_source/cwl/tool_mapper.py`).

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Explicit overrides for CWL tool references that don't convert cleanly
/// under the naming convention below. Empty in the original (no shipped
/// mappings file ships with it either) — this is the seam where a
/// deployment would add entries for its own tool `run:` values.
static TOOL_MAPPINGS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(HashMap::new);

/// Maps a CWL tool reference to an app name: exact match, then filename,
/// then filename without `.cwl`, then convention-based kebab/snake ->
/// PascalCase conversion as a last resort.
pub fn map_tool_to_app(tool_ref: &str) -> String {
    if let Some(app) = TOOL_MAPPINGS.get(tool_ref) {
        return (*app).to_string();
    }

    let filename = tool_ref.rsplit('/').next().unwrap_or(tool_ref);
    if let Some(app) = TOOL_MAPPINGS.get(filename) {
        return (*app).to_string();
    }

    let base = filename.strip_suffix(".cwl").unwrap_or(filename);
    if let Some(app) = TOOL_MAPPINGS.get(base) {
        return (*app).to_string();
    }

    let app_name = convention_app_name(base);
    tracing::warn!(tool_ref, app_name, "no explicit CWL tool mapping, using convention-based name");
    app_name
}

/// Converts `kebab-case` or `snake_case` to `PascalCase`, e.g.
/// `genome-annotation` -> `GenomeAnnotation`.
fn convention_app_name(tool_name: &str) -> String {
    tool_name
        .replace('-', "_")
        .split('_')
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect()
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convention_converts_kebab_case() {
        assert_eq!(map_tool_to_app("genome-annotation"), "GenomeAnnotation");
    }

    #[test]
    fn convention_converts_snake_case() {
        assert_eq!(map_tool_to_app("comprehensive_genome_analysis.cwl"), "ComprehensiveGenomeAnalysis");
    }

    #[test]
    fn convention_strips_path_and_extension() {
        assert_eq!(map_tool_to_app("tools/homology-search.cwl"), "HomologySearch");
    }
}
