//! Common Workflow Language import adapter (spec.md §5): converts a CWL
//! `Workflow` document (YAML or JSON) into the internal workflow JSON shape
//! that `wf_manager::WorkflowManager::register`/`validate`/`submit` accept.
//! Grounded in `original_source/cwl/{parser,converter,tool_mapper,
//! expression_translator}.py`.

mod converter;
mod expression;
mod parser;
mod tool_mapper;

use serde_json::Value;
use wf_core::Error;

pub use parser::detect_cwl_format;

/// Entry point exposed at `POST /api/v1/workflows/cwl` (spec.md §5). The
/// returned JSON is handed straight to
/// `wf_manager::WorkflowManager::register` — CWL import never bypasses the
/// compile pipeline.
pub struct CwlAdapter;

impl CwlAdapter {
    /// Parses `text` as CWL (YAML, falling back to JSON) and converts it.
    pub fn convert_text(text: &str) -> Result<Value, Error> {
        let cwl = parser::parse_cwl_text(text)?;
        Self::convert(cwl)
    }

    /// Converts an already-parsed CWL document.
    pub fn convert(cwl: Value) -> Result<Value, Error> {
        converter::convert(cwl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn convert_text_accepts_yaml() {
        let text = "class: Workflow\nlabel: demo\nsteps:\n  a:\n    run: genome-annotation.cwl\n    in: {}\n    out: []\n";
        let result = CwlAdapter::convert_text(text).unwrap();
        assert_eq!(result["workflow_name"], "demo");
        assert_eq!(result["steps"][0]["app"], "GenomeAnnotation");
    }

    #[test]
    fn convert_rejects_non_workflow_class() {
        let err = CwlAdapter::convert(json!({"class": "CommandLineTool"})).unwrap_err();
        assert!(matches!(err, Error::CompileError(_)));
    }
}
