//! Identifier generation for workflow documents and in-process steps.
//!
//! `workflow_id` follows the wire format the original scheduler already
//! understands: `wf_<ms-since-epoch>_<8 hex chars>` (spec.md §3). It is a
//! plain `String` in the document model, not a typed wrapper, because it is
//! round-tripped verbatim through JSON-RPC payloads and the HTTP surface.

use rand::Rng;

const WORKFLOW_ID_PREFIX: &str = "wf";
const LOCAL_STEP_ID_PREFIX: &str = "local";

fn random_suffix(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Generate a fresh `workflow_id` for `register`/`plan`.
pub fn generate_workflow_id() -> String {
    let ms = chrono::Utc::now().timestamp_millis();
    format!("{WORKFLOW_ID_PREFIX}_{ms}_{}", random_suffix(8))
}

/// Generate a locally-assigned id for an in-process step (§4.12), which
/// never touches the external scheduler and so never receives a real
/// `task_id`.
pub fn generate_local_step_id() -> String {
    let ms = chrono::Utc::now().timestamp_millis();
    format!("{LOCAL_STEP_ID_PREFIX}_{ms}_{}", random_suffix(8))
}

/// True if `id` matches the `wf_<digits>_<hex>` shape expected on ingest
/// (used by `register` to decide whether a caller-supplied `workflow_id` is
/// well-formed enough to adopt, per spec.md §4.11).
pub fn is_well_formed_workflow_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("wf_") else {
        return false;
    };
    let mut parts = rest.splitn(2, '_');
    let (Some(ms), Some(suffix)) = (parts.next(), parts.next()) else {
        return false;
    };
    !ms.is_empty()
        && ms.chars().all(|c| c.is_ascii_digit())
        && !suffix.is_empty()
        && suffix.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_well_formed_ids() {
        let id = generate_workflow_id();
        assert!(is_well_formed_workflow_id(&id), "id was {id}");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(!is_well_formed_workflow_id("not-a-workflow-id"));
        assert!(!is_well_formed_workflow_id("wf_"));
        assert!(!is_well_formed_workflow_id("wf_abc_def"));
    }

    #[test]
    fn local_step_ids_are_distinguishable() {
        let id = generate_local_step_id();
        assert!(id.starts_with("local_"));
    }
}
