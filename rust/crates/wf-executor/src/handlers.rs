//! In-Process Step Handler for group creation (spec.md §4.12). This app
//! kind never reaches the external scheduler; it runs synchronously inside
//! the tick that submits it.

use serde_json::Value;
use wf_core::Error;

pub const CREATE_GROUP_APP: &str = "CreateGroup";

/// Outcome of `create_groups_from_job_results` (spec.md §4.12): the
/// external group-creation library's interface, named here so the executor
/// can match on it without depending on a concrete implementation.
pub struct GroupCreationResult {
    pub success: bool,
    pub group_path: Option<String>,
    pub ids_count: Option<u64>,
    pub jobs_processed: Option<u64>,
    pub jobs_skipped: Option<u64>,
    pub error: Option<String>,
}

/// Abstraction over the external group-creation library so the executor can
/// be tested without the real one.
#[async_trait::async_trait]
pub trait GroupCreationLibrary: Send + Sync {
    async fn create_groups_from_job_results(
        &self,
        job_result_paths: &[String],
        group_type: &str,
        group_name: &str,
        service_type: Option<&str>,
        token: Option<&str>,
        output_group_path: Option<&str>,
    ) -> GroupCreationResult;
}

/// Reads the resolved params for a `CreateGroup` step (spec.md §4.12 step 4:
/// "Require `job_result_paths`, `group_type ∈ {genome, feature}`,
/// `group_name`"). Defensive: the compile-time validator already enforces
/// this, but the executor re-derives it from the runtime-resolved document,
/// which may differ if upstream outputs changed the values.
pub fn extract_group_creation_params(params: &Value) -> Result<(Vec<String>, String, String), Error> {
    let job_result_paths: Vec<String> = params
        .get("job_result_paths")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .filter(|v: &Vec<String>| !v.is_empty())
        .ok_or_else(|| Error::Validation {
            message: "'job_result_paths' is required and must be a non-empty array".to_string(),
            field: Some("job_result_paths".to_string()),
        })?;

    let group_type = params
        .get("group_type")
        .and_then(|v| v.as_str())
        .filter(|v| matches!(*v, "genome" | "feature"))
        .ok_or_else(|| Error::Validation {
            message: "'group_type' is required and must be 'genome' or 'feature'".to_string(),
            field: Some("group_type".to_string()),
        })?
        .to_string();

    let group_name = params
        .get("group_name")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Validation {
            message: "'group_name' is required and must be a non-empty string".to_string(),
            field: Some("group_name".to_string()),
        })?
        .to_string();

    Ok((job_result_paths, group_type, group_name))
}

/// Runs the in-process handler end to end (spec.md §4.12 steps 3-6) and
/// returns the `outputs.group_path` to write on success, or the error
/// message to record on failure.
pub async fn run_create_group(
    library: &dyn GroupCreationLibrary,
    params: &Value,
    token: Option<&str>,
) -> Result<String, String> {
    let (paths, group_type, group_name) = match extract_group_creation_params(params) {
        Ok(v) => v,
        Err(e) => return Err(e.to_string()),
    };
    let service_type = params.get("service_type").and_then(|v| v.as_str());
    let output_group_path = params.get("output_group_path").and_then(|v| v.as_str());

    let result = library
        .create_groups_from_job_results(&paths, &group_type, &group_name, service_type, token, output_group_path)
        .await;

    if result.success {
        result.group_path.ok_or_else(|| "group creation reported success but returned no group_path".to_string())
    } else {
        Err(result.error.unwrap_or_else(|| "group creation failed with no error detail".to_string()))
    }
}

/// An in-memory fake for tests: always succeeds, echoing back a
/// deterministic path.
pub struct FakeGroupCreationLibrary;

#[async_trait::async_trait]
impl GroupCreationLibrary for FakeGroupCreationLibrary {
    async fn create_groups_from_job_results(
        &self,
        job_result_paths: &[String],
        _group_type: &str,
        group_name: &str,
        _service_type: Option<&str>,
        _token: Option<&str>,
        output_group_path: Option<&str>,
    ) -> GroupCreationResult {
        GroupCreationResult {
            success: true,
            group_path: Some(output_group_path.map(str::to_string).unwrap_or_else(|| format!("/groups/{group_name}"))),
            ids_count: Some(job_result_paths.len() as u64),
            jobs_processed: Some(job_result_paths.len() as u64),
            jobs_skipped: Some(0),
            error: None,
        }
    }
}

/// Production default when no group-creation backend is configured
/// (spec.md §4.12; grounded in
/// `original_source/executor/create_group_handler.py`'s
/// `GROUPS_MODULE_AVAILABLE = False` branch — the original's own group
/// library is an external, deployment-specific module it imports
/// optionally and fails closed without). Every `CreateGroup` step fails
/// with a clear, consistent error rather than panicking or silently
/// no-op-ing.
pub struct UnavailableGroupCreationLibrary;

#[async_trait::async_trait]
impl GroupCreationLibrary for UnavailableGroupCreationLibrary {
    async fn create_groups_from_job_results(
        &self,
        _job_result_paths: &[String],
        _group_type: &str,
        _group_name: &str,
        _service_type: Option<&str>,
        _token: Option<&str>,
        _output_group_path: Option<&str>,
    ) -> GroupCreationResult {
        GroupCreationResult {
            success: false,
            group_path: None,
            ids_count: None,
            jobs_processed: None,
            jobs_skipped: None,
            error: Some("group-creation backend is not configured for this deployment".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn successful_run_returns_group_path() {
        let params = json!({
            "job_result_paths": ["/jobs/a", "/jobs/b"],
            "group_type": "genome",
            "group_name": "my-group",
        });
        let path = run_create_group(&FakeGroupCreationLibrary, &params, None).await.unwrap();
        assert_eq!(path, "/groups/my-group");
    }

    #[tokio::test]
    async fn missing_job_result_paths_fails_before_calling_library() {
        let params = json!({"group_type": "genome", "group_name": "g"});
        let err = run_create_group(&FakeGroupCreationLibrary, &params, None).await.unwrap_err();
        assert!(err.contains("job_result_paths"));
    }
}
