//! Scheduler Gateway (spec.md §4.2): a JSON-RPC 2.0 client over HTTP for the
//! external `AppService` job scheduler. Two operations: `submit` (wire
//! method `AppService.start_app2`) and `query` (wire method
//! `AppService.query_tasks`).

mod rpc;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use wf_core::Error;

pub use rpc::{TaskInfo, TaskStatus};

/// Abstraction the Executor drives (spec.md §4.10); lets tests swap in a
/// fake without a live scheduler.
#[async_trait]
pub trait SchedulerGateway: Send + Sync {
    /// `AppService.start_app2`. Returns the assigned `task_id`.
    async fn submit(&self, app: &str, params: &Value, token: Option<&str>) -> Result<String, Error>;

    /// `AppService.query_tasks`. Missing task ids in the result are simply
    /// absent from the returned map (spec.md §4.10: "treated as no-op").
    async fn query(&self, task_ids: &[String], token: Option<&str>) -> Result<HashMap<String, TaskInfo>, Error>;
}

/// Real gateway speaking JSON-RPC 2.0 over HTTP.
pub struct AppServiceGateway {
    client: reqwest::Client,
    endpoint: String,
    base_url: String,
    /// When `true` and no token is supplied, `submit` fabricates a local
    /// task id instead of making a network call (spec.md §4.2:
    /// "placeholder mode... exists only for offline testing and MUST be
    /// configurable off in production").
    placeholder_mode: bool,
}

impl AppServiceGateway {
    pub fn new(endpoint: impl Into<String>, base_url: impl Into<String>, placeholder_mode: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            client,
            endpoint: endpoint.into(),
            base_url: base_url.into(),
            placeholder_mode,
        }
    }

    /// The raw token sent as `Authorization`, stripped of a leading `Bearer
    /// ` if present (spec.md §4.2: "these services expect the raw token").
    fn normalize_token(token: &str) -> &str {
        token.strip_prefix("Bearer ").unwrap_or(token)
    }
}

#[async_trait]
impl SchedulerGateway for AppServiceGateway {
    async fn submit(&self, app: &str, params: &Value, token: Option<&str>) -> Result<String, Error> {
        let Some(token) = token else {
            if !self.placeholder_mode {
                return Err(Error::Validation {
                    message: "no auth_token on workflow and placeholder mode is disabled".to_string(),
                    field: Some("auth_token".to_string()),
                });
            }
            let task_id = wf_core::generate_local_step_id();
            tracing::warn!(app, task_id, "submitting in placeholder mode: no auth_token present");
            return Ok(task_id);
        };

        let body = rpc::start_app2_request(app, params, &self.base_url);
        let resp = rpc::send(&self.client, &self.endpoint, Self::normalize_token(token), &body).await?;
        rpc::extract_task_id(resp)
    }

    async fn query(&self, task_ids: &[String], token: Option<&str>) -> Result<HashMap<String, TaskInfo>, Error> {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let Some(token) = token else {
            return Ok(HashMap::new());
        };
        let body = rpc::query_tasks_request(task_ids);
        let resp = rpc::send(&self.client, &self.endpoint, Self::normalize_token(token), &body).await?;
        rpc::extract_task_map(resp)
    }
}

/// In-memory gateway for tests: `submit` hands out deterministic ids from a
/// counter, `query` returns whatever was pre-seeded via [`FakeGateway::set_status`].
#[derive(Default)]
pub struct FakeGateway {
    statuses: std::sync::Mutex<HashMap<String, TaskInfo>>,
    counter: std::sync::atomic::AtomicU64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, task_id: impl Into<String>, info: TaskInfo) {
        self.statuses.lock().unwrap().insert(task_id.into(), info);
    }
}

#[async_trait]
impl SchedulerGateway for FakeGateway {
    async fn submit(&self, _app: &str, _params: &Value, _token: Option<&str>) -> Result<String, Error> {
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let task_id = format!("fake_task_{n}");
        self.statuses.lock().unwrap().insert(
            task_id.clone(),
            TaskInfo {
                status: TaskStatus::Running,
                elapsed_time: None,
                error: None,
            },
        );
        Ok(task_id)
    }

    async fn query(&self, task_ids: &[String], _token: Option<&str>) -> Result<HashMap<String, TaskInfo>, Error> {
        let statuses = self.statuses.lock().unwrap();
        Ok(task_ids
            .iter()
            .filter_map(|id| statuses.get(id).map(|info| (id.clone(), info.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_gateway_tracks_submitted_tasks() {
        let gw = FakeGateway::new();
        let task_id = gw.submit("Homology", &serde_json::json!({}), None).await.unwrap();
        let result = gw.query(&[task_id.clone()], None).await.unwrap();
        assert_eq!(result[&task_id].status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn placeholder_gateway_submits_without_token() {
        let gw = AppServiceGateway::new("http://scheduler.invalid/rpc", "http://base.invalid", true);
        let task_id = gw.submit("Homology", &serde_json::json!({}), None).await.unwrap();
        assert!(task_id.starts_with("local_"));
    }

    #[tokio::test]
    async fn disabled_placeholder_mode_rejects_missing_token() {
        let gw = AppServiceGateway::new("http://scheduler.invalid/rpc", "http://base.invalid", false);
        let err = gw.submit("Homology", &serde_json::json!({}), None).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
