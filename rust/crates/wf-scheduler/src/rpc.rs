//! JSON-RPC 2.0 wire format for `AppService` (spec.md §4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wf_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Running,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskInfo {
    pub status: TaskStatus,
    #[serde(default)]
    pub elapsed_time: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

pub fn start_app2_request(app: &str, params: &Value, base_url: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "AppService.start_app2",
        "params": [app, params, {"base_url": base_url}],
        "id": 1,
    })
}

pub fn query_tasks_request(task_ids: &[String]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "AppService.query_tasks",
        "params": [task_ids],
        "id": 1,
    })
}

/// POST the envelope with `Content-Type: application/jsonrpc+json` and the
/// raw token as `Authorization`. HTTP 5xx bodies are still parsed as
/// JSON-RPC so a scheduler-side error surfaces as `SchedulerError`, not a
/// transport failure (spec.md §4.2, §7). Timeouts/connection errors surface
/// as `Error::Transient`.
pub async fn send(client: &reqwest::Client, endpoint: &str, token: &str, body: &Value) -> Result<Value, Error> {
    let resp = client
        .post(endpoint)
        .header("Content-Type", "application/jsonrpc+json")
        .header("Authorization", token)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                Error::Transient(e.to_string())
            } else {
                Error::Transient(format!("scheduler request failed: {e}"))
            }
        })?;

    let text = resp
        .text()
        .await
        .map_err(|e| Error::Transient(format!("failed to read scheduler response body: {e}")))?;

    let envelope: RpcEnvelope = serde_json::from_str(&text)
        .map_err(|e| Error::Transient(format!("malformed JSON-RPC envelope from scheduler: {e}")))?;

    if let Some(err) = envelope.error {
        return Err(Error::SchedulerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    envelope
        .result
        .ok_or_else(|| Error::Transient("JSON-RPC envelope had neither result nor error".to_string()))
}

/// `start_app2`'s result may be a one-element array or a bare object;
/// extract `id` with `task_id` as a fallback key.
pub fn extract_task_id(result: Value) -> Result<String, Error> {
    let obj = match result {
        Value::Array(mut arr) if !arr.is_empty() => arr.remove(0),
        other @ Value::Object(_) => other,
        other => {
            return Err(Error::Transient(format!(
                "unexpected start_app2 result shape: {other}"
            )))
        }
    };
    obj.get("id")
        .or_else(|| obj.get("task_id"))
        .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
        .ok_or_else(|| Error::Transient(format!("start_app2 result missing 'id'/'task_id': {obj}")))
}

/// `query_tasks`'s result may be a single-element array containing a map,
/// or a bare map; accept both.
pub fn extract_task_map(result: Value) -> Result<HashMap<String, TaskInfo>, Error> {
    let obj = match result {
        Value::Array(mut arr) if !arr.is_empty() => arr.remove(0),
        other @ Value::Object(_) => other,
        Value::Array(_) => return Ok(HashMap::new()),
        other => {
            return Err(Error::Transient(format!(
                "unexpected query_tasks result shape: {other}"
            )))
        }
    };
    serde_json::from_value(obj).map_err(|e| Error::Transient(format!("malformed query_tasks result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_task_id_from_array_result() {
        let result = json!([{"id": "task-123"}]);
        assert_eq!(extract_task_id(result).unwrap(), "task-123");
    }

    #[test]
    fn extracts_task_id_from_bare_object_with_task_id_fallback() {
        let result = json!({"task_id": "task-456"});
        assert_eq!(extract_task_id(result).unwrap(), "task-456");
    }

    #[test]
    fn extracts_task_map_from_wrapped_array() {
        let result = json!([{"task-1": {"status": "completed", "elapsed_time": 12.5}}]);
        let map = extract_task_map(result).unwrap();
        assert_eq!(map["task-1"].status, TaskStatus::Completed);
    }

    #[test]
    fn extracts_task_map_from_bare_object() {
        let result = json!({"task-2": {"status": "failed", "error": "boom"}});
        let map = extract_task_map(result).unwrap();
        assert_eq!(map["task-2"].status, TaskStatus::Failed);
        assert_eq!(map["task-2"].error.as_deref(), Some("boom"));
    }
}
