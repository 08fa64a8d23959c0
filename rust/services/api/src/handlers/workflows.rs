//! Workflow lifecycle handlers (spec.md §6): `plan`, `register`, `validate`,
//! `submit`, `{id}/submit`, `{id}/cancel`, `{id}/status`, `{id}`. Thin
//! wrappers over `wf_manager::WorkflowManager` — no business logic lives
//! here, per spec.md §3 "Ownership".

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use wf_core::{StepStatus, WorkflowStatus};
use wf_manager::{RegisterOutcome, StatusProjection};

use crate::handlers::ApiError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub workflow_name: String,
    pub step_count: usize,
}

impl From<RegisterOutcome> for RegisterResponse {
    fn from(o: RegisterOutcome) -> Self {
        Self {
            workflow_id: o.workflow_id,
            status: o.status,
            workflow_name: o.workflow_name,
            step_count: o.step_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
    pub workflow_json: Value,
    pub warnings: Vec<String>,
    pub auto_fixes: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SubmitResponse {
    pub workflow_id: String,
    pub status: WorkflowStatus,
}

#[derive(Serialize, ToSchema)]
pub struct StepStatusResponse {
    pub step_id: Option<String>,
    pub step_name: String,
    pub status: StepStatus,
    pub app: String,
    pub error_message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: WorkflowStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub steps: Vec<StepStatusResponse>,
}

impl From<StatusProjection> for StatusResponse {
    fn from(p: StatusProjection) -> Self {
        Self {
            workflow_id: p.workflow_id,
            workflow_name: p.workflow_name,
            status: p.status,
            created_at: p.created_at,
            updated_at: p.updated_at,
            steps: p
                .steps
                .into_iter()
                .map(|s| StepStatusResponse {
                    step_id: s.step_id,
                    step_name: s.step_name,
                    status: s.status,
                    app: s.app,
                    error_message: s.error_message,
                })
                .collect(),
        }
    }
}

/// `POST /api/v1/workflows/plan` — 201.
#[utoipa::path(post, path = "/api/v1/workflows/plan", responses((status = 201, body = RegisterResponse)), tag = "workflows")]
pub async fn plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let outcome = state.manager.plan(body, bearer_token(&headers)).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// `POST /api/v1/workflows/register` — 201; 400 on compile error.
#[utoipa::path(post, path = "/api/v1/workflows/register", responses((status = 201, body = RegisterResponse)), tag = "workflows")]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let outcome = state.manager.register(body, bearer_token(&headers)).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// `POST /api/v1/workflows/validate` — 200, never persisted.
#[utoipa::path(post, path = "/api/v1/workflows/validate", responses((status = 200, body = ValidateResponse)), tag = "workflows")]
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let outcome = state.manager.validate(body, bearer_token(&headers)).await?;
    let mut workflow_json = serde_json::to_value(&outcome.workflow).unwrap_or(Value::Null);
    if let Some(obj) = workflow_json.as_object_mut() {
        obj.remove("auth_token");
    }
    Ok(Json(ValidateResponse {
        valid: outcome.valid,
        workflow_json,
        warnings: outcome.warnings,
        auto_fixes: outcome.auto_fixes,
    }))
}

/// `POST /api/v1/workflows/submit` — accepts either `{workflow_id}` alone or
/// a full workflow body (spec.md §6).
#[utoipa::path(post, path = "/api/v1/workflows/submit", responses((status = 200, body = SubmitResponse)), tag = "workflows")]
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let outcome = state.manager.submit(body, bearer_token(&headers)).await?;
    Ok(Json(SubmitResponse {
        workflow_id: outcome.workflow_id,
        status: outcome.status,
    }))
}

/// `POST /api/v1/workflows/{id}/submit` — 200.
#[utoipa::path(post, path = "/api/v1/workflows/{id}/submit", responses((status = 200, body = SubmitResponse)), tag = "workflows")]
pub async fn submit_planned(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SubmitResponse>, ApiError> {
    let outcome = state.manager.submit_planned(&id, bearer_token(&headers)).await?;
    Ok(Json(SubmitResponse {
        workflow_id: outcome.workflow_id,
        status: outcome.status,
    }))
}

/// `POST /api/v1/workflows/{id}/cancel` — 200; 400 if terminal.
#[utoipa::path(post, path = "/api/v1/workflows/{id}/cancel", responses((status = 200, body = SubmitResponse)), tag = "workflows")]
pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SubmitResponse>, ApiError> {
    state.manager.cancel(&id).await?;
    Ok(Json(SubmitResponse {
        workflow_id: id,
        status: WorkflowStatus::Cancelled,
    }))
}

/// `GET /api/v1/workflows/{id}/status` — 200.
#[utoipa::path(get, path = "/api/v1/workflows/{id}/status", responses((status = 200, body = StatusResponse)), tag = "workflows")]
pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<StatusResponse>, ApiError> {
    let projection = state.manager.status(&id).await?;
    Ok(Json(projection.into()))
}

/// `GET /api/v1/workflows/{id}` — 200, full document. `auth_token` is
/// stripped before serialization — it's a credential, not a read model.
#[utoipa::path(get, path = "/api/v1/workflows/{id}", responses((status = 200, body = Value)), tag = "workflows")]
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let workflow = state.manager.get(&id).await?;
    let mut json = serde_json::to_value(&workflow).map_err(|e| wf_core::Error::Internal(e.to_string()))?;
    if let Some(obj) = json.as_object_mut() {
        obj.remove("auth_token");
    }
    Ok(Json(json))
}
