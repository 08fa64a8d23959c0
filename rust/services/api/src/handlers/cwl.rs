//! CWL import handler (SPEC_FULL.md §5): translates a Common Workflow
//! Language document into the internal workflow JSON shape, then hands it
//! straight to `register` — CWL import never bypasses the compile pipeline.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::handlers::workflows::RegisterResponse;
use crate::handlers::ApiError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `POST /api/v1/workflows/cwl` — body: raw CWL text (YAML or JSON). 201 on
/// success, same envelope as `register`.
#[utoipa::path(post, path = "/api/v1/workflows/cwl", responses((status = 201, body = RegisterResponse)), tag = "workflows")]
pub async fn import_cwl(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let workflow_json = wf_cwl::CwlAdapter::convert_text(&body)?;
    let outcome = state.manager.register(workflow_json, bearer_token(&headers)).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}
