//! Health check handler (spec.md §6).

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mongodb: &'static str,
    pub version: &'static str,
}

/// `GET /api/v1/health` — 200 always; `mongodb` reflects the ping result
/// rather than gating the status code, so a load balancer doesn't flap the
/// whole service off a transient DB hiccup.
#[utoipa::path(get, path = "/api/v1/health", responses((status = 200, body = HealthResponse)), tag = "health")]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mongodb = if state.mongodb_connected().await {
        "connected"
    } else {
        "disconnected"
    };
    Json(HealthResponse {
        status: "ok",
        mongodb,
        version: env!("CARGO_PKG_VERSION"),
    })
}
