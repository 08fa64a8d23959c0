//! Operator-facing maintenance endpoints (SPEC_FULL.md §5), separate from
//! the workflow lifecycle surface: currently, stale-log pruning.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::handlers::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CleanupQuery {
    /// Retention window in days; workflow logs older than this are pruned.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// When true, reports what would be pruned without touching the filesystem.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_retention_days() -> i64 {
    30
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    pub scanned: usize,
    pub pruned_count: usize,
    pub pruned_workflow_ids: Vec<String>,
    pub dry_run: bool,
}

/// `POST /api/v1/admin/cleanup?retention_days=30&dry_run=false`.
#[utoipa::path(post, path = "/api/v1/admin/cleanup", responses((status = 200, body = CleanupResponse)), tag = "admin")]
pub async fn cleanup(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let retention = chrono::Duration::days(query.retention_days.max(0));
    let report = state.manager.cleanup_stale_logs(retention, query.dry_run).await?;
    Ok(Json(CleanupResponse {
        scanned: report.scanned,
        pruned_count: report.pruned.len(),
        pruned_workflow_ids: report.pruned.into_iter().map(|p| p.workflow_id).collect(),
        dry_run: query.dry_run,
    }))
}
