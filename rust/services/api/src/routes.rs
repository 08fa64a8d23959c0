//! API routes (spec.md §6).

use axum::{middleware, routing::get, routing::post, Router};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/metrics", get(handlers::metrics::scrape))
        .nest(
            "/api/v1",
            Router::new()
                .route("/health", get(handlers::health::health_check))
                .route("/workflows/plan", post(handlers::workflows::plan))
                .route("/workflows/register", post(handlers::workflows::register))
                .route("/workflows/validate", post(handlers::workflows::validate))
                .route("/workflows/submit", post(handlers::workflows::submit))
                .route("/workflows/cwl", post(handlers::cwl::import_cwl))
                .route("/admin/cleanup", post(handlers::admin::cleanup))
                .route("/workflows/{id}/submit", post(handlers::workflows::submit_planned))
                .route("/workflows/{id}/cancel", post(handlers::workflows::cancel))
                .route("/workflows/{id}/status", get(handlers::workflows::status))
                .route("/workflows/{id}", get(handlers::workflows::get)),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
