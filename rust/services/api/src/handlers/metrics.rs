//! `GET /metrics` (spec.md §6 "Prometheus exposition (optional)"): renders
//! whatever the `metrics` facade has recorded so far via the recorder
//! installed once at startup.

use axum::extract::State;

use crate::state::AppState;

pub async fn scrape(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}
