//! Shared application state (spec.md §6): the Workflow Manager façade plus
//! whatever the health check needs to confirm MongoDB connectivity
//! independently of it.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use mongodb::Database;
use wf_manager::WorkflowManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<WorkflowManager>,
    pub prometheus_handle: PrometheusHandle,
    db: Database,
}

impl AppState {
    pub fn new(manager: Arc<WorkflowManager>, db: Database, prometheus_handle: PrometheusHandle) -> Self {
        Self {
            manager,
            prometheus_handle,
            db,
        }
    }

    /// `GET /api/v1/health` (spec.md §6): `mongodb: connected|disconnected`.
    /// A `ping` round-trip rather than trusting the connection pool's idle
    /// state, mirroring `original_source/core/state_manager.py`'s own
    /// `client.admin.command("ping")` health probe.
    pub async fn mongodb_connected(&self) -> bool {
        self.db.run_command(bson::doc! { "ping": 1 }).await.is_ok()
    }
}
