//! Workflow orchestration service: the HTTP surface over
//! `wf_manager::WorkflowManager`, plus the Execution Loop (spec.md §4.9-4.10)
//! driven as a background tick on a fixed interval.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mongodb::Client;
use tokio::signal;
use tokio::sync::Mutex;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

mod handlers;
mod middleware;
mod openapi;
mod routes;
mod state;

use state::AppState;
use wf_compiler::OutputDeconflictConfig;
use wf_core::{CliOverrides, Config};
use wf_executor::{Executor, UnavailableGroupCreationLibrary};
use wf_manager::WorkflowManager;
use wf_scheduler::AppServiceGateway;
use wf_storage::WorkflowStore;
use wf_workspace::HttpWorkspaceProbe;

/// Workflow orchestration service entry point (spec.md §6 CLI surface).
#[derive(Parser, Debug)]
#[command(name = "workflow-orchestrator", version, about = "Bioinformatics workflow orchestration service")]
struct Cli {
    /// Path to a config.{yaml,toml,json} file (overrides the default `config` lookup)
    #[arg(long)]
    config: Option<String>,

    /// Bind host for the HTTP surface, overrides API_HOST / config file
    #[arg(long)]
    host: Option<String>,

    /// Bind port for the HTTP surface, overrides API_PORT / config file
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let overrides = CliOverrides {
        config_path: cli.config,
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
    };

    let config =
        Config::load_with(&overrides).map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    if let Ok(current) = std::env::var("RUST_LOG") {
        let _ = current;
    } else {
        std::env::set_var("RUST_LOG", &config.logging.level);
    }

    let otel_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    wf_otel::init_telemetry("workflow-orchestrator", otel_endpoint.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install prometheus recorder: {e}"))?;

    info!("starting workflow orchestration service");

    let client = Client::with_uri_str(config.mongodb.connection_uri()).await?;
    let db = client.database(&config.mongodb.database);
    let store = WorkflowStore::new(&db);
    store.ensure_indexes().await?;
    info!(database = %config.mongodb.database, "connected to MongoDB");

    let workspace_base_url =
        std::env::var("WORKSPACE_BASE_URL").unwrap_or_else(|_| "https://www.bv-brc.org".to_string());
    let probe = Arc::new(HttpWorkspaceProbe::new(workspace_base_url));
    let deconflict_cfg = OutputDeconflictConfig::default();

    let manager = Arc::new(WorkflowManager::new(
        store.clone(),
        probe,
        deconflict_cfg,
        config.executor.max_parallel_steps_per_workflow,
        config.executor.workflow_log_dir.clone(),
    ));

    // `base_url` here is the BV-BRC workspace base URL embedded in JSON-RPC
    // params (spec.md §4.2), distinct from `SCHEDULER_BASE_URL` which is the
    // RPC endpoint itself — same constant `wf_cwl`'s converter defaults to.
    let gateway = Box::new(AppServiceGateway::new(
        config.scheduler.base_url.clone(),
        "https://www.bv-brc.org",
        config.scheduler.placeholder_mode,
    ));
    let group_creation = Box::new(UnavailableGroupCreationLibrary);
    let mut executor = Executor::new(store, gateway, group_creation, config.executor.workflow_log_dir.clone());

    if config.executor.enable_auto_resume {
        executor.resume_active_workflows().await?;
    }

    let executor = Arc::new(Mutex::new(executor));
    spawn_executor_loop(executor, config.executor.polling_interval_seconds);

    let state = AppState::new(manager, db, prometheus_handle);

    let cors_layer = build_cors_layer();

    let app = routes::build_router(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'; frame-ancestors 'none'"),
        ))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("workflow orchestration service shut down");
    Ok(())
}

/// Runs the Execution Loop on a fixed interval (spec.md §4.10). Ticks never
/// overlap: the loop body awaits each tick to completion before sleeping,
/// mirroring the teacher's `max_instances = 1` scheduler convention.
fn spawn_executor_loop(executor: Arc<Mutex<Executor>>, polling_interval_seconds: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(polling_interval_seconds.max(1)));
        loop {
            interval.tick().await;
            let mut executor = executor.lock().await;
            if let Err(e) = executor.tick().await {
                tracing::error!(error = %e, "executor tick failed");
            }
        }
    });
}

fn build_cors_layer() -> CorsLayer {
    let allowed_origins =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        warn!("no valid CORS origins configured, allowing localhost only");
        CorsLayer::new()
            .allow_origin(AllowOrigin::exact(HeaderValue::from_static("http://localhost:3000")))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .max_age(Duration::from_secs(86400))
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .max_age(Duration::from_secs(86400))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
