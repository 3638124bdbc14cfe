//! City Alerts Closure Service
//!
//! Runs the periodic closure sweep and exposes health and on-demand
//! auto-close endpoints.

use anyhow::Context;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use closure_scheduler::{ClosureSweeper, SweepReport};
use serde::Serialize;
use std::sync::Arc;
use storage::Repository;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::FmtSubscriber;

mod error;
mod routes;
mod settings;

pub use error::ApiError;
pub use settings::{env_source, ServiceConfig, CONFIG_PATH_VAR};

/// Application state shared across handlers
pub struct AppState {
    /// Alert repository
    pub repository: Arc<Repository>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Latest sweep report
    sweep_reports: watch::Receiver<Option<SweepReport>>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        repository: Arc<Repository>,
        sweep_reports: watch::Receiver<Option<SweepReport>>,
    ) -> Self {
        Self {
            repository,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            sweep_reports,
        }
    }

    /// Most recent sweep report, if a sweep has run
    pub fn last_sweep(&self) -> Option<SweepReport> {
        self.sweep_reports.borrow().clone()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub alert_count: usize,
    pub last_sweep: Option<SweepReport>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/closure/last-sweep", get(routes::closure::get_last_sweep))
        .route(
            "/api/v1/alerts/:id_alert/:user_id/auto-close",
            post(routes::closure::auto_close_alert),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        alert_count: state.repository.alert_count(),
        last_sweep: state.last_sweep(),
    })
}

/// Initialize logging
pub fn init_logging(config: &ServiceConfig) {
    let builder = FmtSubscriber::builder()
        .with_max_level(config.level())
        .with_target(true);

    if config.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())
            .expect("Failed to set tracing subscriber");
    } else {
        tracing::subscriber::set_global_default(builder.finish())
            .expect("Failed to set tracing subscriber");
    }
}

/// Open the configured repository
pub async fn open_repository(config: &ServiceConfig) -> anyhow::Result<Repository> {
    match &config.snapshot_path {
        Some(path) => Repository::open(path)
            .await
            .with_context(|| format!("failed to open snapshot {}", path.display())),
        None => {
            warn!("No snapshot_path configured, alerts will not survive a restart");
            Ok(Repository::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the sweep and the HTTP server until Ctrl-C
pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    let repository = Arc::new(open_repository(&config).await?);

    let sweeper = ClosureSweeper::new(repository.clone(), config.sweep.clone());
    let reports = sweeper.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_task = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let state = Arc::new(AppState::new(repository.clone(), reports));
    let app = create_router(state);

    info!("Starting API server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = shutdown_tx.send(true) {
        debug!("Closure sweeper already stopped: {}", e);
    }
    sweep_task.await.context("closure sweeper panicked")?;

    if let Some(n) = repository.persist().await? {
        info!("Persisted {} alerts on shutdown", n);
    }

    Ok(())
}
