//! City Alerts Closure Service - Main Entry Point

use api::{init_logging, run_server, ServiceConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::load()?;
    init_logging(&config);

    info!("=== City Alerts v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Auto-close sweep every {}s, snapshot: {}",
        config.sweep.interval().as_secs(),
        config
            .snapshot_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    run_server(config).await
}
