//! Agent Matcher Server
//!
//! Entry point for the agent matching API.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use agent_matcher::{AppState, config::AppConfig, server, telemetry};
use dotenvy::dotenv;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    telemetry::init();

    let config = AppConfig::load()?;
    info!(
        name: "config.loaded",
        host = %config.server.host,
        port = config.server.port,
        semantic = config.semantic.enabled,
        llm = config.llm.enabled,
        "Configuration loaded"
    );

    let state = AppState::from_config(config).await?;
    info!(
        agents = state.catalog.snapshot().await.len(),
        "Catalog ready"
    );

    server::start_server(state).await
}
