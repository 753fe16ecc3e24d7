use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use octomerge::{router, AppState, Catalog, Config, Merger, OctoAiClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("octomerge=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let catalog = Catalog::load(&config.presets_path)
        .with_context(|| format!("loading presets from {}", config.presets_path.display()))?;
    tracing::info!(presets = catalog.len(), "preset catalog loaded");

    let client = Arc::new(OctoAiClient::new(config.token.clone()));
    let merger = Merger::new(client, config.generate_url(), config.poll_interval);
    let state = AppState::new(catalog, merger);
    let _sweeper = state
        .sessions
        .spawn_sweeper(config.session_idle, config.sweep_interval());
    let app = router(state, &config.assets_dir);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!("🚀 Server running on http://{}", config.bind_addr);
    tracing::info!("📸 Open in your browser to start merging!");

    axum::serve(listener, app).await?;
    Ok(())
}
