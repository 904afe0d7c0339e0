use tracing_subscriber::EnvFilter;

use dynrest_api::config;
use dynrest_api::database::DatabaseManager;
use dynrest_api::registry::ModuleRegistry;
use dynrest_api::server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, DYNREST_PORT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();
    tracing::info!("Starting dynrest API in {:?} mode", config.environment);

    let registry = ModuleRegistry::from_config(&config)?;
    tracing::info!("Registered {} modules", registry.modules().count());

    let pool = DatabaseManager::pool().await?;
    let port = config.api.port;
    let app = app(AppState::postgres(pool, registry, config));

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("dynrest API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    DatabaseManager::close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
