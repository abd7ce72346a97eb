//! TCI Live Server binary.

use std::sync::Arc;

use tci_live_server::config::Config;
use tci_live_server::source::PgDataService;
use tci_live_server::{app, db, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tci_live_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting TCI Live Server on {}:{}", config.host, config.port);

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.max_connections).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Build application state
    let source = Arc::new(PgDataService::new(pool, config.notify_channel.clone()));
    let state = AppState::new(source, config.live_options());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(channel = %config.notify_channel, "Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
