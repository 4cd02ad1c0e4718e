use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medley::api::server::{ApiServer, ApiServerConfig, AppState};
use medley::config::AppConfig;
use medley::database;
use medley::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medley=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    // Wire services and start the worker + scheduler
    let container = Arc::new(ServiceContainer::new(pool, config));
    container.start().await?;

    // API server, stopped by the same token as the background tasks
    let api_config = ApiServerConfig::from_env_or_default();
    let server = ApiServer::new(
        api_config,
        AppState::from_container(&container),
        container.cancellation_token(),
    );

    // Ctrl-C triggers a graceful shutdown of everything
    let shutdown_token = container.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown_token.cancel();
        }
    });

    server.run().await?;
    container.shutdown().await;

    Ok(())
}
