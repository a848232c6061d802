//! Entry point: load config, wire dependencies, and run the server.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use user_service::config::Config;
use user_service::db::{self, PgCredentialStore};
use user_service::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("config")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let pool = db::create_pool(
        &config.database_url,
        config.db_max_connections,
        config.store_timeout,
    )
    .await
    .context("connect to database")?;
    tracing::info!("database connection successful");

    if config.run_migrations {
        db::MIGRATOR.run(&pool).await.context("run migrations")?;
        tracing::info!("migrations applied");
    }

    let store = Arc::new(PgCredentialStore::new(pool));
    let state = AppState::new(&config, store).context("build application state")?;
    let app = create_app(state);

    tracing::info!(addr = %config.server_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
