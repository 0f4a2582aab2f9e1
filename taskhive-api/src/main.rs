//! # TaskHive API Server
//!
//! Serves the REST API, the realtime WebSocket and uploaded images.
//!
//! With `DATABASE_URL` set the server runs migrations and persists to
//! PostgreSQL; without it everything lives in memory and is lost on restart.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p taskhive-api
//! ```

use std::sync::Arc;

use anyhow::Context;
use taskhive_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskhive_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    store::{memory::MemoryStore, postgres::PgStore, Store},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "taskhive_api=debug,taskhive_shared=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "TaskHive API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let mut pg_pool = None;
    let store: Arc<dyn Store> = match &config.database {
        Some(database) => {
            ensure_database_exists(&database.url)
                .await
                .context("Failed to create database")?;

            let db_config = DatabaseConfig {
                max_connections: database.max_connections,
                ..DatabaseConfig::new(database.url.clone())
            };
            let pool = create_pool(db_config)
                .await
                .context("Failed to connect to database")?;
            run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            pg_pool = Some(pool.clone());
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, data will not persist");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&config.uploads.dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.uploads.dir.display()))?;

    let bind_address = config.bind_address();
    tracing::info!(store = store.backend_name(), upload_dir = %config.uploads.dir.display(), "Store ready");

    let app = build_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pg_pool {
        close_pool(pool).await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, exiting...");
}
