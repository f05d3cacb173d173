//! Campfire API server

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use campfire_api::{
    create_router,
    telemetry::init_telemetry,
    tenancy::{spawn_invalidation_listener, PgTenantStore},
    AppState, Config,
};
use campfire_shared::db::{create_pool, run_migrations};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Invalid configuration")?;
    init_telemetry(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_domain = %config.base_domain,
        tenant_override = ?config.tenant_override,
        "Starting Campfire API"
    );

    let result = run(config).await;
    if let Err(ref e) = result {
        error!("Server error: {:#}", e);
    }

    info!("Server shutdown complete");
    result
}

async fn run(config: Config) -> Result<()> {
    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let store = Arc::new(PgTenantStore::new(pool));
    let mut state = AppState::from_config(&config, store);

    // Cross-instance invalidation is optional; without it entries age out by TTL
    if let Some(redis_url) = &config.redis_url {
        let client = redis::Client::open(redis_url.as_str()).context("Invalid REDIS_URL")?;
        let conn = redis::aio::ConnectionManager::new(client.clone())
            .await
            .context("Failed to connect to Redis")?;
        state = state.with_redis(conn);
        spawn_invalidation_listener(client, state.directory.clone());
    } else {
        info!("REDIS_URL not set, tenant cache relies on TTL expiry only");
    }

    // Periodically drop expired cache entries
    let directory = state.directory.clone();
    let cleanup_interval = config
        .tenant_cache_cleanup_interval
        .max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        loop {
            ticker.tick().await;
            let removed = directory.cleanup();
            if removed > 0 {
                tracing::debug!(removed, "Cleaned up expired tenant cache entries");
            }
        }
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("HTTP server listening on {}", config.bind_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
