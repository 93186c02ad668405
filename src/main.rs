use anyhow::Context;
use std::sync::Arc;

use campus_api::app::{router, AppState};
use campus_api::config;
use campus_api::database::{DatabaseManager, PgQueryExecutor, PgQueryRegistry};
use campus_api::services::QueryService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    campus_api::init_tracing("campus_api=info,tower_http=info");

    let config = config::config();
    tracing::info!("Starting Campus API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }
    if campus_api::is_development!() && std::env::var("JWT_SECRET").is_err() {
        tracing::warn!("Using the built-in development JWT secret");
    }

    let pool = DatabaseManager::pool().await.context("connecting to database")?;
    DatabaseManager::ensure_schema(&pool).await.context("applying schema")?;

    let service = QueryService::new(
        Arc::new(PgQueryRegistry::new(pool.clone())),
        Arc::new(PgQueryExecutor::new(pool)),
    );
    let app = router(AppState::new(service));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Campus API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    DatabaseManager::close().await;
    Ok(())
}
