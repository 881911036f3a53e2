//! metagov-server: REST server for metadata governance sync.
//!
//! Settings come from flags or env vars (see `ServerConfig`); a `.env` file is
//! loaded first. Without DATABASE_URL local rows live in memory.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metagov_client::GraphQlBackend;
use metagov_core::memory::InMemoryLocalStore;
use metagov_core::ports::LocalStore;
use metagov_core::service::SyncService;
use metagov_core::staging::StagingWriter;
use metagov_postgres::PgLocalStore;
use metagov_server::config::ServerConfig;
use metagov_server::router::build_router;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,metagov_server=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::parse();

    let local: Arc<dyn LocalStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("failed to connect to database")?;
            tracing::info!("Connected to database");
            let store = PgLocalStore::new(pool);
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory local store");
            Arc::new(InMemoryLocalStore::new())
        }
    };

    let backend = GraphQlBackend::new(&config.backend_config()?)?;
    tracing::info!(endpoint = %backend.endpoint(), "backend configured");

    let service = Arc::new(
        SyncService::new(
            local,
            Arc::new(backend),
            StagingWriter::new(&config.staging_dir),
        )
        .with_bulk_concurrency(config.bulk_concurrency),
    );
    tracing::info!(
        staging_dir = %config.staging_dir.display(),
        bulk_concurrency = service.bulk_concurrency(),
        "sync service ready"
    );

    let app = build_router(service);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("metagov-server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
