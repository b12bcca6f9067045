mod classifier;
mod config;
mod db;
mod errors;
mod models;
mod progression;
mod routes;
mod state;
mod storage;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::classifier::{MockClassifier, WasteClassifier};
use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{MemoryProgressStore, PgProgressStore, ProgressStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting WasteWise API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    let classifier: Arc<dyn WasteClassifier> = Arc::new(MockClassifier);
    info!("Classifier initialized (backend: {})", classifier.backend());
    info!(
        "Progress commits retry up to {} attempts on conflict",
        config.commit_max_attempts
    );

    let state = AppState {
        config: config.clone(),
        store,
        classifier,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn ProgressStore>> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            let pool = create_pool(url).await?;
            info!("Using PostgreSQL progress store");
            Ok(Arc::new(PgProgressStore::new(pool)))
        }
        StorageBackend::Memory => {
            info!("Using in-memory progress store; data is lost on restart");
            Ok(Arc::new(MemoryProgressStore::new()))
        }
    }
}
