//! MRN Server - REST API for patient identity resolution
//!
//! Endpoints:
//! - POST /patients/resolve - Resolve one patient from known identifiers
//! - GET  /patients/search  - Search patients by name or medical identifier
//! - GET  /identifiers/{raw}/display - Display form of a stored identifier
//! - GET  /health, GET /ready
//! - GET  /docs - Swagger UI

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use mrn_core::store::RetryingPatientStore;
use mrn_core::{InMemoryPatientStore, PatientStore};
use mrn_server::{create_router, db, AppState, Config, PostgresPatientStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    let store = build_store(&config).await?;
    let addr = config.socket_addr();

    let app = create_router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "mrn-server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("mrn-server stopped");
    Ok(())
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise an in-memory store
/// (optionally seeded from `MRN_FIXTURE`). Both sit behind the retrying wrapper.
async fn build_store(config: &Config) -> Result<Arc<dyn PatientStore>, Box<dyn std::error::Error>> {
    let inner: Arc<dyn PatientStore> = match &config.database_url {
        Some(url) => {
            let pool = db::connect(config, url).await?;
            tracing::info!(
                max_connections = config.database_max_connections,
                "Connected to PostgreSQL patient store"
            );
            Arc::new(PostgresPatientStore::new(pool))
        }
        None => {
            let store = match &config.fixture_path {
                Some(path) => {
                    let json = tokio::fs::read_to_string(path).await?;
                    let store = InMemoryPatientStore::from_json(&json)?;
                    tracing::info!(path = %path, patients = store.len(), "Loaded patient fixture");
                    store
                }
                None => InMemoryPatientStore::new(),
            };
            tracing::warn!("DATABASE_URL not set; using in-memory patient store");
            Arc::new(store)
        }
    };

    Ok(Arc::new(RetryingPatientStore::with_config(
        inner,
        config.store_retry.clone(),
    )))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
