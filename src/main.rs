//! ==============================================================================
//! main.rs - farm monitor api entry point
//! ==============================================================================
//!
//! purpose:
//!     small json api behind the farm-monitoring dashboard. reports the
//!     current water level / temperature / humidity, accepts control updates,
//!     and hands out synthetic history for the charts.
//!
//! responsibilities:
//!     - load configuration (farm.toml + env overrides)
//!     - set up tracing
//!     - pick a remote store backend (firebase, memory, offline)
//!     - serve the api with permissive cors
//!
//! relationships:
//!     - uses: config.rs (settings), api.rs (router + handlers)
//!     - uses: store.rs / firebase.rs (remote store backends)
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                   axum router (api.rs)                   │
//!     │  /api/sensor-data   /api/control   /api/historical-data  │
//!     └──────┬─────────────────────┬─────────────────┬───────────┘
//!            │                     │                 │
//!     ┌──────┴──────┐       ┌──────┴──────┐   ┌──────┴──────┐
//!     │ readings.rs │       │ controls.rs │   │ history.rs  │
//!     │ (fallback)  │       │ (always ok) │   │ (synthetic) │
//!     └──────┬──────┘       └──────┬──────┘   └─────────────┘
//!            │                     │
//!            └──────────┬──────────┘
//!                 ┌─────┴─────┐
//!                 │RemoteStore│ <- store.rs / firebase.rs
//!                 └───────────┘
//!
//! failure model:
//!     the store is best effort. if it is down, slow (bounded by
//!     store.timeout_ms) or empty, readings come from mock state and
//!     control updates are still acknowledged.
//!
//! ==============================================================================

mod api;
mod config;
mod controls;
mod domain;
mod firebase;
mod history;
mod readings;
mod store;

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

use config::{ApiConfig, StoreBackend};
use store::{MemoryStore, OfflineStore, RemoteStore};

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: logging first, at a provisional level, so config loading is visible
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();

    tracing::info!("===========================================================");
    tracing::info!("  Farm Monitor API");
    tracing::info!("===========================================================");

    // step 2: load configuration, then switch to the configured log level
    let config = ApiConfig::load_or_default();
    if std::env::var_os("RUST_LOG").is_none() {
        match EnvFilter::try_new(&config.logging.level) {
            Ok(level) => filter_handle.reload(level)?,
            Err(e) => tracing::warn!("[CONFIG] Bad logging.level {:?}: {}", config.logging.level, e),
        }
    }
    config.log_summary();

    // step 3: remote store
    let store = build_store(&config);

    // step 4: serve
    run_server(store, &config).await
}

/// pick the store backend; a broken firebase setup degrades to offline
fn build_store(config: &ApiConfig) -> Arc<dyn RemoteStore> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("[STARTUP] ✓ Using in-memory store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Offline => {
            tracing::info!("[STARTUP] Store disabled, serving mock data only");
            Arc::new(OfflineStore::new("store backend set to offline"))
        }
        StoreBackend::Firebase => match config.store.database_url.as_deref() {
            None => {
                tracing::warn!("[STARTUP] No store.database_url configured, serving mock data only");
                Arc::new(OfflineStore::new("no database_url configured"))
            }
            Some(url) => match firebase::FirebaseStore::new(url, &config.store) {
                Ok(store) => {
                    tracing::info!("[STARTUP] ✓ Firebase store at {}", url);
                    Arc::new(store)
                }
                Err(e) => {
                    tracing::error!("[STARTUP] Failed to initialize Firebase: {:#}", e);
                    Arc::new(OfflineStore::new(format!("firebase init failed: {}", e)))
                }
            },
        },
    }
}

// ==============================================================================
// web server
// ==============================================================================

async fn run_server(store: Arc<dyn RemoteStore>, config: &ApiConfig) -> Result<()> {
    let app = api::router(api::AppState::new(store, config));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("[STARTUP] ✓ API live at http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
