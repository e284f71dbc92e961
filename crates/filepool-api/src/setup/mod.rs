//! Application setup: tracing, state construction, routes, server.

pub mod routes;
pub mod server;

use std::sync::Arc;

use axum::Router;
use filepool_core::Config;
use filepool_storage::{build_pool, Uploader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

/// Initialize the tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filepool=debug,tower_http=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application state and router from configuration.
pub fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router), anyhow::Error> {
    let pool = build_pool(&config).map_err(|e| anyhow::anyhow!("Storage setup failed: {}", e))?;
    let uploader = Uploader::new(pool, config.attempt_timeout());

    let state = Arc::new(AppState::new(config.clone(), uploader));
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
