//! Application setup and initialization

pub mod kv;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;
pub mod validation;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use vidrelay_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        storage_backend = ?config.storage_backend(),
        "Configuration loaded and validated successfully"
    );

    let store = kv::setup_kv(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let state = services::initialize_services(&config, store, storage)?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
