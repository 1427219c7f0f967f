//! Storage setup and initialization

use anyhow::{Context, Result};
use vidrelay_core::Config;
use vidrelay_storage::{create_storage, ConfiguredStorage};

pub async fn setup_storage(config: &Config) -> Result<ConfiguredStorage> {
    tracing::info!("Initializing storage...");
    let configured = create_storage(config)
        .await
        .context("Failed to initialize storage")?;

    let backend = configured.storage.backend_type();
    if let Err(e) = configured.storage.check_connection().await {
        tracing::warn!(backend = ?backend, error = %e, "Storage connection check failed");
    }

    tracing::info!(
        backend = ?backend,
        signed_file_route = configured.link_signer.is_some(),
        "Storage initialized successfully"
    );
    Ok(configured)
}
