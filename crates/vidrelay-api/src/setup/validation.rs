//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use vidrelay_core::{Config, StorageBackend};

/// Validate critical configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();

    if config.database_url().is_none() {
        if is_production {
            tracing::warn!("DATABASE_URL not set in production; jobs and history will not survive a restart");
        } else {
            tracing::info!("DATABASE_URL not set; using the in-memory job store");
        }
    }

    if config.storage_backend() == StorageBackend::Local {
        if let Some(domain) = config.public_domain() {
            tracing::warn!(
                public_domain = %domain,
                "R2_PUBLIC_DOMAIN is set with the local storage backend; signed links will be rewritten to it"
            );
        }
    }

    Ok(())
}
