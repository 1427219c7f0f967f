#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::{S3Settings, S3Storage};
use crate::{LinkSigner, ObjectStorage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use vidrelay_core::Config;

/// Storage backend plus the link signer the files route verifies against.
///
/// `link_signer` is only set for the local backend; S3 links are signed by the provider.
#[derive(Clone)]
pub struct ConfiguredStorage {
    pub storage: Arc<dyn ObjectStorage>,
    pub link_signer: Option<LinkSigner>,
}

fn required<'a>(value: Option<&'a str>, name: &str) -> StorageResult<&'a str> {
    value.ok_or_else(|| StorageError::ConfigError(format!("{} not configured", name)))
}

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<ConfiguredStorage> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let settings = S3Settings {
                bucket: required(config.r2_bucket_name(), "R2_BUCKET_NAME")?.to_string(),
                region: config.s3_region().to_string(),
                endpoint_url: config.s3_endpoint(),
                access_key_id: required(config.r2_access_key_id(), "R2_ACCESS_KEY_ID")?
                    .to_string(),
                secret_access_key: required(config.r2_secret_access_key(), "R2_SECRET_ACCESS_KEY")?
                    .to_string(),
                part_size: config.multipart_part_size_bytes(),
            };

            let storage = S3Storage::new(settings).await?;
            Ok(ConfiguredStorage {
                storage: Arc::new(storage),
                link_signer: None,
            })
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = required(config.local_storage_path(), "LOCAL_STORAGE_PATH")?;
            let base_url = required(config.local_storage_base_url(), "LOCAL_STORAGE_BASE_URL")?;
            let signer = LinkSigner::new(required(
                config.link_signing_secret(),
                "LINK_SIGNING_SECRET",
            )?)?;

            let storage = LocalStorage::new(base_path, base_url.to_string(), signer.clone()).await?;
            Ok(ConfiguredStorage {
                storage: Arc::new(storage),
                link_signer: Some(signer),
            })
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
