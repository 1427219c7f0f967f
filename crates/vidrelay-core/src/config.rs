//! Configuration module
//!
//! Built once at startup from the environment and handed to every component
//! constructor by reference; nothing reads the environment after `from_env`.

use std::env;
use std::str::FromStr;

use crate::constants::{DEFAULT_HISTORY_LIMIT, DEFAULT_PROGRESS_INTERVAL_BYTES};
use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 8000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const S3_REGION: &str = "auto";
const PROGRESS_INTERVAL_BYTES: u64 = DEFAULT_PROGRESS_INTERVAL_BYTES;
const MULTIPART_PART_SIZE_MB: usize = 8;
const MIN_MULTIPART_PART_SIZE_MB: usize = 5;
const DOWNLOAD_LINK_TTL_HOURS: u64 = 3;
const MAX_DOWNLOAD_LINK_TTL_HOURS: u64 = 168;
const HISTORY_LIMIT: usize = DEFAULT_HISTORY_LIMIT;
const SOURCE_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// `LOG_FORMAT=json` switches log output to JSON lines
    pub log_json: bool,
}

/// Relay configuration: storage credentials, key-value backend and pipeline tuning.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub base: BaseConfig,
    /// PostgreSQL URL for the key-value store; in-memory store when unset
    pub database_url: Option<String>,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub r2_account_id: Option<String>,
    pub r2_access_key_id: Option<String>,
    pub r2_secret_access_key: Option<String>,
    pub r2_bucket_name: Option<String>,
    pub s3_endpoint: Option<String>, // Overrides the R2 account endpoint (MinIO, AWS, ...)
    pub s3_region: String,
    pub public_domain: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub link_signing_secret: Option<String>,
    // Pipeline tuning
    pub progress_interval_bytes: u64,
    pub multipart_part_size_bytes: usize,
    pub download_link_ttl_hours: u64,
    pub history_limit: usize,
    pub source_connect_timeout_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<RelayConfig>);

impl Config {
    fn as_relay(&self) -> &RelayConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_relay().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = RelayConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_relay().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_relay().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_relay().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_relay().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_relay().base.db_max_connections
    }

    pub fn log_json(&self) -> bool {
        self.as_relay().base.log_json
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_relay().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_relay().database_url.as_deref()
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_relay().storage_backend
    }

    pub fn r2_account_id(&self) -> Option<&str> {
        self.as_relay().r2_account_id.as_deref()
    }

    pub fn r2_access_key_id(&self) -> Option<&str> {
        self.as_relay().r2_access_key_id.as_deref()
    }

    pub fn r2_secret_access_key(&self) -> Option<&str> {
        self.as_relay().r2_secret_access_key.as_deref()
    }

    pub fn r2_bucket_name(&self) -> Option<&str> {
        self.as_relay().r2_bucket_name.as_deref()
    }

    /// Explicit S3 endpoint, or the R2 account endpoint when only an account id is set.
    pub fn s3_endpoint(&self) -> Option<String> {
        let relay = self.as_relay();
        relay.s3_endpoint.clone().or_else(|| {
            relay
                .r2_account_id
                .as_ref()
                .map(|account| format!("https://{}.r2.cloudflarestorage.com", account))
        })
    }

    pub fn s3_region(&self) -> &str {
        &self.as_relay().s3_region
    }

    pub fn public_domain(&self) -> Option<&str> {
        self.as_relay().public_domain.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_relay().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_relay().local_storage_base_url.as_deref()
    }

    pub fn link_signing_secret(&self) -> Option<&str> {
        self.as_relay().link_signing_secret.as_deref()
    }

    pub fn progress_interval_bytes(&self) -> u64 {
        self.as_relay().progress_interval_bytes
    }

    pub fn multipart_part_size_bytes(&self) -> usize {
        self.as_relay().multipart_part_size_bytes
    }

    pub fn download_link_ttl_hours(&self) -> u64 {
        self.as_relay().download_link_ttl_hours
    }

    pub fn history_limit(&self) -> usize {
        self.as_relay().history_limit
    }

    pub fn source_connect_timeout_secs(&self) -> u64 {
        self.as_relay().source_connect_timeout_secs
    }
}

/// Read an optional variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    optional_var(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            db_max_connections: parsed_var("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parsed_var("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            log_json: optional_var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        let storage_backend = match optional_var("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };

        let part_size_mb =
            parsed_var("MULTIPART_PART_SIZE_MB", MULTIPART_PART_SIZE_MB).max(MIN_MULTIPART_PART_SIZE_MB);

        let config = RelayConfig {
            base,
            database_url: optional_var("DATABASE_URL"),
            storage_backend,
            r2_account_id: optional_var("R2_ACCOUNT_ID"),
            r2_access_key_id: optional_var("R2_ACCESS_KEY_ID"),
            r2_secret_access_key: optional_var("R2_SECRET_ACCESS_KEY"),
            r2_bucket_name: optional_var("R2_BUCKET_NAME"),
            s3_endpoint: optional_var("S3_ENDPOINT"),
            s3_region: optional_var("S3_REGION").unwrap_or_else(|| S3_REGION.to_string()),
            public_domain: optional_var("R2_PUBLIC_DOMAIN"),
            local_storage_path: optional_var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: optional_var("LOCAL_STORAGE_BASE_URL"),
            link_signing_secret: optional_var("LINK_SIGNING_SECRET"),
            progress_interval_bytes: parsed_var("PROGRESS_INTERVAL_BYTES", PROGRESS_INTERVAL_BYTES)
                .max(1),
            multipart_part_size_bytes: part_size_mb * 1024 * 1024,
            download_link_ttl_hours: parsed_var("DOWNLOAD_LINK_TTL_HOURS", DOWNLOAD_LINK_TTL_HOURS)
                .clamp(1, MAX_DOWNLOAD_LINK_TTL_HOURS),
            history_limit: parsed_var("HISTORY_LIMIT", HISTORY_LIMIT).max(1),
            source_connect_timeout_secs: parsed_var(
                "SOURCE_CONNECT_TIMEOUT_SECS",
                SOURCE_CONNECT_TIMEOUT_SECS,
            )
            .max(1),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on settings that would only surface once the first upload runs.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.r2_bucket_name.is_none() {
                    return Err(anyhow::anyhow!(
                        "R2_BUCKET_NAME must be set when using the s3 storage backend"
                    ));
                }
                if self.r2_account_id.is_none() && self.s3_endpoint.is_none() {
                    return Err(anyhow::anyhow!(
                        "R2_ACCOUNT_ID or S3_ENDPOINT must be set when using the s3 storage backend"
                    ));
                }
                if self.r2_access_key_id.is_none() || self.r2_secret_access_key.is_none() {
                    return Err(anyhow::anyhow!(
                        "R2_ACCESS_KEY_ID and R2_SECRET_ACCESS_KEY must be set when using the s3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL must be set when using the local storage backend"
                    ));
                }
                match self.link_signing_secret.as_deref() {
                    Some(secret) if secret.len() >= 32 => {}
                    _ => {
                        return Err(anyhow::anyhow!(
                            "LINK_SIGNING_SECRET must be at least 32 characters when using the local storage backend"
                        ))
                    }
                }
            }
        }

        let environment = self.base.environment.to_lowercase();
        if (environment == "production" || environment == "prod")
            && self.base.cors_origins.iter().any(|origin| origin == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot contain '*' in production; list explicit origins"
            ));
        }

        if self.base.db_max_connections == 0 {
            return Err(anyhow::anyhow!("Database max connections cannot be 0"));
        }

        Ok(())
    }
}
