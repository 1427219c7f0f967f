//! Test helpers: build AppState and router for integration tests.
//!
//! State is built from the in-memory key-value store and local storage in a
//! temp dir, so no database or object store is needed.

#![allow(dead_code)]

use axum_test::TestServer;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vidrelay_api::setup::{routes, services};
use vidrelay_api::state::AppState;
use vidrelay_core::{BaseConfig, Config, RelayConfig, StorageBackend};
use vidrelay_db::MemoryKv;
use vidrelay_storage::{ConfiguredStorage, LinkSigner, LocalStorage};

pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-0123456789abcdef";
pub const FILES_BASE_URL: &str = "http://localhost/files";

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage_dir(&self) -> &std::path::Path {
        self._temp_dir.path()
    }
}

pub fn test_config(storage_path: &str, public_domain: Option<&str>, progress_interval: u64) -> Config {
    Config(Box::new(RelayConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            db_max_connections: 1,
            db_timeout_seconds: 5,
            log_json: false,
        },
        database_url: None,
        storage_backend: StorageBackend::Local,
        r2_account_id: None,
        r2_access_key_id: None,
        r2_secret_access_key: None,
        r2_bucket_name: None,
        s3_endpoint: None,
        s3_region: "auto".to_string(),
        public_domain: public_domain.map(String::from),
        local_storage_path: Some(storage_path.to_string()),
        local_storage_base_url: Some(FILES_BASE_URL.to_string()),
        link_signing_secret: Some(TEST_SIGNING_SECRET.to_string()),
        progress_interval_bytes: progress_interval,
        multipart_part_size_bytes: 8 * 1024 * 1024,
        download_link_ttl_hours: 3,
        history_limit: 20,
        source_connect_timeout_secs: 5,
    }))
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(None, 2 * 1024 * 1024).await
}

pub async fn setup_test_app_with(public_domain: Option<&str>, progress_interval: u64) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let storage_path = temp_dir.path().to_string_lossy().to_string();
    let config = test_config(&storage_path, public_domain, progress_interval);

    let signer = LinkSigner::new(TEST_SIGNING_SECRET).expect("Failed to create link signer");
    let storage = LocalStorage::new(temp_dir.path(), FILES_BASE_URL.to_string(), signer.clone())
        .await
        .expect("Failed to create local storage");
    let configured = ConfiguredStorage {
        storage: Arc::new(storage),
        link_signer: Some(signer),
    };

    let state = services::initialize_services(&config, Arc::new(MemoryKv::new()), configured)
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Poll `/api/status/{id}` until the job leaves `processing`.
pub async fn wait_for_terminal(client: &TestServer, job_id: &str) -> Value {
    for _ in 0..200 {
        let job: Value = client.get(&format!("/api/status/{}", job_id)).await.json();
        if job["status"] != "processing" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} did not finish in time", job_id);
}
