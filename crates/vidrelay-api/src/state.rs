//! Application state and sub-state extractors.
//!
//! Handlers extract only the sub-state they need via Axum's `FromRef`.

use std::sync::Arc;

use vidrelay_db::{HistoryLedger, JobManager, KeyValueStore};
use vidrelay_services::{DownloadLinkResolver, UploadLauncher};
use vidrelay_storage::{LinkSigner, ObjectStorage};

// ----- Sub-state types -----

/// Key-value store and the repositories built on it.
#[derive(Clone)]
pub struct KvState {
    pub store: Arc<dyn KeyValueStore>,
    pub jobs: JobManager,
    pub history: HistoryLedger,
}

/// Starts relays.
#[derive(Clone)]
pub struct RelayState {
    pub launcher: UploadLauncher,
}

/// Download link resolution and the signed files route.
#[derive(Clone)]
pub struct LinkState {
    pub resolver: DownloadLinkResolver,
    pub storage: Arc<dyn ObjectStorage>,
    /// Set for the local backend only
    pub link_signer: Option<LinkSigner>,
}

// ----- AppState -----

#[derive(Clone)]
pub struct AppState {
    pub kv: KvState,
    pub relay: RelayState,
    pub links: LinkState,
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for KvState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.kv.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for RelayState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.relay.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for LinkState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.links.clone()
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
