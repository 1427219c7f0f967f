//! Signed tokens for local-backend download links.
//!
//! Payload: expiry_ts (u64 BE) || SHA-256(key \n content-disposition \n content-type) = 40 bytes.
//! Token = base64url(payload || HMAC-SHA256(secret, payload)).
//!
//! Binding the response overrides into the digest means a link cannot be
//! replayed with different headers.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::traits::{ResponseOverrides, StorageError, StorageResult};

const DIGEST_LEN: usize = 32;
const PAYLOAD_LEN: usize = 8 + DIGEST_LEN; // expiry + request digest
const MAC_LEN: usize = 32; // SHA256
const TOKEN_LEN: usize = PAYLOAD_LEN + MAC_LEN;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkTokenError {
    #[error("Invalid download token")]
    Invalid,

    #[error("Download token has expired")]
    Expired,
}

/// Signs and verifies download links with a shared secret.
#[derive(Clone)]
pub struct LinkSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner").finish_non_exhaustive()
    }
}

fn request_digest(key: &str, overrides: &ResponseOverrides) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(b"\n");
    hasher.update(overrides.content_disposition.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\n");
    hasher.update(overrides.content_type.as_deref().unwrap_or("").as_bytes());
    hasher.finalize().into()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl LinkSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> StorageResult<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(StorageError::ConfigError(
                "Link signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    fn mac(&self) -> StorageResult<Hmac<Sha256>> {
        Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| StorageError::ConfigError(format!("Invalid signing secret: {}", e)))
    }

    /// Build a token valid for `expires_in`. Returns the token and its expiry (unix seconds).
    pub fn create(
        &self,
        key: &str,
        overrides: &ResponseOverrides,
        expires_in: Duration,
    ) -> StorageResult<(String, u64)> {
        let expiry_ts = unix_now().saturating_add(expires_in.as_secs());
        let token = self.create_with_expiry(key, overrides, expiry_ts)?;
        Ok((token, expiry_ts))
    }

    fn create_with_expiry(
        &self,
        key: &str,
        overrides: &ResponseOverrides,
        expiry_ts: u64,
    ) -> StorageResult<String> {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0..8].copy_from_slice(&expiry_ts.to_be_bytes());
        payload[8..].copy_from_slice(&request_digest(key, overrides));

        let mut mac = self.mac()?;
        mac.update(&payload);
        let tag = mac.finalize().into_bytes();

        let mut token_bytes = [0u8; TOKEN_LEN];
        token_bytes[0..PAYLOAD_LEN].copy_from_slice(&payload);
        token_bytes[PAYLOAD_LEN..].copy_from_slice(&tag);

        Ok(base64_url_encode(&token_bytes))
    }

    /// Verify a token for this key and overrides, and that it has not expired.
    pub fn verify(
        &self,
        token: &str,
        key: &str,
        overrides: &ResponseOverrides,
    ) -> Result<(), LinkTokenError> {
        self.verify_at(token, key, overrides, unix_now())
    }

    fn verify_at(
        &self,
        token: &str,
        key: &str,
        overrides: &ResponseOverrides,
        now: u64,
    ) -> Result<(), LinkTokenError> {
        let decoded = base64_url_decode(token).map_err(|_| LinkTokenError::Invalid)?;
        if decoded.len() != TOKEN_LEN {
            return Err(LinkTokenError::Invalid);
        }
        let (payload, tag) = decoded.split_at(PAYLOAD_LEN);

        let mut mac = self.mac().map_err(|_| LinkTokenError::Invalid)?;
        mac.update(payload);
        mac.verify_slice(tag).map_err(|_| LinkTokenError::Invalid)?;

        let digest = request_digest(key, overrides);
        if !bool::from(payload[8..].ct_eq(&digest[..])) {
            return Err(LinkTokenError::Invalid);
        }

        let mut expiry_bytes = [0u8; 8];
        expiry_bytes.copy_from_slice(&payload[0..8]);
        if now > u64::from_be_bytes(expiry_bytes) {
            return Err(LinkTokenError::Expired);
        }

        Ok(())
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn base64_url_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s)
}
