//! Download link resolution
//!
//! Turns an object key into a time-limited link that forces a download
//! (`Content-Disposition: attachment`) instead of inline playback.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use vidrelay_core::filename::last_path_segment;
use vidrelay_core::AppError;
use vidrelay_storage::keys::key_filename;
use vidrelay_storage::{ObjectStorage, ResponseOverrides, StorageError};

use crate::public_domain::PublicDomain;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Pick the object key a download request refers to.
///
/// A non-blank `name` wins. Otherwise the last path segment of `url` is used,
/// percent-decoded so it matches the key the object was stored under.
pub fn select_object_key(url: Option<&str>, name: Option<&str>) -> Result<String, AppError> {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }

    let segment = url
        .map(str::trim)
        .map(last_path_segment)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Either url or name is required".to_string()))?;

    if segment.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Could not determine an object key from url".to_string(),
        ));
    }
    Ok(segment)
}

#[derive(Clone)]
pub struct DownloadLinkResolver {
    storage: Arc<dyn ObjectStorage>,
    public_domain: Option<PublicDomain>,
    ttl: Duration,
}

impl DownloadLinkResolver {
    pub fn new(storage: Arc<dyn ObjectStorage>, public_domain: Option<PublicDomain>, ttl: Duration) -> Self {
        Self {
            storage,
            public_domain,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, key: &str) -> Result<ResolvedLink, AppError> {
        let overrides = ResponseOverrides::attachment(key_filename(key));

        let signed = self
            .storage
            .presigned_download_url(key, self.ttl, &overrides)
            .await
            .map_err(|e| match e {
                StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
                other => {
                    tracing::error!(error = %other, key = %key, "Failed to sign download link");
                    AppError::LinkResolution(other.to_string())
                }
            })?;

        let url = match &self.public_domain {
            Some(domain) => match domain.rewrite(&signed) {
                Ok(rewritten) => rewritten,
                Err(e) => {
                    tracing::warn!(error = %e, "Public domain rewrite failed, returning provider link");
                    signed
                }
            },
            None => signed,
        };

        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(1));

        Ok(ResolvedLink { url, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vidrelay_storage::{LinkSigner, LocalStorage};

    #[test]
    fn test_name_takes_precedence() {
        assert_eq!(
            select_object_key(Some("https://cdn/x.mp4"), Some(" a.mp4 ")).unwrap(),
            "a.mp4"
        );
    }

    #[test]
    fn test_key_from_url_is_decoded() {
        assert_eq!(
            select_object_key(Some("https://cdn.example.com/my%20clip.mp4?x=1"), None).unwrap(),
            "my clip.mp4"
        );
        assert_eq!(
            select_object_key(Some("https://cdn.example.com/x.mp4"), Some("  ")).unwrap(),
            "x.mp4"
        );
    }

    #[test]
    fn test_missing_key_is_invalid_input() {
        assert!(matches!(
            select_object_key(None, None),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            select_object_key(Some("https://cdn.example.com/"), None),
            Err(AppError::InvalidInput(_))
        ));
    }

    async fn resolver(public_domain: Option<&str>) -> (TempDir, DownloadLinkResolver) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(
            dir.path(),
            "http://127.0.0.1:8000/files".to_string(),
            LinkSigner::new("0123456789abcdef0123456789abcdef").unwrap(),
        )
        .await
        .unwrap();
        let resolver = DownloadLinkResolver::new(
            Arc::new(storage),
            public_domain.and_then(PublicDomain::new),
            Duration::from_secs(3600),
        );
        (dir, resolver)
    }

    #[tokio::test]
    async fn test_link_forces_attachment() {
        let (_dir, resolver) = resolver(None).await;
        let before = Utc::now();
        let link = resolver.resolve("a.mp4").await.unwrap();

        assert!(link.url.starts_with("http://127.0.0.1:8000/files/a.mp4?"));
        assert!(link.url.contains("token="));
        assert!(link.url.contains("response-content-disposition=attachment"));
        assert!(link.url.contains("a.mp4"));
        assert!(link.expires_at >= before + chrono::Duration::seconds(3599));
    }

    #[tokio::test]
    async fn test_public_domain_rewrites_authority() {
        let (_dir, resolver) = resolver(Some("https://cdn.example.com")).await;
        let link = resolver.resolve("a.mp4").await.unwrap();
        assert!(link.url.starts_with("https://cdn.example.com/files/a.mp4?token="));
    }

    #[tokio::test]
    async fn test_unrewritable_domain_keeps_provider_link() {
        let (_dir, resolver) = resolver(Some("https://exa mple.com")).await;
        let link = resolver.resolve("a.mp4").await.unwrap();
        assert!(link.url.starts_with("http://127.0.0.1:8000/files/a.mp4?"));
    }

    #[tokio::test]
    async fn test_invalid_key_is_invalid_input() {
        let (_dir, resolver) = resolver(None).await;
        assert!(matches!(
            resolver.resolve("../etc/passwd").await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
