//! Public domain handling
//!
//! Deployments behind networks that block the storage provider's endpoint
//! configure a public domain. Completed uploads report `<domain>/<key>` and
//! signed links get their authority swapped to the domain's.

use url::Url;
use vidrelay_storage::keys::encode_key_path;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PublicDomainError {
    #[error("public domain '{0}' is not a valid URL")]
    Unparsable(String),

    #[error("public domain '{0}' has no host")]
    MissingHost(String),

    #[error("signed URL '{0}' is not a valid URL")]
    InvalidSignedUrl(String),

    #[error("cannot move signed URL to scheme '{0}'")]
    SchemeRejected(String),
}

/// A configured public domain, e.g. `https://videos.example.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicDomain {
    base: String,
}

impl PublicDomain {
    /// `None` for a blank value. A value without a scheme is taken as https.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let base = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };
        Some(Self { base })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// Public URL of a stored object
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base, encode_key_path(key))
    }

    /// Replace scheme, host and port of `signed_url` with the domain's.
    /// Path, query and signature are left untouched.
    pub fn rewrite(&self, signed_url: &str) -> Result<String, PublicDomainError> {
        let domain =
            Url::parse(&self.base).map_err(|_| PublicDomainError::Unparsable(self.base.clone()))?;
        let host = domain
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| PublicDomainError::MissingHost(self.base.clone()))?;

        let mut url = Url::parse(signed_url)
            .map_err(|_| PublicDomainError::InvalidSignedUrl(signed_url.to_string()))?;

        url.set_scheme(domain.scheme())
            .map_err(|_| PublicDomainError::SchemeRejected(domain.scheme().to_string()))?;
        url.set_host(Some(host))
            .map_err(|_| PublicDomainError::MissingHost(self.base.clone()))?;
        url.set_port(domain.port())
            .map_err(|_| PublicDomainError::MissingHost(self.base.clone()))?;

        Ok(url.to_string())
    }
}
