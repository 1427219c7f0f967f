use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadLinkQuery {
    /// Stream URL of a stored object; its last path segment names the object
    pub url: Option<String>,
    /// Object key; takes precedence over `url`
    pub name: Option<String>,
    /// `json` returns the link instead of redirecting
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLinkResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}
