//! Signed file route for the local storage backend.
//! Serves the objects behind the links `LocalStorage` signs; no other auth.

use crate::error::HttpAppError;
use crate::state::LinkState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use vidrelay_core::constants::DOWNLOAD_CONTENT_TYPE;
use vidrelay_core::AppError;
use vidrelay_storage::keys::key_filename;
use vidrelay_storage::ResponseOverrides;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub token: Option<String>,
    #[serde(rename = "response-content-disposition")]
    pub content_disposition: Option<String>,
    #[serde(rename = "response-content-type")]
    pub content_type: Option<String>,
}

/// Stream an object as an attachment after checking its link token.
#[tracing::instrument(skip(links, query), fields(operation = "get_file"))]
pub async fn get_file(
    State(links): State<LinkState>,
    Path(key): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, HttpAppError> {
    let signer = links
        .link_signer
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Signed file links are not enabled".to_string()))?;

    let token = query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing token parameter".to_string()))?;

    let overrides = ResponseOverrides {
        content_disposition: query.content_disposition,
        content_type: query.content_type,
    };
    signer.verify(token, &key, &overrides)?;

    let stream = links.storage.download_stream(&key).await.map_err(|e| {
        tracing::warn!(error = %e, key = %key, "Failed to open signed file");
        HttpAppError::from(e)
    })?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let fallback = ResponseOverrides::attachment(key_filename(&key));
    let disposition = overrides
        .content_disposition
        .or(fallback.content_disposition)
        .unwrap_or_else(|| "attachment".to_string());
    let content_type = overrides
        .content_type
        .unwrap_or_else(|| DOWNLOAD_CONTENT_TYPE.to_string());

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })?;

    Ok(response)
}
