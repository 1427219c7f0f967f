//! Force-download links.
//!
//! Both routes resolve the same signed, attachment-forcing link; they differ
//! only in whether the client is redirected or handed the link as JSON.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::LinkState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use vidrelay_core::models::{DownloadLinkQuery, DownloadLinkResponse};
use vidrelay_services::{select_object_key, ResolvedLink};

async fn resolve(links: &LinkState, query: &DownloadLinkQuery) -> Result<ResolvedLink, HttpAppError> {
    let key = select_object_key(query.url.as_deref(), query.name.as_deref())?;
    Ok(links.resolver.resolve(&key).await?)
}

fn wants_json(query: &DownloadLinkQuery) -> bool {
    query
        .format
        .as_deref()
        .is_some_and(|format| format.trim().eq_ignore_ascii_case("json"))
}

fn link_body(link: ResolvedLink) -> Json<DownloadLinkResponse> {
    Json(DownloadLinkResponse {
        url: link.url,
        expires_at: link.expires_at,
    })
}

#[utoipa::path(
    get,
    path = "/api/force-download",
    tag = "downloads",
    params(DownloadLinkQuery),
    responses(
        (status = 307, description = "Redirect to a signed download link"),
        (status = 200, description = "Signed link, when format=json", body = DownloadLinkResponse),
        (status = 400, description = "Neither url nor name identifies an object", body = ErrorResponse),
        (status = 502, description = "Storage could not sign the link", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(links), fields(operation = "force_download"))]
pub async fn force_download(
    State(links): State<LinkState>,
    Query(query): Query<DownloadLinkQuery>,
) -> Result<Response, HttpAppError> {
    let link = resolve(&links, &query).await?;
    if wants_json(&query) {
        return Ok(link_body(link).into_response());
    }
    Ok(Redirect::temporary(&link.url).into_response())
}

#[utoipa::path(
    get,
    path = "/api/download-link",
    tag = "downloads",
    params(DownloadLinkQuery),
    responses(
        (status = 200, description = "Signed download link", body = DownloadLinkResponse),
        (status = 400, description = "Neither url nor name identifies an object", body = ErrorResponse),
        (status = 502, description = "Storage could not sign the link", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(links), fields(operation = "download_link"))]
pub async fn download_link(
    State(links): State<LinkState>,
    Query(query): Query<DownloadLinkQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let link = resolve(&links, &query).await?;
    Ok(link_body(link))
}
