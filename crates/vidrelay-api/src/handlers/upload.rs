use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::RelayState;
use axum::{extract::State, response::IntoResponse, Json};
use vidrelay_core::models::{StartUploadRequest, StartUploadResponse};
use vidrelay_core::{derive_filename, AppError};

/// Start relaying a video from a source URL into storage.
///
/// Answers as soon as the job record exists; the transfer runs in the background.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "uploads",
    request_body = StartUploadRequest,
    responses(
        (status = 200, description = "Relay started", body = StartUploadResponse),
        (status = 400, description = "Missing or blank url", body = ErrorResponse),
        (status = 500, description = "Job store unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(relay, request), fields(operation = "start_upload"))]
pub async fn start_upload(
    State(relay): State<RelayState>,
    ValidatedJson(request): ValidatedJson<StartUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let source_url = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::InvalidInput("url is required".to_string()))?;

    let filename = derive_filename(source_url, request.custom_name.as_deref());
    let started = relay
        .launcher
        .start(source_url.to_string(), filename)
        .await?;

    Ok(Json(StartUploadResponse {
        job_id: started.job_id,
    }))
}
