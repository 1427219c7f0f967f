use crate::error::{ErrorResponse, HttpAppError};
use crate::state::KvState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use vidrelay_core::models::Job;

/// Current state of a relay job. Ids without a record report `unknown`.
#[utoipa::path(
    get,
    path = "/api/status/{id}",
    tag = "uploads",
    params(
        ("id" = String, Path, description = "Job ID returned by /api/upload")
    ),
    responses(
        (status = 200, description = "Job state", body = Job),
        (status = 500, description = "Job store unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(kv), fields(job_id = %id, operation = "get_status"))]
pub async fn get_status(
    State(kv): State<KvState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    // No record can exist under an id that is not a UUID.
    let job = match Uuid::parse_str(id.trim()) {
        Ok(job_id) => kv.jobs.get(job_id).await?,
        Err(_) => None,
    };

    Ok(Json(job.unwrap_or_else(Job::unknown)))
}
