use crate::error::{ErrorResponse, HttpAppError};
use crate::state::KvState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use vidrelay_core::models::{DeleteHistoryResponse, HistoryEntry};
use vidrelay_core::AppError;

#[utoipa::path(
    get,
    path = "/api/history",
    tag = "history",
    responses(
        (status = 200, description = "Completed uploads, newest first", body = Vec<HistoryEntry>),
        (status = 500, description = "Job store unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(kv), fields(operation = "list_history"))]
pub async fn list_history(State(kv): State<KvState>) -> Result<impl IntoResponse, HttpAppError> {
    let entries = kv.history.list().await?;
    Ok(Json(entries))
}

/// Remove one history entry. Deleting an absent entry succeeds.
#[utoipa::path(
    delete,
    path = "/api/history/{ts}",
    tag = "history",
    params(
        ("ts" = i64, Path, description = "Entry timestamp in epoch milliseconds")
    ),
    responses(
        (status = 200, description = "Entry removed", body = DeleteHistoryResponse),
        (status = 400, description = "Timestamp is not an integer", body = ErrorResponse),
        (status = 500, description = "Job store unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(kv), fields(operation = "delete_history"))]
pub async fn delete_history(
    State(kv): State<KvState>,
    Path(ts): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ts: i64 = ts.trim().parse().map_err(|_| {
        AppError::InvalidInput(format!("History timestamp must be an integer, got '{}'", ts))
    })?;

    kv.history.delete(ts).await?;
    Ok(Json(DeleteHistoryResponse { success: true }))
}
