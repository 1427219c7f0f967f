//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use vidrelay_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vidrelay API",
        version = "0.1.0",
        description = "Relays videos from source URLs into object storage, tracks relay jobs, keeps a history of completed uploads and hands out signed download links."
    ),
    paths(
        handlers::upload::start_upload,
        handlers::status::get_status,
        handlers::history::list_history,
        handlers::history::delete_history,
        handlers::download::force_download,
        handlers::download::download_link,
    ),
    components(schemas(
        models::StartUploadRequest,
        models::StartUploadResponse,
        models::Job,
        models::JobStatus,
        models::HistoryEntry,
        models::DeleteHistoryResponse,
        models::DownloadLinkResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "uploads", description = "Start relays and poll their progress"),
        (name = "history", description = "Completed uploads"),
        (name = "downloads", description = "Signed, attachment-forcing download links")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_api_route() {
        let spec = get_openapi_spec();
        for path in [
            "/api/upload",
            "/api/status/{id}",
            "/api/history",
            "/api/history/{ts}",
            "/api/force-download",
            "/api/download-link",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
