//! File lifecycle API handlers.
//!
//! Thin request/response marshalling over the lifecycle manager: the
//! handlers validate nothing themselves beyond JSON shape; field rules
//! (non-empty names, positive sizes) live in the manager so every entry
//! point enforces them identically.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::AppState;

/// Static download presentation page, embedded at compile time.
const DOWNLOAD_PAGE: &str = include_str!("../../static/download.html");

// -- Request / response bodies ------------------------------------------------

/// `POST /api/upload-intent` request body.
///
/// Fields default when omitted so a missing field reaches the manager's
/// validation (400 InvalidArgument) instead of a JSON rejection.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadIntentRequest {
    /// Original filename.
    #[serde(default)]
    pub display_name: String,
    /// MIME type of the file.
    #[serde(default)]
    pub content_type: String,
    /// Declared file size in bytes.
    #[serde(default)]
    pub size_bytes: u64,
}

/// `POST /api/upload-intent` response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadIntentResponse {
    /// Assigned file id; used for the download-info lookup.
    pub id: String,
    /// Signed PUT URL to upload the file bytes to.
    pub upload_url: String,
}

/// `GET /api/download-info/{id}` response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfoResponse {
    /// Original filename, for presentation.
    pub display_name: String,
    /// Declared file size in bytes.
    pub size_bytes: u64,
    /// Signed GET URL to download the file bytes from.
    pub download_url: String,
}

/// `POST /api/sweep` response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponse {
    /// Number of records purged in this pass.
    pub purged_count: u64,
}

// -- Handlers -----------------------------------------------------------------

/// `POST /api/upload-intent` -- register a file and obtain a signed PUT URL.
#[utoipa::path(
    post,
    path = "/api/upload-intent",
    tag = "Files",
    operation_id = "CreateUploadIntent",
    request_body = UploadIntentRequest,
    responses(
        (status = 200, description = "Intent created", body = UploadIntentResponse),
        (status = 400, description = "Missing or invalid request field"),
        (status = 500, description = "Backing store unavailable")
    )
)]
pub async fn upload_intent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadIntentRequest>,
) -> Result<Json<UploadIntentResponse>, ApiError> {
    let intent = state
        .lifecycle
        .create_upload_intent(
            &request.display_name,
            &request.content_type,
            request.size_bytes,
        )
        .await?;

    Ok(Json(UploadIntentResponse {
        id: intent.id,
        upload_url: intent.upload_url,
    }))
}

/// `GET /api/download-info/{id}` -- resolve a download, counting the issuance.
#[utoipa::path(
    get,
    path = "/api/download-info/{id}",
    tag = "Files",
    operation_id = "ResolveDownload",
    params(("id" = String, Path, description = "File id from the upload intent")),
    responses(
        (status = 200, description = "Download granted", body = DownloadInfoResponse),
        (status = 404, description = "Unknown file id"),
        (status = 500, description = "Backing store unavailable")
    )
)]
pub async fn download_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadInfoResponse>, ApiError> {
    let grant = state.lifecycle.resolve_download(&id).await?;

    Ok(Json(DownloadInfoResponse {
        display_name: grant.display_name,
        size_bytes: grant.size_bytes,
        download_url: grant.download_url,
    }))
}

/// `POST /api/sweep` -- purge expired records on demand.
#[utoipa::path(
    post,
    path = "/api/sweep",
    tag = "Files",
    operation_id = "Sweep",
    responses(
        (status = 200, description = "Sweep completed", body = SweepResponse),
        (status = 500, description = "Listing the metadata store failed")
    )
)]
pub async fn sweep(State(state): State<Arc<AppState>>) -> Result<Json<SweepResponse>, ApiError> {
    let purged_count = state.lifecycle.sweep().await?;
    Ok(Json(SweepResponse { purged_count }))
}

/// `GET /download/{id}` -- static download page. Not a lifecycle operation;
/// the page itself calls `/api/download-info/{id}` when the visitor clicks
/// through.
pub async fn download_page(Path(_id): Path<String>) -> impl IntoResponse {
    Html(DOWNLOAD_PAGE)
}
