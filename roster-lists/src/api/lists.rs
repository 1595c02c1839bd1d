//! Contact list upload and retrieval
//!
//! POST /api/lists/upload, GET /api/lists

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use roster_common::db::DistributionBatch;
use serde::Serialize;
use tracing::debug;

use crate::db::lists;
use crate::error::ApiResult;
use crate::ingest::{IngestError, TempUpload, UploadSummary};
use crate::AppState;

/// Multipart field carrying the upload
pub const FILE_FIELD: &str = "file";

/// Allowance for multipart framing on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// POST /api/lists/upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: UploadSummary,
}

/// GET /api/lists response
#[derive(Debug, Serialize)]
pub struct ListsResponse {
    pub success: bool,
    pub count: usize,
    pub lists: Vec<DistributionBatch>,
}

/// POST /api/lists/upload
///
/// Stages the `file` part and runs it through the pipeline. A previous
/// distribution is only replaced when every stage succeeds.
pub async fn upload_list(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, IngestError> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "Request is not a multipart upload");
        IngestError::NoFileProvided
    })?;

    let (file_name, bytes) = read_file_field(&mut multipart, state.max_upload_bytes).await?;

    let uploads_dir = state.uploads_dir.clone();
    let upload =
        tokio::task::spawn_blocking(move || TempUpload::stage(&uploads_dir, &file_name, &bytes))
            .await
            .map_err(|e| IngestError::Unexpected(format!("Staging task failed: {}", e)))??;

    let summary = state.pipeline().run(upload).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded and contacts distributed successfully".to_string(),
        summary,
    }))
}

/// Find the `file` part and buffer it, enforcing the size limit
async fn read_file_field(
    multipart: &mut Multipart,
    max_upload_bytes: usize,
) -> Result<(String, Bytes), IngestError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_upload_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        // Browsers send an unnamed empty part when no file was chosen
        let file_name = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => return Err(IngestError::NoFileProvided),
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_upload_bytes))?;

        if bytes.len() > max_upload_bytes {
            return Err(IngestError::FileTooLarge(max_upload_bytes));
        }

        return Ok((file_name, bytes));
    }

    Err(IngestError::NoFileProvided)
}

fn multipart_error(err: MultipartError, max_upload_bytes: usize) -> IngestError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IngestError::FileTooLarge(max_upload_bytes)
    } else {
        IngestError::MalformedUpload(err.body_text())
    }
}

/// GET /api/lists
///
/// Current distribution, ordered by agent name.
pub async fn get_lists(State(state): State<AppState>) -> ApiResult<Json<ListsResponse>> {
    let lists = lists::fetch_all_lists(&state.db).await?;

    Ok(Json(ListsResponse {
        success: true,
        count: lists.len(),
        lists,
    }))
}

/// Build list routes
pub fn list_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/lists/upload",
            post(upload_list).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
            )),
        )
        .route("/api/lists", get(get_lists))
}
