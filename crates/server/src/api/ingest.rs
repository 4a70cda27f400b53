//! Ingestion API handlers.

use std::io;
use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap},
    Json,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use tracing::info;

use crate::api::ApiError;
use crate::state::AppState;

/// Lets a direct upload choose its session id so it can be polled mid-request.
pub const UPLOAD_ID_HEADER: &str = "x-upload-id";

const FILE_FIELD: &str = "file";

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IngestUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Processing,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Remote asset id; empty until a URL ingest completes.
    pub file_name: String,
    pub status: IngestStatus,
    pub upload_id: String,
    pub display_name: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/ingest
///
/// Multipart body with a `file` part (ingested inline), or JSON `{ "url": ... }`
/// (ingested in the background).
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
) -> Result<Json<IngestResponse>, ApiError> {
    let ctx = state.api_context(&headers)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        ingest_multipart(&state, &headers, multipart, &ctx).await
    } else {
        let Json(body) = Json::<IngestUrlRequest>::from_request(request, &state)
            .await
            .map_err(|_| ApiError::bad_request("No file or URL provided"))?;
        let url = body
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("No file or URL provided"))?;

        let upload_id = state.coordinator().ingest_url(&url, ctx)?;
        Ok(Json(IngestResponse {
            file_name: String::new(),
            status: IngestStatus::Processing,
            upload_id,
            display_name: String::new(),
        }))
    }
}

async fn ingest_multipart(
    state: &AppState,
    headers: &HeaderMap,
    mut multipart: Multipart,
    ctx: &mediaflow_core::ApiContext,
) -> Result<Json<IngestResponse>, ApiError> {
    // Whole-request length; close enough to the file size for progress.
    let size_hint = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let upload_id = headers
        .get(UPLOAD_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or("video.mp4")
            .to_string();
        let mime_type = field.content_type().map(str::to_string);
        info!(filename = %filename, size_hint, "Receiving multipart upload");

        let stream = Box::pin(field.map_err(io::Error::other));
        let receipt = state
            .coordinator()
            .ingest_upload(
                StreamReader::new(stream),
                &filename,
                mime_type.as_deref(),
                size_hint,
                upload_id,
                ctx,
            )
            .await?;

        return Ok(Json(IngestResponse {
            file_name: receipt.asset_id,
            status: IngestStatus::Success,
            upload_id: receipt.upload_id,
            display_name: receipt.display_name,
        }));
    }

    Err(ApiError::bad_request("No file or URL provided"))
}
