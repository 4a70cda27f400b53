//! Remote asset management handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use mediaflow_core::RemoteAsset;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<RemoteAsset>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenameResponse {
    pub status: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub file_name: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<FileListResponse>, ApiError> {
    let ctx = state.api_context(&headers)?;
    let files = state.assets().list(&ctx).await?;
    Ok(Json(FileListResponse { files }))
}

/// GET /api/files/{*name}
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RemoteAsset>, ApiError> {
    let ctx = state.api_context(&headers)?;
    let asset = state.assets().lookup(&ctx, &name).await?;
    Ok(Json(asset))
}

/// PATCH /api/files/{*name}
pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RenameRequest>,
) -> Result<Json<RenameResponse>, ApiError> {
    let ctx = state.api_context(&headers)?;
    let display_name = body.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::bad_request("display_name is required"));
    }

    state.assets().rename(&ctx, &name, display_name).await?;
    Ok(Json(RenameResponse {
        status: "success".to_string(),
        name,
        display_name: display_name.to_string(),
    }))
}

/// DELETE /api/files/{*name}
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>, ApiError> {
    let ctx = state.api_context(&headers)?;
    state.assets().delete(&ctx, &name).await?;
    Ok(Json(DeleteResponse {
        status: "deleted".to_string(),
        file_name: name,
    }))
}
