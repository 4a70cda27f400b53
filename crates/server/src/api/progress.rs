use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use mediaflow_core::IngestionSession;

use crate::state::AppState;

/// GET /api/progress/{upload_id}
///
/// Unknown ids yield the "unknown" sentinel snapshot rather than a 404.
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<String>,
) -> Json<IngestionSession> {
    Json(state.tracker().get(&upload_id))
}
