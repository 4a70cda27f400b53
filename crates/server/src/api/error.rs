//! Mapping pipeline errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mediaflow_core::ingest::IngestError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by API handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        let status = match &e {
            IngestError::Configuration(_) | IngestError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            IngestError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            IngestError::Download { .. }
            | IngestError::RemoteSubmit(_)
            | IngestError::Remote(_) => StatusCode::BAD_GATEWAY,
            IngestError::ProcessingTimeout => StatusCode::GATEWAY_TIMEOUT,
            IngestError::ProcessingFailed | IngestError::Upload(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<mediaflow_core::RemoteServiceError> for ApiError {
    fn from(e: mediaflow_core::RemoteServiceError) -> Self {
        IngestError::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
