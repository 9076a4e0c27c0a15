//! `{ok: false, error}` responses.

use crate::error::{PearlError, ResearchError, RunnerError, StoreError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
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

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<PearlError> for ApiError {
    fn from(err: PearlError) -> Self {
        match err {
            PearlError::InvalidInput { message } => Self::bad_request(message),
            PearlError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            PearlError::Research(ResearchError::UnknownCountry { .. }) => {
                Self::bad_request(err.to_string())
            }
            PearlError::Runner(RunnerError::NotRunning { .. } | RunnerError::CursorMismatch { .. })
            | PearlError::Store(StoreError::VersionConflict { .. }) => {
                Self::new(StatusCode::CONFLICT, err.to_string())
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = self.message.as_str(), "Request failed");
        } else {
            warn!(status = self.status.as_u16(), error = self.message.as_str(), "Request rejected");
        }
        (self.status, Json(json!({ "ok": false, "error": self.message }))).into_response()
    }
}
