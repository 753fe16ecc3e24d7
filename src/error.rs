use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::session::SessionError;

/// Errors returned by the HTTP handlers. Merge failures are not in here:
/// they are reported through the merge status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unknown session")]
    SessionNotFound,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("upload at least one image first")]
    NoImages,

    #[error("a merge is already running for this session")]
    MergeInProgress,

    #[error("unsupported upload {0:?}: only PNG and JPEG images are accepted")]
    UnsupportedUpload(String),

    #[error("invalid upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::SessionNotFound => StatusCode::NOT_FOUND,
            AppError::MergeInProgress => StatusCode::CONFLICT,
            AppError::Session(_)
            | AppError::NoImages
            | AppError::UnsupportedUpload(_)
            | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(error = %self, %status, "request rejected");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
