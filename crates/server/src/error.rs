use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pvscan_ocr::PipelineError;
use serde_json::json;
use thiserror::Error;

/// Every failure an extraction endpoint can report. The body is always
/// `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file part")]
    NoFileProvided,
    #[error("No selected file")]
    EmptyFilename,
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFileProvided | ApiError::EmptyFilename | ApiError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Pipeline(e) if e.is_rejection() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("extraction failed: {self}");
        } else {
            tracing::warn!("extraction rejected: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
