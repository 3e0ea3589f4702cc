//! Error types for the WikiOCR server

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::process::{OptionsError, ProcessError};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// HTTP-facing error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("No file provided. Use field name 'file' or 'pdf'")]
    MissingFile,

    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("{}", .0.body_text())]
    NotMultipart(#[from] MultipartRejection),

    #[error(transparent)]
    Processing(#[from] ProcessError),
}

impl From<OptionsError> for AppError {
    fn from(err: OptionsError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Multipart(e) => e.status(),
            AppError::NotMultipart(e) => e.status(),
            AppError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Processing(e) => tracing::error!("Processing error: {}", e),
            other => tracing::warn!("Rejected request: {}", other),
        }

        let body = Json(ErrorResponse {
            detail: self.to_string(),
        });

        (status, body).into_response()
    }
}
