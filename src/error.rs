use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Everything that can go wrong between receiving an upload and storing it.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid upload key")]
    InvalidKey,
    #[error("failed to get file: {0}")]
    BadInput(String),
    #[error("invalid filename: {0}")]
    InvalidFilename(String),
    #[error("failed to generate random filename")]
    FilenameGeneration(#[source] rand::Error),
    #[error("error opening output file")]
    StorageOpen(#[source] std::io::Error),
    #[error("failed to write to output file after {written} bytes")]
    StorageWrite {
        written: u64,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    pub fn bad_input(msg: impl Into<String>) -> Self {
        UploadError::BadInput(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::InvalidKey => StatusCode::UNAUTHORIZED,
            UploadError::BadInput(_) | UploadError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            UploadError::FilenameGeneration(_)
            | UploadError::StorageOpen(_)
            | UploadError::StorageWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code used in JSON bodies.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::InvalidKey => "InvalidKey",
            UploadError::BadInput(_) => "BadInput",
            UploadError::InvalidFilename(_) => "InvalidFilename",
            UploadError::FilenameGeneration(_) => "FilenameGeneration",
            UploadError::StorageOpen(_) => "StorageOpen",
            UploadError::StorageWrite { .. } => "StorageWrite",
        }
    }

    /// Short text shown to clients. Server-side failures only get the
    /// canonical status text; the details go to the log.
    pub fn reason(&self) -> &'static str {
        match self {
            UploadError::InvalidKey => "invalid upload key",
            UploadError::BadInput(_) => "failed to get file",
            UploadError::InvalidFilename(_) => "invalid filename",
            _ => self
                .status_code()
                .canonical_reason()
                .unwrap_or("Internal Server Error"),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: &'static str,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code(),
            message: self.reason(),
        };
        (self.status_code(), axum::Json(body)).into_response()
    }
}
