use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::Environment;
use crate::services::processor::SimplifyError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No file uploaded")]
    NoFileUploaded,

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File too large: {0}")]
    FileTooLarge(String),

    #[error("File path is required")]
    FilePathRequired,

    #[error("Bad Request: {0}")]
    InvalidRequest(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Processing failed: {message}")]
    ProcessingFailed {
        message: String,
        details: Option<String>,
    },

    #[error("Processing timeout: {0}")]
    ProcessingTimeout(String),

    /// `cause` is only populated outside production
    #[error("Internal Server Error: {message}")]
    Internal {
        message: String,
        cause: Option<String>,
    },
}

impl AppError {
    pub fn internal(err: impl std::fmt::Display, environment: Environment) -> Self {
        let cause = err.to_string();
        tracing::error!("Internal error: {}", cause);
        AppError::Internal {
            message: "Internal server error".to_string(),
            cause: (!environment.is_production()).then_some(cause),
        }
    }

    /// Stable machine-readable code carried in the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NoFileUploaded => "NO_FILE_UPLOADED",
            AppError::UploadFailed(_) => "UPLOAD_FAILED",
            AppError::FileTooLarge(_) => "FILE_TOO_LARGE",
            AppError::FilePathRequired => "FILE_PATH_REQUIRED",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::FileNotFound(_) => "FILE_NOT_FOUND",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::ProcessingFailed { .. } => "PROCESSING_FAILED",
            AppError::ProcessingTimeout(_) => "PROCESSING_TIMEOUT",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoFileUploaded
            | AppError::UploadFailed(_)
            | AppError::FileTooLarge(_)
            | AppError::FilePathRequired
            | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FileNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProcessingTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::ServiceUnavailable(_)
            | AppError::ProcessingFailed { .. }
            | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of every failed request
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            error: code.to_string(),
            message: message.into(),
            details,
        }
    }
}

impl From<SimplifyError> for AppError {
    fn from(err: SimplifyError) -> Self {
        match err {
            SimplifyError::FileNotFound(path) => AppError::FileNotFound(format!(
                "The specified file does not exist: {}",
                path.display()
            )),
            SimplifyError::ScriptUnavailable(_) => AppError::ServiceUnavailable(
                "Document processing service is not available".to_string(),
            ),
            SimplifyError::Spawn(e) => AppError::ProcessingFailed {
                message: "Failed to start document processing".to_string(),
                details: Some(e.to_string()),
            },
            SimplifyError::Timeout(limit) => AppError::ProcessingTimeout(format!(
                "Document processing took longer than {} seconds",
                limit.as_secs()
            )),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details) = match self {
            AppError::NoFileUploaded => ("Please select a file to upload".to_string(), None),
            AppError::FilePathRequired => {
                ("Please provide the path of an uploaded file".to_string(), None)
            }
            AppError::UploadFailed(msg)
            | AppError::FileTooLarge(msg)
            | AppError::InvalidRequest(msg)
            | AppError::FileNotFound(msg)
            | AppError::ProcessingTimeout(msg) => (msg, None),
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (msg, None)
            }
            AppError::ProcessingFailed { message, details } => {
                tracing::error!("Processing failed: {} ({:?})", message, details);
                (message, details)
            }
            AppError::Internal { message, cause } => (cause.unwrap_or(message), None),
        };

        (status, Json(ErrorBody::new(code, message, details))).into_response()
    }
}
