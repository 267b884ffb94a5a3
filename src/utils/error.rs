//! Error types and handling
//!
//! Common error taxonomy used across the client. Every variant is
//! recoverable: the component that raised it stays usable and can be
//! re-triggered by the user.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    DeviceNotFound(String),

    #[error("{0}")]
    DeviceBusy(String),

    #[error("{0}")]
    ConstraintsUnsatisfiable(String),

    #[error("{0}")]
    Channel(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("{0}")]
    Unknown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Stable machine-readable code for the presentation layer
    pub fn code(&self) -> &'static str {
        match self {
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            AppError::DeviceBusy(_) => "DEVICE_BUSY",
            AppError::ConstraintsUnsatisfiable(_) => "CONSTRAINTS_UNSATISFIABLE",
            AppError::Channel(_) => "CHANNEL_ERROR",
            AppError::UploadFailed(_) => "UPLOAD_FAILED",
            AppError::AnalysisFailed(_) => "ANALYSIS_FAILED",
            AppError::Unknown(_) => "UNKNOWN",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Actionable hint shown under the message, if any
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            AppError::PermissionDenied(_) => {
                Some("Try refreshing and allowing camera permissions when prompted.")
            }
            AppError::DeviceNotFound(_) => Some("Connect a camera and retry."),
            AppError::DeviceBusy(_) => {
                Some("Close other applications using the camera, then retry.")
            }
            AppError::UploadFailed(_) => Some("Check the file and retry the upload."),
            AppError::AnalysisFailed(_) => Some("Retry the analysis."),
            _ => None,
        }
    }

    /// Errors handled locally without user action.
    ///
    /// Unsatisfiable constraints get an automatic relaxed retry, and a
    /// channel failure leaves the raw camera feed running.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::ConstraintsUnsatisfiable(_) | AppError::Channel(_)
        )
    }
}

/// Error response for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
