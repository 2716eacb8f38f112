/// Unified error types for the annotation ledger
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for annotation operations
#[derive(Error, Debug)]
pub enum AnnotationError {
    /// Malformed or missing caller input
    #[error("{0}")]
    InvalidRequest(String),

    /// Unknown image or unknown annotation pairing
    #[error("{0}")]
    NotFound(String),

    /// Duplicate external id on insert
    #[error("{0}")]
    Conflict(String),

    /// History query without any filter
    #[error("{0}")]
    InvalidQuery(String),

    /// Underlying read/write failed
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnnotationError {
    /// Stable machine-readable kind carried in the envelope
    pub fn kind(&self) -> &'static str {
        match self {
            AnnotationError::InvalidRequest(_) => "InvalidRequest",
            AnnotationError::NotFound(_) => "NotFound",
            AnnotationError::Conflict(_) => "Conflict",
            AnnotationError::InvalidQuery(_) => "InvalidQuery",
            AnnotationError::Storage(_) | AnnotationError::Migration(_) => "StorageFailure",
            AnnotationError::Config(_) | AnnotationError::Internal(_) | AnnotationError::Io(_) => {
                "InternalError"
            }
        }
    }

    /// Whether the error was caused by the caller rather than the server
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AnnotationError::InvalidRequest(_)
                | AnnotationError::NotFound(_)
                | AnnotationError::Conflict(_)
                | AnnotationError::InvalidQuery(_)
        )
    }
}

/// Failure envelope returned to callers
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    pub error: String,
}

/// Convert AnnotationError to the uniform JSON envelope.
///
/// The presentation layer branches on `success`, so every outcome is sent
/// with a 200 status.
impl IntoResponse for AnnotationError {
    fn into_response(self) -> Response {
        let message = if self.is_caller_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "request failed");
            match self {
                AnnotationError::Storage(_) | AnnotationError::Migration(_) => {
                    "Storage failure".to_string()
                }
                _ => "Internal server error".to_string(), // Don't leak details
            }
        };

        Json(ErrorEnvelope {
            success: false,
            message,
            error: self.kind().to_string(),
        })
        .into_response()
    }
}

// Extractor rejections are caller errors and travel in the same envelope

impl From<JsonRejection> for AnnotationError {
    fn from(rejection: JsonRejection) -> Self {
        AnnotationError::InvalidRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AnnotationError {
    fn from(rejection: QueryRejection) -> Self {
        AnnotationError::InvalidRequest(format!("Invalid query: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AnnotationError {
    fn from(rejection: PathRejection) -> Self {
        AnnotationError::InvalidRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

/// Result type alias for annotation operations
pub type AnnoResult<T> = Result<T, AnnotationError>;
