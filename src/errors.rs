use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{
    fmt, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Which half of the namespace an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Bucket,
    Object,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameKind::Bucket => f.write_str("bucket"),
            NameKind::Object => f.write_str("object"),
        }
    }
}

/// Failures raised by the storage core.
///
/// Every filesystem failure carries the operation and the path it touched so
/// callers can log it without extra context.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid {kind} name `{name}`: must not be empty or contain '..', '/' or '\\'")]
    InvalidName { kind: NameKind, name: String },
    #[error("storage directory `{}` {reason}", .path.display())]
    Configuration { path: PathBuf, reason: &'static str },
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{object}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, object: String },
    #[error("failed to {op} `{}`: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed properties in `{}` at line {line}: {reason}", .path.display())]
    MalformedProperties {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl StorageError {
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::InvalidName { .. } => {
                AppError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            StorageError::BucketNotFound(_) | StorageError::ObjectNotFound { .. } => {
                AppError::not_found(err.to_string())
            }
            StorageError::Configuration { .. } => {
                tracing::error!("storage misconfigured: {}", err);
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            StorageError::Io { .. } | StorageError::MalformedProperties { .. } => {
                tracing::error!("storage failure: {}", err);
                AppError::internal(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
