use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

use crate::json::JsonResponse;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Request body exceeded the configured ceiling
    #[error("body must not be larger than {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// Sniffed content type is not on the allowlist
    #[error("the uploaded file type {content_type} is not permitted")]
    UnsupportedFileType { content_type: String },

    /// Filesystem failure while provisioning a directory or writing a file
    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Request is not a readable multipart/form-data body
    #[error("{message}")]
    Multipart { message: String },

    /// Upload request carried no file parts
    #[error("no files were uploaded")]
    NoFiles,

    /// Invalid caller input
    #[error("{message}")]
    InvalidInput { message: String },

    /// Slug normalization left nothing behind
    #[error("after removing characters, slug is zero length")]
    EmptyResult,

    #[error("body contains badly-formed JSON (at character {offset})")]
    JsonSyntax { offset: usize },

    #[error("body contains badly-formed JSON")]
    JsonTruncated,

    #[error("{}", type_mismatch_message(.field, .offset))]
    JsonTypeMismatch { field: Option<String>, offset: usize },

    #[error("body must not be empty")]
    JsonEmptyBody,

    #[error("body contains unknown key {field}")]
    JsonUnknownField { field: String },

    #[error("body must contain only one JSON value")]
    JsonMultipleDocuments,

    /// Any other decode failure, message passed through
    #[error("{message}")]
    JsonOther { message: String },

    /// Response payload could not be serialized
    #[error("failed to serialize JSON response: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn type_mismatch_message(field: &Option<String>, offset: &usize) -> String {
    match field {
        Some(field) => format!("body contains incorrect JSON type for field {field:?}"),
        None => format!("body contains incorrect JSON type (at character {offset})"),
    }
}

impl Error {
    pub(crate) fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnsupportedFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::Io { .. } | Error::Serialize(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Multipart { .. }
            | Error::NoFiles
            | Error::InvalidInput { .. }
            | Error::EmptyResult
            | Error::JsonSyntax { .. }
            | Error::JsonTruncated
            | Error::JsonTypeMismatch { .. }
            | Error::JsonEmptyBody
            | Error::JsonUnknownField { .. }
            | Error::JsonMultipleDocuments
            | Error::JsonOther { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns a user-safe error message, without leaking filesystem paths or internal details
    pub fn user_message(&self) -> String {
        match self {
            Error::Io { .. } | Error::Serialize(_) | Error::Other(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Io { .. } | Error::Serialize(_) | Error::Other(_) => {
                tracing::error!("Internal toolkit error: {:#}", self);
            }
            Error::PayloadTooLarge { .. } | Error::UnsupportedFileType { .. } => {
                tracing::warn!("Rejected request: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = JsonResponse::<()>::error(self.user_message());

        (status, axum::response::Json(body)).into_response()
    }
}

/// Type alias for toolkit operation results
pub type Result<T> = std::result::Result<T, Error>;
