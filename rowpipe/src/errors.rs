//! Error types and HTTP response conversion (§7).
//!
//! [`Error`] is the application's single error hierarchy. Handlers return
//! `Result<T, Error>`; [`IntoResponse`] converts each variant into the
//! `{"error": {"kind", "message", "detail"?}}` envelope described in §7.
//!
//! | Variant | Status |
//! |---|---|
//! | `Unauthenticated` | 401 |
//! | `Forbidden` | 403 |
//! | `Validation` | 400 |
//! | `NotFound` | 404 |
//! | `Conflict` | 409 |
//! | `Storage` | 502 |
//! | `Upstream` | 502 |
//! | `Unavailable` | 503 |
//! | `Database` | varies with [`DbError`] |
//! | `Internal` / `Other` | 500 |

use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;

const POOL_EXHAUSTED_RETRY_AFTER_SECS: &str = "30";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the bearer token is invalid/expired.
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Caller is authenticated but the resource belongs to another tenant.
    #[error("{resource} with ID {id} not found")]
    Forbidden { resource: String, id: String },

    /// Invalid request data or business rule violation (malformed CSV, unknown dataset_type, ...)
    #[error("{message}")]
    Validation { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Unique constraint on a natural key (e.g. `users.email`)
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The configured object store rejected a request or is unreachable.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A downstream dependency other than the object store or database failed.
    #[error("Upstream error: {message}")]
    Upstream { message: String },

    /// The service is temporarily unable to accept the request (queue backpressure).
    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorEnvelope,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::NOT_FOUND,
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Storage { .. } => StatusCode::BAD_GATEWAY,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Error::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::Unauthenticated { .. } => "unauthenticated",
            // Tenancy violations are reported as not_found: the Tenancy Guard never
            // reveals that a row exists for a different owner (§4.4).
            Error::Forbidden { .. } => "not_found",
            Error::Validation { .. } => "validation",
            Error::NotFound { .. } => "not_found",
            Error::Conflict { .. } => "conflict",
            Error::Storage { .. } => "storage_error",
            Error::Upstream { .. } => "upstream_error",
            Error::Unavailable { .. } => "unavailable",
            Error::Internal { .. } => "internal_error",
            Error::Database(DbError::NotFound) => "not_found",
            Error::Database(DbError::UniqueViolation { .. }) => "conflict",
            Error::Database(DbError::ForeignKeyViolation { .. }) => "validation",
            Error::Database(DbError::CheckViolation { .. }) => "validation",
            Error::Database(DbError::PoolExhausted) => "unavailable",
            Error::Database(DbError::Other(_)) => "internal_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details.
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Forbidden { resource, id } | Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Validation { message } => message.clone(),
            Error::Conflict { message } => message.clone(),
            Error::Storage { .. } => "The storage backend is temporarily unavailable".to_string(),
            Error::Upstream { message } => message.clone(),
            Error::Unavailable { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { table, .. } => match table.as_deref() {
                    Some("users") => "An account with this email address already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::PoolExhausted => "Service temporarily overloaded, please retry".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("internal service error: {:#}", self);
            }
            Error::Database(DbError::PoolExhausted) | Error::Unavailable { .. } => {
                tracing::warn!("service overloaded: {}", self);
            }
            Error::Storage { .. } | Error::Upstream { .. } => {
                tracing::warn!("downstream dependency error: {}", self);
            }
            Error::Database(_) | Error::Conflict { .. } => {
                tracing::warn!("database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } => {
                tracing::info!("authorization error: {}", self);
            }
            Error::Validation { .. } | Error::NotFound { .. } => {
                tracing::debug!("client error: {}", self);
            }
        }

        let status = self.status_code();
        let kind = self.kind();
        let message = self.user_message();
        // `detail` only carries extra context for validation errors; other kinds
        // never leak internal detail beyond `kind` (§7).
        let detail = match &self {
            Error::Validation { message } => Some(message.clone()),
            _ => None,
        };

        if matches!(self, Error::Database(DbError::PoolExhausted) | Error::Unavailable { .. }) {
            use axum::http::header::RETRY_AFTER;
            let body = ErrorBody {
                error: ErrorEnvelope { kind, message, detail },
            };
            return (status, [(RETRY_AFTER, POOL_EXHAUSTED_RETRY_AFTER_SECS)], axum::response::Json(body)).into_response();
        }

        let body = ErrorBody {
            error: ErrorEnvelope { kind, message, detail },
        };
        (status, axum::response::Json(body)).into_response()
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
