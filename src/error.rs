use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{dao::storage::StorageError, state::session_code::SessionCodeError};

/// Failures of the REST services backed by the record store.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The record store answered with an error.
    #[error("record store failed")]
    Unavailable(#[source] StorageError),
    /// No record store installed, or the installed one is unhealthy.
    #[error("record store unavailable (degraded mode)")]
    Degraded,
    /// The request breaks a validation or uniqueness rule.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The addressed session or player does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Every drawn join code was already taken.
    #[error("no unused session code after {attempts} attempt(s)")]
    CodesExhausted { attempts: u32 },
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { message } => ServiceError::InvalidInput(message),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<SessionCodeError> for ServiceError {
    fn from(err: SessionCodeError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

/// HTTP-facing errors, rendered as `{error, message}` JSON.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected input: malformed code, blank name, duplicate player.
    #[error("{0}")]
    BadRequest(String),
    /// Unknown session, player or code.
    #[error("{0}")]
    NotFound(String),
    /// No healthy record store.
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::ServiceUnavailable(_) => "unavailable",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => {
                AppError::ServiceUnavailable("record store unavailable (degraded mode)".into())
            }
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            err @ ServiceError::CodesExhausted { .. } => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
