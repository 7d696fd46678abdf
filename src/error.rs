//! Error taxonomy for `storemap` (spec §7).
//!
//! `RepoError` names the failures a repository can produce; `AppError` is the
//! HTTP-facing error implementing `IntoResponse`. The mapping hides storage
//! detail from callers and renders a missing row and a wrong-owner row
//! identically, so ownership cannot be probed through error shapes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Named failures surfaced by the repository layer.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Lookup (by id, or by constrained id+owner) found nothing. Used
    /// identically for "does not exist" and "exists but not yours".
    #[error("not found")]
    NotFound,

    /// A unique constraint on the username was violated.
    #[error("duplicate username")]
    DuplicateUsername,

    /// Unexpected storage-engine failure, fatal to the operation.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A step of a multi-statement transaction failed; the operation is rolled
    /// back rather than partially committed.
    #[error("transaction failure: {0}")]
    Transaction(sqlx::Error),
}

/// HTTP-facing application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource absent, or present but not owned by the caller (indistinguishable).
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// Username already taken.
    #[error("duplicate username")]
    DuplicateUsername,

    /// Request failed input validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    /// Caller is authenticated but lacks the required authority.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Outbound mail is not configured on this deployment.
    #[error("mail service unavailable")]
    MailUnavailable,

    /// Mail delivery was attempted but failed.
    #[error("mail error: {0}")]
    Mail(anyhow::Error),

    /// Storage, transaction, or other internal failure; detail is logged,
    /// never leaked to the caller.
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("resource not found"),
            RepoError::DuplicateUsername => AppError::DuplicateUsername,
            RepoError::Storage(e) | RepoError::Transaction(e) => AppError::Storage(e.into()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Storage(err)
    }
}

impl RepoError {
    /// Convert a repository failure into an `AppError`, overriding the caller-
    /// facing message used for the not-found case. Non-`NotFound` failures map
    /// through the standard conversion.
    pub fn or_not_found(self, message: &'static str) -> AppError {
        match self {
            RepoError::NotFound => AppError::NotFound(message),
            other => AppError::from(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log internal failures with full detail before hiding it from the caller.
        match &self {
            AppError::Storage(e) => tracing::error!(error = %e, "storage error"),
            AppError::Mail(e) => tracing::error!(error = %e, "mail delivery error"),
            _ => {}
        }

        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateUsername => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::MailUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Mail(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Never expose internal storage/mail detail to clients.
        let message = match &self {
            AppError::NotFound(m) | AppError::Unauthorized(m) | AppError::Forbidden(m) => {
                (*m).to_string()
            }
            AppError::DuplicateUsername => "username already taken".to_string(),
            AppError::Validation(m) => m.clone(),
            AppError::MailUnavailable => "mail service unavailable".to_string(),
            AppError::Mail(_) | AppError::Storage(_) => "internal server error".to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
