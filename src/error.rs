// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crate-wide error taxonomy.
//!
//! Each component gets its own `thiserror` enum (`StorageError`,
//! `QueueError`, `LoyaltyError`); `ApiError` translates all of them into
//! an HTTP response. Transient/RateLimited/Cancelled kinds are consumed
//! inside their originating component and never reach `ApiError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("duplicate order code")]
    Duplicate,
    #[error("not found")]
    NotFound,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("operation cancelled")]
    Cancelled,
    #[error("storage backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StorageError::Duplicate
            }
            _ => StorageError::Backend(err.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
    #[error("broker connection lost: {0}")]
    BrokerLost(#[source] anyhow::Error),
    #[error("operation cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

/// The HTTP surface's error type (SPEC_FULL.md §4.7, §7). Carries an
/// explicit status code and never leaks internal error strings for
/// `Internal` — the detail is logged via `tracing::error!` and the
/// response body stays generic (§7 "responses never leak internal error
/// strings for Fatal errors").
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Conflict(String),
    #[error("invalid order number")]
    InvalidOrder,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("not found")]
    NotFound,
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate => ApiError::Conflict("already exists".into()),
            StorageError::NotFound => ApiError::NotFound,
            StorageError::InsufficientFunds => ApiError::InsufficientFunds,
            StorageError::Cancelled => {
                ApiError::Internal(anyhow::anyhow!("operation cancelled during shutdown"))
            }
            StorageError::Backend(err) => ApiError::Internal(err),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        ApiError::Internal(anyhow::anyhow!(err))
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidOrder => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}
