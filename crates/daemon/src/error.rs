// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps `bc_core::Error` onto HTTP responses (§7). Internal failures return a
//! generic message; the real cause is only logged, never echoed to callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Builds the same `{error, message}` envelope as [`ApiError`] for the HTTP
/// statuses `bc_core::Error` has no variant for (401 on bad admin/Slack
/// action auth, 400 on a malformed UUID path segment).
pub fn error_response(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: kind, message: message.into() })).into_response()
}

/// Newtype so this crate can implement `IntoResponse` for `bc_core::Error`
/// without `bc_core` taking an axum dependency.
pub struct ApiError(pub bc_core::Error);

impl From<bc_core::Error> for ApiError {
    fn from(e: bc_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self.0 {
            bc_core::Error::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            bc_core::Error::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            bc_core::Error::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", "rate limit exceeded".to_string()),
            bc_core::Error::Kv(msg) => {
                tracing::error!(error = %msg, "kv store failure reached the http boundary");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error".to_string())
            }
            bc_core::Error::Store(msg) => {
                tracing::error!(error = %msg, "persistence failure reached the http boundary");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error".to_string())
            }
            bc_core::Error::Internal(msg) => {
                tracing::error!(error = %msg, "internal error reached the http boundary");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error".to_string())
            }
        };
        (status, Json(ErrorBody { error: kind, message })).into_response()
    }
}
