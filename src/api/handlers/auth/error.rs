//! Error taxonomy for the auth surface.
//!
//! Every failure a handler can return maps to a stable machine-readable code
//! and an HTTP status. Messages are deliberately generic for authentication
//! failures so responses cannot be used as an account-enumeration oracle, and
//! infrastructure faults never leak their cause to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Password does not meet the strength requirements")]
    WeakPassword(Vec<&'static str>),
    #[error("Email is already registered")]
    EmailExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid, revoked, or unknown token")]
    InvalidToken,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("This feature requires a higher plan")]
    PlanRequired,
    #[error("Too many attempts")]
    RateLimited { retry_after_seconds: u64 },
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::EmailExists => "EMAIL_EXISTS",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::ExpiredToken => "EXPIRED_TOKEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::PlanRequired => "PLAN_REQUIRED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotFound => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::WeakPassword(_) => StatusCode::BAD_REQUEST,
            Self::EmailExists => StatusCode::CONFLICT,
            Self::InvalidCredentials
            | Self::InvalidToken
            | Self::ExpiredToken
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::PlanRequired => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            // The cause goes to the log, never to the caller.
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Same body as `into_response`, different status. Reset redemption uses
    /// this: token failures are 400 there, not 401, since no credential was
    /// presented.
    pub(super) fn into_response_with_status(self, status: StatusCode) -> Response {
        let body = self.body();
        (status, Json(json!({ "error": body }))).into_response()
    }

    fn body(&self) -> serde_json::Value {
        if let Self::Internal(cause) = self {
            error!("internal error: {cause:#}");
        }

        let mut body = json!({
            "code": self.code(),
            "message": self.message(),
        });
        match self {
            Self::WeakPassword(violations) => {
                body["details"] = json!(violations);
            }
            Self::RateLimited {
                retry_after_seconds,
            } => {
                body["retryAfter"] = json!(retry_after_seconds);
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        (status, Json(json!({ "error": body }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn codes_and_statuses_are_stable() {
        let cases = [
            (
                AuthError::validation("missing"),
                "VALIDATION_ERROR",
                StatusCode::BAD_REQUEST,
            ),
            (
                AuthError::WeakPassword(vec!["must contain a digit"]),
                "WEAK_PASSWORD",
                StatusCode::BAD_REQUEST,
            ),
            (AuthError::EmailExists, "EMAIL_EXISTS", StatusCode::CONFLICT),
            (
                AuthError::InvalidCredentials,
                "INVALID_CREDENTIALS",
                StatusCode::UNAUTHORIZED,
            ),
            (
                AuthError::InvalidToken,
                "INVALID_TOKEN",
                StatusCode::UNAUTHORIZED,
            ),
            (
                AuthError::ExpiredToken,
                "EXPIRED_TOKEN",
                StatusCode::UNAUTHORIZED,
            ),
            (
                AuthError::Unauthorized,
                "UNAUTHORIZED",
                StatusCode::UNAUTHORIZED,
            ),
            (AuthError::Forbidden, "FORBIDDEN", StatusCode::FORBIDDEN),
            (
                AuthError::PlanRequired,
                "PLAN_REQUIRED",
                StatusCode::FORBIDDEN,
            ),
            (
                AuthError::RateLimited {
                    retry_after_seconds: 30,
                },
                "RATE_LIMITED",
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (AuthError::NotFound, "NOT_FOUND", StatusCode::NOT_FOUND),
            (
                AuthError::Internal(anyhow!("boom")),
                "INTERNAL",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn internal_message_does_not_leak_cause() {
        let err = AuthError::Internal(anyhow!("connection refused to db-1"));
        assert_eq!(err.message(), "Internal server error");
    }

    #[test]
    fn credential_failures_share_a_generic_message() {
        // One message for unknown email and wrong password alike.
        assert_eq!(
            AuthError::InvalidCredentials.message(),
            "Invalid email or password"
        );
    }
}
