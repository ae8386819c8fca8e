//! Self-service password recovery endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::error::AuthError;
use super::service::{AuthService, forgot_message};
use super::types::{ForgotRequest, ForgotResponse, MessageResponse, ResetRequest};
use super::utils::ClientMeta;

#[utoipa::path(
    post,
    path = "/auth/forgot",
    request_body = ForgotRequest,
    responses(
        (status = 200, description = "Generic acknowledgment whether or not the email exists",
            body = ForgotResponse),
        (status = 400, description = "Missing email"),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn forgot(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ForgotRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::validation("Missing payload").into_response();
    };

    let client = ClientMeta::from_headers(&headers);
    match service.forgot(request, &client).await {
        // Same body either way; only diagnostic environments carry the token.
        Ok(reset_token) => Json(ForgotResponse {
            message: forgot_message(),
            reset_token,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/reset",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Password replaced; every session revoked",
            body = MessageResponse),
        (status = 400, description = "Validation error, weak password, or invalid/expired token")
    ),
    tag = "auth"
)]
pub async fn reset(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ResetRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::validation("Missing payload").into_response();
    };

    let client = ClientMeta::from_headers(&headers);
    match service.reset(request, &client).await {
        Ok(()) => Json(MessageResponse {
            message: "Password has been reset".to_string(),
        })
        .into_response(),
        Err(err @ (AuthError::InvalidToken | AuthError::ExpiredToken)) => {
            err.into_response_with_status(StatusCode::BAD_REQUEST)
        }
        Err(err) => err.into_response(),
    }
}
