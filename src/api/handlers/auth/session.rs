//! Session endpoints: refresh rotation and logout.

use axum::{
    Json,
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::error::AuthError;
use super::service::AuthService;
use super::types::{LogoutRequest, MessageResponse, RefreshRequest, TokenPairResponse};
use super::utils::ClientMeta;

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair; the old refresh token is revoked",
            body = TokenPairResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid, revoked, or expired refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RefreshRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::validation("Missing payload").into_response();
    };

    let client = ClientMeta::from_headers(&headers);
    match service.refresh(request, &client).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 400, description = "Missing refresh token")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LogoutRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::validation("Missing payload").into_response();
    };

    let client = ClientMeta::from_headers(&headers);
    match service.logout(request, &client).await {
        Ok(()) => Json(MessageResponse {
            message: "Logged out".to_string(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}
