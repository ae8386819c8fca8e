//! Login endpoint.

use axum::{
    Json,
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::error::AuthError;
use super::service::AuthService;
use super::types::{AuthResponse, LoginRequest};
use super::utils::ClientMeta;

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, tokens issued", body = AuthResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::validation("Missing payload").into_response();
    };

    let client = ClientMeta::from_headers(&headers);
    match service.login(request, &client).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}
