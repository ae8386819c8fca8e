//! Authenticated identity endpoint.

use axum::{
    Json,
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::principal::require_auth;
use super::service::AuthService;
use super::types::UserResponse;

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated account", body = UserResponse),
        (status = 401, description = "Missing, invalid, or expired access token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, service: Extension<Arc<AuthService>>) -> Response {
    let principal = match require_auth(&headers, &service).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    Json(UserResponse {
        id: principal.account_id.to_string(),
        email: principal.email,
        name: principal.name,
        role: principal.role,
        tenant_id: principal.tenant_id.to_string(),
        plan: principal.plan,
    })
    .into_response()
}
