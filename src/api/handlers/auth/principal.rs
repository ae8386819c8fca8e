//! Authenticated principal extraction and authorization gates.
//!
//! Flow Overview: read the bearer token, verify it, resolve the subject to a
//! live account, and return a principal that downstream handlers thread
//! through explicitly. Nothing here mutates request state.

use axum::http::HeaderMap;
use uuid::Uuid;

use super::error::AuthError;
use super::service::AuthService;
use super::types::{Plan, Role};
use super::utils::extract_bearer_token;

/// Caller identity derived from a verified access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: Uuid,
    pub plan: Plan,
}

/// Resolve the `Authorization` header into a principal, or fail with 401.
pub async fn require_auth(
    headers: &HeaderMap,
    service: &AuthService,
) -> Result<Principal, AuthError> {
    let Some(bearer) = extract_bearer_token(headers) else {
        return Err(AuthError::Unauthorized);
    };
    service.authenticate(&bearer).await
}

/// Role gate for endpoints restricted to certain roles.
pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Plan gate for endpoints behind a paid tier.
pub fn require_plan(principal: &Principal, allowed: &[Plan]) -> Result<(), AuthError> {
    if allowed.contains(&principal.plan) {
        Ok(())
    } else {
        Err(AuthError::PlanRequired)
    }
}
