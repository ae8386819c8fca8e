//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(anyhow::anyhow!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    Free,
    Pro,
    Family,
}

impl Plan {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
            Self::Family => "FAMILY",
        }
    }
}

impl FromStr for Plan {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "FREE" => Ok(Self::Free),
            "PRO" => Ok(Self::Pro),
            "FAMILY" => Ok(Self::Family),
            other => Err(anyhow::anyhow!("unknown plan: {other}")),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Wire types keep every field optional; presence and format are checked by the
// service so missing input maps to a structured validation error instead of a
// serde rejection.

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotRequest {
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: String,
    pub plan: Plan,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ForgotResponse {
    pub message: String,
    /// Only present outside production, for diagnostics; delivery otherwise
    /// goes through the mail collaborator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn role_round_trips_through_text() -> Result<()> {
        assert_eq!("admin".parse::<Role>()?, Role::Admin);
        assert_eq!(Role::Member.as_str(), "member");
        assert!("owner".parse::<Role>().is_err());
        Ok(())
    }

    #[test]
    fn plan_round_trips_through_text() -> Result<()> {
        assert_eq!("FAMILY".parse::<Plan>()?, Plan::Family);
        assert_eq!(Plan::Free.as_str(), "FREE");
        assert!("GOLD".parse::<Plan>().is_err());
        Ok(())
    }

    #[test]
    fn role_serializes_lowercase_and_plan_uppercase() -> Result<()> {
        assert_eq!(serde_json::to_string(&Role::Admin)?, r#""admin""#);
        assert_eq!(serde_json::to_string(&Plan::Pro)?, r#""PRO""#);
        Ok(())
    }

    #[test]
    fn refresh_request_uses_camel_case() -> Result<()> {
        let request: RefreshRequest = serde_json::from_str(r#"{"refreshToken":"abc"}"#)?;
        assert_eq!(request.refresh_token.as_deref(), Some("abc"));
        Ok(())
    }

    #[test]
    fn forgot_response_omits_absent_reset_token() -> Result<()> {
        let response = ForgotResponse {
            message: "ok".to_string(),
            reset_token: None,
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("resetToken").is_none());
        Ok(())
    }

    #[test]
    fn auth_response_uses_camel_case_token_fields() -> Result<()> {
        let response = AuthResponse {
            user: UserResponse {
                id: "id".to_string(),
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                role: Role::Admin,
                tenant_id: "tenant".to_string(),
                plan: Plan::Free,
            },
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("accessToken").and_then(serde_json::Value::as_str),
            Some("access")
        );
        assert_eq!(
            value
                .pointer("/user/tenantId")
                .and_then(serde_json::Value::as_str),
            Some("tenant")
        );
        Ok(())
    }
}
