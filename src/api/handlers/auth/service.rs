//! Auth orchestration: the only component the rest of the service talks to.
//!
//! Each operation gates on the rate limiter where the endpoint is public,
//! validates its input into a checked value, and then drives the hasher,
//! token codec, and stores. Credential derivation is deliberately slow, so it
//! runs on the blocking pool instead of a request worker.

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::api::mail::MailSender;

use super::audit::record_event;
use super::crypto::{
    generate_salt, hash_password, password_policy_violations, verify_password,
};
use super::error::AuthError;
use super::principal::Principal;
use super::rate_limit::{
    AUTH_POLICY, RESET_POLICY, RateLimitDecision, RateLimitPolicy, RateLimiter,
};
use super::state::AuthConfig;
use super::storage::{
    AccountRecord, NewAccount, RedeemOutcome, RegisterOutcome, RotationOutcome, insert_account,
    insert_reset_grant, insert_session, lookup_account_by_email, lookup_account_by_id,
    redeem_reset_grant, revoke_session_by_hash, rotate_session, touch_last_login,
};
use super::token::{self, Claims, TokenError};
use super::types::{
    AuthResponse, ForgotRequest, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest,
    ResetRequest, Role, TokenPairResponse, UserResponse,
};
use super::utils::{ClientMeta, build_reset_url, hash_token, normalize_email, valid_email};

const REGISTER_ENDPOINT: &str = "/auth/register";
const LOGIN_ENDPOINT: &str = "/auth/login";
const FORGOT_ENDPOINT: &str = "/auth/forgot";

const FORGOT_MESSAGE: &str =
    "If the email exists, you will receive instructions to reset your password";

pub struct AuthService {
    pool: PgPool,
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
    mail: Arc<dyn MailSender>,
}

/// Validated registration input.
struct Registration {
    email: String,
    password: String,
    name: String,
}

impl Registration {
    fn parse(request: RegisterRequest) -> Result<Self, AuthError> {
        let (Some(email), Some(password), Some(name)) =
            (request.email, request.password, request.name)
        else {
            return Err(AuthError::validation("email, password and name are required"));
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AuthError::validation("email, password and name are required"));
        }
        let email = normalize_email(&email);
        if !valid_email(&email) {
            return Err(AuthError::validation("invalid email"));
        }
        Ok(Self {
            email,
            password,
            name,
        })
    }
}

/// Validated login input.
struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    fn parse(request: LoginRequest) -> Result<Self, AuthError> {
        let (Some(email), Some(password)) = (request.email, request.password) else {
            return Err(AuthError::validation("email and password are required"));
        };
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::validation("email and password are required"));
        }
        Ok(Self {
            email: normalize_email(&email),
            password,
        })
    }
}

fn required(value: Option<String>, message: &str) -> Result<String, AuthError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(AuthError::validation(message)),
    }
}

impl AuthService {
    #[must_use]
    pub fn new(
        pool: PgPool,
        config: AuthConfig,
        rate_limiter: Arc<dyn RateLimiter>,
        mail: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            pool,
            config,
            rate_limiter,
            mail,
        }
    }

    pub(crate) fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an account plus its first session. Every new account opens its
    /// own tenant and administers it.
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientMeta,
    ) -> Result<AuthResponse, AuthError> {
        self.gate(REGISTER_ENDPOINT, client, AUTH_POLICY).await?;

        let registration = Registration::parse(request)?;
        let violations = password_policy_violations(&registration.password);
        if !violations.is_empty() {
            return Err(AuthError::WeakPassword(violations));
        }

        let salt = generate_salt()?;
        let digest = self
            .derive_digest(registration.password.clone(), salt.clone())
            .await?;

        let iterations = i32::try_from(self.config.password_iterations())
            .context("password iteration count out of range")?;
        let new_account = NewAccount {
            email: &registration.email,
            name: &registration.name,
            role: Role::Admin,
            tenant_id: Uuid::new_v4(),
            password_hash: &digest,
            password_salt: &salt,
            password_iters: iterations,
        };
        let account = match insert_account(&self.pool, &new_account).await? {
            RegisterOutcome::Created(account) => account,
            RegisterOutcome::Conflict => return Err(AuthError::EmailExists),
        };

        let (access_token, refresh_token) = self.issue_tokens(&account, client).await?;
        record_event(
            &self.pool,
            Some(account.id),
            "account.register",
            None,
            client,
        )
        .await;

        Ok(AuthResponse {
            user: user_response(&account),
            access_token,
            refresh_token,
        })
    }

    /// Verify credentials and open a new session. Unknown email and wrong
    /// password are indistinguishable to the caller.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientMeta,
    ) -> Result<AuthResponse, AuthError> {
        self.gate(LOGIN_ENDPOINT, client, AUTH_POLICY).await?;

        let credentials = Credentials::parse(request)?;
        let Some(account) = lookup_account_by_email(&self.pool, &credentials.email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        let iterations = u32::try_from(account.password_iters)
            .context("stored iteration count out of range")?;
        let verified = self
            .check_digest(
                credentials.password,
                account.password_hash.clone(),
                account.password_salt.clone(),
                iterations,
            )
            .await?;
        if !verified {
            record_event(
                &self.pool,
                Some(account.id),
                "account.login_failed",
                None,
                client,
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        }

        let (access_token, refresh_token) = self.issue_tokens(&account, client).await?;
        touch_last_login(&self.pool, account.id).await?;
        record_event(&self.pool, Some(account.id), "account.login", None, client).await;

        Ok(AuthResponse {
            user: user_response(&account),
            access_token,
            refresh_token,
        })
    }

    /// Rotate a refresh token: the presented session is revoked and a new
    /// session plus token pair is issued in its place. A redeemed token can
    /// never be used again.
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        client: &ClientMeta,
    ) -> Result<TokenPairResponse, AuthError> {
        let refresh_token = required(request.refresh_token, "refreshToken is required")?;
        let token_hash = hash_token(&refresh_token);

        let outcome = rotate_session(
            &self.pool,
            &token_hash,
            self.config.refresh_token_ttl_seconds(),
            client,
        )
        .await?;
        let (account, refresh_token) = match outcome {
            RotationOutcome::Rotated {
                account,
                refresh_token,
            } => (account, refresh_token),
            RotationOutcome::Unknown => return Err(AuthError::InvalidToken),
            RotationOutcome::Expired => return Err(AuthError::ExpiredToken),
        };

        let access_token = self.encode_access_token(&account)?;
        Ok(TokenPairResponse {
            access_token,
            refresh_token,
        })
    }

    /// Revoke the session behind a refresh token. Idempotent: revoking an
    /// unknown or already-revoked token succeeds quietly.
    pub async fn logout(
        &self,
        request: LogoutRequest,
        client: &ClientMeta,
    ) -> Result<(), AuthError> {
        let refresh_token = required(request.refresh_token, "refreshToken is required")?;
        let token_hash = hash_token(&refresh_token);
        revoke_session_by_hash(&self.pool, &token_hash).await?;
        record_event(&self.pool, None, "account.logout", None, client).await;
        Ok(())
    }

    /// Issue a reset grant when the account exists. The response is identical
    /// either way so the endpoint cannot confirm which emails are registered.
    /// Returns the raw token only when the environment exposes it.
    pub async fn forgot(
        &self,
        request: ForgotRequest,
        client: &ClientMeta,
    ) -> Result<Option<String>, AuthError> {
        self.gate(FORGOT_ENDPOINT, client, RESET_POLICY).await?;

        let email = required(request.email, "email is required")?;
        let email = normalize_email(&email);

        let Some(account) = lookup_account_by_email(&self.pool, &email).await? else {
            return Ok(None);
        };

        let token = insert_reset_grant(
            &self.pool,
            account.id,
            self.config.reset_token_ttl_seconds(),
        )
        .await?;

        // Delivery goes through the collaborator; the caller only ever sees
        // the raw token in diagnostic environments.
        if let Err(err) = self.mail.send_password_reset(
            &account.email,
            &build_reset_url(self.config.frontend_base_url(), &token),
        ) {
            return Err(AuthError::Internal(
                err.context("failed to hand off reset mail"),
            ));
        }

        record_event(
            &self.pool,
            Some(account.id),
            "account.reset_requested",
            None,
            client,
        )
        .await;

        if self.config.expose_reset_token() {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    /// Redeem a reset grant: store the new credential, burn the grant, and
    /// revoke every session of the account.
    pub async fn reset(
        &self,
        request: ResetRequest,
        client: &ClientMeta,
    ) -> Result<(), AuthError> {
        let token = required(request.token, "token and newPassword are required")?;
        let new_password = required(request.new_password, "token and newPassword are required")?;

        let violations = password_policy_violations(&new_password);
        if !violations.is_empty() {
            return Err(AuthError::WeakPassword(violations));
        }

        let salt = generate_salt()?;
        let digest = self.derive_digest(new_password, salt.clone()).await?;
        let iterations = i32::try_from(self.config.password_iterations())
            .context("password iteration count out of range")?;

        let token_hash = hash_token(&token);
        let outcome =
            redeem_reset_grant(&self.pool, &token_hash, &digest, &salt, iterations).await?;
        let account_id = match outcome {
            RedeemOutcome::Reset { account_id } => account_id,
            RedeemOutcome::Unknown => return Err(AuthError::InvalidToken),
            RedeemOutcome::Expired => return Err(AuthError::ExpiredToken),
        };

        record_event(
            &self.pool,
            Some(account_id),
            "account.reset",
            Some(json!({ "sessions": "revoked" })),
            client,
        )
        .await;
        Ok(())
    }

    /// Resolve a bearer access token into the caller's identity. The subject
    /// must still exist; deleted accounts fail closed.
    pub async fn authenticate(&self, bearer: &str) -> Result<Principal, AuthError> {
        let claims = match token::decode_and_verify(bearer, self.config.token_secret()) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => return Err(AuthError::ExpiredToken),
            Err(TokenError::Malformed | TokenError::BadSignature) => {
                return Err(AuthError::InvalidToken);
            }
        };

        let Some(account) = lookup_account_by_id(&self.pool, claims.sub).await? else {
            return Err(AuthError::Unauthorized);
        };

        Ok(Principal {
            account_id: account.id,
            email: account.email,
            name: account.name,
            role: account.role,
            tenant_id: account.tenant_id,
            plan: account.plan,
        })
    }

    async fn gate(
        &self,
        endpoint: &str,
        client: &ClientMeta,
        policy: RateLimitPolicy,
    ) -> Result<(), AuthError> {
        match self
            .rate_limiter
            .check(endpoint, client.ip_or_unknown(), policy)
            .await
        {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Blocked {
                retry_after_seconds,
            } => Err(AuthError::RateLimited {
                retry_after_seconds,
            }),
        }
    }

    async fn issue_tokens(
        &self,
        account: &AccountRecord,
        client: &ClientMeta,
    ) -> Result<(String, String), AuthError> {
        let access_token = self.encode_access_token(account)?;
        let refresh_token = insert_session(
            &self.pool,
            account.id,
            self.config.refresh_token_ttl_seconds(),
            client,
        )
        .await?;
        Ok((access_token, refresh_token))
    }

    fn encode_access_token(&self, account: &AccountRecord) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            tenant_id: account.tenant_id,
            plan: account.plan,
            iat: now,
            exp: now + self.config.access_token_ttl_seconds(),
        };
        Ok(token::encode(&claims, self.config.token_secret())?)
    }

    async fn derive_digest(&self, password: String, salt: String) -> Result<String, AuthError> {
        let iterations = self.config.password_iterations();
        let digest = task::spawn_blocking(move || hash_password(&password, &salt, iterations))
            .await
            .map_err(|err| anyhow!("password hashing task failed: {err}"))??;
        Ok(digest)
    }

    async fn check_digest(
        &self,
        password: String,
        digest: String,
        salt: String,
        iterations: u32,
    ) -> Result<bool, AuthError> {
        let verified =
            task::spawn_blocking(move || verify_password(&password, &digest, &salt, iterations))
                .await
                .map_err(|err| anyhow!("password verification task failed: {err}"))??;
        Ok(verified)
    }
}

pub(super) fn forgot_message() -> String {
    FORGOT_MESSAGE.to_string()
}

fn user_response(account: &AccountRecord) -> UserResponse {
    UserResponse {
        id: account.id.to_string(),
        email: account.email.clone(),
        name: account.name.clone(),
        role: account.role,
        tenant_id: account.tenant_id.to_string(),
        plan: account.plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mail::LogMailSender;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    // A lazy pool never connects for operations that fail before storage.
    fn service() -> AuthService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://identeco@localhost:5432/identeco")
            .expect("lazy pool");
        let config = AuthConfig::new(
            SecretString::from("test-secret"),
            "https://identeco.dev".to_string(),
        )
        .with_password_iterations(1_000);
        AuthService::new(
            pool,
            config,
            Arc::new(super::super::rate_limit::NoopRateLimiter),
            Arc::new(LogMailSender),
        )
    }

    fn client() -> ClientMeta {
        ClientMeta::default()
    }

    #[tokio::test]
    async fn register_requires_all_fields() {
        let err = service()
            .register(
                RegisterRequest {
                    email: Some("a@example.com".to_string()),
                    password: None,
                    name: Some("A".to_string()),
                },
                &client(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let err = service()
            .register(
                RegisterRequest {
                    email: Some("not-an-email".to_string()),
                    password: Some("Str0ng!pw".to_string()),
                    name: Some("A".to_string()),
                },
                &client(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn register_rejects_weak_password_with_details() {
        let err = service()
            .register(
                RegisterRequest {
                    email: Some("a@example.com".to_string()),
                    password: Some("weak".to_string()),
                    name: Some("A".to_string()),
                },
                &client(),
            )
            .await
            .unwrap_err();
        match err {
            AuthError::WeakPassword(violations) => assert!(violations.len() >= 3),
            other => panic!("expected weak password, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let err = service()
            .login(
                LoginRequest {
                    email: Some("a@example.com".to_string()),
                    password: None,
                },
                &client(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn refresh_requires_a_token() {
        let err = service()
            .refresh(
                RefreshRequest {
                    refresh_token: Some("   ".to_string()),
                },
                &client(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn logout_requires_a_token() {
        let err = service()
            .logout(
                LogoutRequest {
                    refresh_token: None,
                },
                &client(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn forgot_requires_an_email() {
        let err = service()
            .forgot(ForgotRequest { email: None }, &client())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn reset_rejects_weak_password_before_touching_the_grant() {
        let err = service()
            .reset(
                ResetRequest {
                    token: Some("token".to_string()),
                    new_password: Some("weak".to_string()),
                },
                &client(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "WEAK_PASSWORD");
    }

    #[tokio::test]
    async fn authenticate_rejects_garbage_tokens_without_storage() {
        let err = service().authenticate("not-a-token").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn authenticate_maps_bad_signature_to_invalid_token() {
        let err = service()
            .authenticate("eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ4In0.AAAA")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }
}
