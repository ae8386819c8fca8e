//! Signed access-token codec.
//!
//! Tokens are three base64url segments, `header.claims.signature`, signed with
//! HMAC-SHA256 over the first two segments. They are self-contained: once
//! issued, a token stays valid until `exp` elapses. Revocation happens at the
//! refresh layer only, so the short lifetime is the whole mitigation window
//! for a leaked access token.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::types::{Plan, Role};

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

pub(crate) const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 900;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    pub plan: Plan,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub(super) enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

pub(super) fn encode(claims: &Claims, secret: &str) -> Result<String> {
    let payload = serde_json::to_string(claims).context("failed to serialize token claims")?;
    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(&payload)
    );
    let signature = sign(&message, secret)?;
    Ok(format!("{message}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

pub(super) fn decode_and_verify(token: &str, secret: &str) -> Result<Claims, TokenError> {
    decode_and_verify_at(token, secret, Utc::now().timestamp())
}

fn decode_and_verify_at(token: &str, secret: &str, now: i64) -> Result<Claims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = parts.as_slice() else {
        return Err(TokenError::Malformed);
    };

    // Signature first; claims are only parsed from authenticated input.
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenError::Malformed)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::BadSignature)?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    // verify_slice compares in constant time.
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

    if claims.exp < now {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

fn sign(message: &str, secret: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .context("failed to initialize token signer")?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const SECRET: &str = "test-secret";

    fn claims(exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            role: Role::Admin,
            tenant_id: Uuid::new_v4(),
            plan: Plan::Free,
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn encode_decode_round_trips() -> Result<()> {
        let claims = claims(900);
        let token = encode(&claims, SECRET)?;
        let decoded = decode_and_verify(&token, SECRET);
        assert_eq!(decoded, Ok(claims));
        Ok(())
    }

    #[test]
    fn token_has_three_segments() -> Result<()> {
        let token = encode(&claims(900), SECRET)?;
        assert_eq!(token.split('.').count(), 3);
        Ok(())
    }

    #[test]
    fn rejects_wrong_part_count() {
        assert_eq!(
            decode_and_verify("only.two", SECRET),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            decode_and_verify("a.b.c.d", SECRET),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn rejects_wrong_secret() -> Result<()> {
        let token = encode(&claims(900), SECRET)?;
        assert_eq!(
            decode_and_verify(&token, "other-secret"),
            Err(TokenError::BadSignature)
        );
        Ok(())
    }

    #[test]
    fn rejects_tampered_payload() -> Result<()> {
        let token = encode(&claims(900), SECRET)?;
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let payload = &mut parts[1];
        let original = payload.remove(0);
        let replacement = if original == 'A' { 'B' } else { 'A' };
        payload.insert(0, replacement);
        let tampered = parts.join(".");
        assert_eq!(
            decode_and_verify(&tampered, SECRET),
            Err(TokenError::BadSignature)
        );
        Ok(())
    }

    #[test]
    fn rejects_expired_token() -> Result<()> {
        let claims = claims(900);
        let token = encode(&claims, SECRET)?;
        assert_eq!(
            decode_and_verify_at(&token, SECRET, claims.exp + 1),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn accepts_token_just_before_expiry() -> Result<()> {
        let claims = claims(900);
        let token = encode(&claims, SECRET)?;
        assert!(decode_and_verify_at(&token, SECRET, claims.exp).is_ok());
        Ok(())
    }
}
