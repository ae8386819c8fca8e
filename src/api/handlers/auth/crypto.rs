//! Password hashing and the acceptance policy for new passwords.
//!
//! Credentials are derived with PBKDF2-HMAC-SHA256 over a per-account random
//! salt. The database stores the base64 digest, the base64 salt, the algorithm
//! tag, and the iteration count, so the parameters can evolve without
//! invalidating existing accounts.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pbkdf2::pbkdf2_hmac;
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub(crate) const DEFAULT_ITERATIONS: u32 = 150_000;
pub(crate) const PASSWORD_ALGO: &str = "PBKDF2-SHA256";

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;
const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Create a fresh base64-encoded salt for one account.
pub(super) fn generate_salt() -> Result<String> {
    let mut bytes = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate password salt")?;
    Ok(STANDARD.encode(bytes))
}

/// Derive the stored digest for a password with the account's salt.
pub(super) fn hash_password(password: &str, salt: &str, iterations: u32) -> Result<String> {
    Ok(STANDARD.encode(derive(password, salt, iterations)?))
}

/// Recompute the digest with the stored parameters and compare in constant time.
pub(super) fn verify_password(
    password: &str,
    digest: &str,
    salt: &str,
    iterations: u32,
) -> Result<bool> {
    let Ok(stored) = STANDARD.decode(digest) else {
        return Ok(false);
    };
    let derived = derive(password, salt, iterations)?;
    Ok(bool::from(stored.as_slice().ct_eq(&derived)))
}

fn derive(password: &str, salt: &str, iterations: u32) -> Result<[u8; DIGEST_LEN]> {
    let salt = STANDARD
        .decode(salt)
        .context("stored password salt is not valid base64")?;
    let mut out = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut out);
    Ok(out)
}

/// Return every rule a candidate password violates, not just the first.
/// Applied at registration and reset only; login accepts whatever was stored.
pub(super) fn password_policy_violations(password: &str) -> Vec<&'static str> {
    let mut violations = Vec::new();

    if password.chars().count() < 8 {
        violations.push("must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push("must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push("must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("must contain a digit");
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        violations.push("must contain a special character");
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keep test iteration counts low; the derivation is deliberately slow.
    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn generate_salt_is_16_random_bytes() -> Result<()> {
        let first = generate_salt()?;
        let second = generate_salt()?;
        assert_ne!(first, second);
        assert_eq!(STANDARD.decode(&first)?.len(), SALT_LEN);
        Ok(())
    }

    #[test]
    fn verify_accepts_the_original_password() -> Result<()> {
        let salt = generate_salt()?;
        let digest = hash_password("Str0ng!pw", &salt, TEST_ITERATIONS)?;
        assert!(verify_password("Str0ng!pw", &digest, &salt, TEST_ITERATIONS)?);
        Ok(())
    }

    #[test]
    fn verify_rejects_a_different_password() -> Result<()> {
        let salt = generate_salt()?;
        let digest = hash_password("Str0ng!pw", &salt, TEST_ITERATIONS)?;
        assert!(!verify_password("Str0ng!pX", &digest, &salt, TEST_ITERATIONS)?);
        Ok(())
    }

    #[test]
    fn verify_rejects_a_different_salt() -> Result<()> {
        let salt = generate_salt()?;
        let other_salt = generate_salt()?;
        let digest = hash_password("Str0ng!pw", &salt, TEST_ITERATIONS)?;
        assert!(!verify_password(
            "Str0ng!pw",
            &digest,
            &other_salt,
            TEST_ITERATIONS
        )?);
        Ok(())
    }

    #[test]
    fn verify_rejects_undecodable_digest() -> Result<()> {
        let salt = generate_salt()?;
        assert!(!verify_password(
            "Str0ng!pw",
            "not-base64!",
            &salt,
            TEST_ITERATIONS
        )?);
        Ok(())
    }

    #[test]
    fn hash_depends_on_iteration_count() -> Result<()> {
        let salt = generate_salt()?;
        let one = hash_password("Str0ng!pw", &salt, TEST_ITERATIONS)?;
        let two = hash_password("Str0ng!pw", &salt, TEST_ITERATIONS + 1)?;
        assert_ne!(one, two);
        Ok(())
    }

    #[test]
    fn policy_accepts_a_strong_password() {
        assert!(password_policy_violations("Str0ng!pw").is_empty());
    }

    #[test]
    fn policy_collects_every_violation() {
        let violations = password_policy_violations("abc");
        assert_eq!(violations.len(), 4);
        assert!(violations.contains(&"must be at least 8 characters long"));
        assert!(violations.contains(&"must contain an uppercase letter"));
        assert!(violations.contains(&"must contain a digit"));
        assert!(violations.contains(&"must contain a special character"));
    }

    #[test]
    fn policy_flags_each_rule_individually() {
        assert!(
            password_policy_violations("Sh0rt!a")
                .contains(&"must be at least 8 characters long")
        );
        assert!(
            password_policy_violations("alllower0!")
                .contains(&"must contain an uppercase letter")
        );
        assert!(
            password_policy_violations("ALLUPPER0!")
                .contains(&"must contain a lowercase letter")
        );
        assert!(password_policy_violations("NoDigits!!").contains(&"must contain a digit"));
        assert!(
            password_policy_violations("NoSymbols0")
                .contains(&"must contain a special character")
        );
    }
}
