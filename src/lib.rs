//! # Identeco (Identity & Session Service)
//!
//! `identeco` is the identity and session layer for a multi-tenant
//! application. It authenticates users, issues short-lived signed access
//! tokens, maintains long-lived renewable refresh sessions, supports
//! self-service password recovery, and throttles abusive request patterns.
//! The surrounding application calls into this service to authorize requests
//! and obtain the caller's identity; everything else lives elsewhere.
//!
//! ## Credentials
//!
//! Passwords are derived with PBKDF2-HMAC-SHA256 over per-account salts and
//! verified in constant time. The acceptance policy (length, character
//! classes) applies at registration and reset; login accepts whatever was
//! stored.
//!
//! ## Sessions & Rotation
//!
//! Refresh tokens are opaque 32-byte secrets persisted only as SHA-256
//! hashes. Redeeming one rotates the session: the old link is revoked and the
//! next is minted inside a single transaction, so a replayed token always
//! loses. A redeemed password reset revokes every session of the account.
//!
//! ## Throttling
//!
//! Public auth endpoints are rate limited per `(endpoint, client)` with a
//! sliding window and temporary blocks. The counter store failing is a
//! fail-open condition by design; identity state faults always fail closed.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
