//! Auth handlers and supporting modules.
//!
//! This module owns the whole identity surface: credential hashing, the
//! signed access-token codec, refresh-token sessions with rotation, password
//! recovery, and request throttling.
//!
//! ## Token model
//!
//! Access tokens are short-lived signed claims verified offline; refresh
//! tokens are opaque 32-byte secrets stored only as SHA-256 hashes. Redeeming
//! a refresh token rotates it: the presented session is revoked and a new one
//! is issued in the same transaction, so a stolen-and-replayed token loses
//! the race either way.
//!
//! ## Throttling
//!
//! Public endpoints (register, login, forgot) are rate limited per
//! `(endpoint, client)` with sliding windows and temporary blocks. The
//! limiter fails open on storage faults; identity state never does.

pub(crate) mod audit;
mod crypto;
pub(crate) mod error;
pub(crate) mod login;
pub(crate) mod me;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod register;
pub(crate) mod reset;
pub(crate) mod service;
pub(crate) mod session;
mod state;
mod storage;
mod token;
pub(crate) mod types;
mod utils;

pub use error::AuthError;
pub use principal::{Principal, require_auth, require_plan, require_role};
pub use rate_limit::{NoopRateLimiter, PgRateLimiter, RateLimiter};
pub use service::AuthService;
pub use state::{AuthConfig, Environment};
pub use token::Claims;
pub use utils::ClientMeta;
