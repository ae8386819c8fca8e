//! API handlers for identeco.
//!
//! `auth` owns the identity surface; `health` and `root` are the ambient
//! operational routes.

pub mod auth;
pub mod health;
pub mod root;
