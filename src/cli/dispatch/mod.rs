//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the appropriate action, such
//! as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: auth_opts.token_secret,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
        password_iterations: auth_opts.password_iterations,
        environment: auth_opts.environment,
        frontend_base_url: auth_opts.frontend_base_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::Environment;

    #[test]
    fn handler_builds_a_server_action() {
        temp_env::with_vars(
            [
                ("IDENTECO_DSN", Some("postgres://localhost/identeco")),
                ("IDENTECO_TOKEN_SECRET", Some("secret")),
                ("IDENTECO_ENVIRONMENT", Some("development")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["identeco"]);
                let action = handler(&matches).expect("server action");
                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://localhost/identeco");
                assert_eq!(args.environment, Environment::Development);
                assert_eq!(args.password_iterations, 150_000);
            },
        );
    }

    #[test]
    fn handler_rejects_unknown_environment() {
        temp_env::with_vars(
            [
                ("IDENTECO_DSN", Some("postgres://localhost/identeco")),
                ("IDENTECO_TOKEN_SECRET", Some("secret")),
                ("IDENTECO_ENVIRONMENT", Some("staging")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["identeco"]);
                assert!(handler(&matches).is_err());
            },
        );
    }
}
