use anyhow::{Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

use crate::api::handlers::auth::Environment;

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_password_args(command);
    with_environment_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("Secret used to sign and verify access tokens")
                .env("IDENTECO_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("access-token-ttl-seconds")
                .long("access-token-ttl-seconds")
                .help("Access token lifetime in seconds")
                .env("IDENTECO_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-ttl-seconds")
                .long("refresh-token-ttl-seconds")
                .help("Refresh session lifetime in seconds")
                .env("IDENTECO_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("reset-token-ttl-seconds")
                .long("reset-token-ttl-seconds")
                .help("Password reset token lifetime in seconds")
                .env("IDENTECO_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_password_args(command: Command) -> Command {
    command.arg(
        Arg::new("password-iterations")
            .long("password-iterations")
            .help("PBKDF2 iteration count for new credentials")
            .env("IDENTECO_PASSWORD_ITERATIONS")
            .default_value("150000")
            .value_parser(clap::value_parser!(u32)),
    )
}

fn with_environment_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("environment")
                .long("environment")
                .help("Deployment environment; outside production the forgot endpoint echoes reset tokens")
                .env("IDENTECO_ENVIRONMENT")
                .default_value("production"),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for CORS and recovery links")
                .env("IDENTECO_FRONTEND_BASE_URL")
                .default_value("https://identeco.dev"),
        )
}

pub struct Options {
    pub token_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub password_iterations: u32,
    pub environment: Environment,
    pub frontend_base_url: String,
}

impl Options {
    /// # Errors
    /// Returns an error if required arguments are missing or malformed.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>("token-secret")
            .cloned()
            .context("missing required argument: --token-secret")?;
        let environment = matches
            .get_one::<String>("environment")
            .cloned()
            .unwrap_or_else(|| "production".to_string())
            .parse::<Environment>()?;

        Ok(Self {
            token_secret: SecretString::from(token_secret),
            access_token_ttl_seconds: matches
                .get_one::<i64>("access-token-ttl-seconds")
                .copied()
                .unwrap_or(900),
            refresh_token_ttl_seconds: matches
                .get_one::<i64>("refresh-token-ttl-seconds")
                .copied()
                .unwrap_or(2_592_000),
            reset_token_ttl_seconds: matches
                .get_one::<i64>("reset-token-ttl-seconds")
                .copied()
                .unwrap_or(3_600),
            password_iterations: matches
                .get_one::<u32>("password-iterations")
                .copied()
                .unwrap_or(150_000),
            environment,
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .unwrap_or_else(|| "https://identeco.dev".to_string()),
        })
    }
}
