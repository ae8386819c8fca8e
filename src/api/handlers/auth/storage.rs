//! Database helpers for accounts, sessions, and reset grants.
//!
//! Refresh rotation and reset redemption are single transactions built around
//! a conditional `UPDATE ... RETURNING`: the first request to revoke or
//! consume a row wins, and every concurrent loser observes the already-spent
//! state instead of racing a read-then-write.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::crypto::PASSWORD_ALGO;
use super::types::{Plan, Role};
use super::utils::{
    ClientMeta, generate_refresh_token, generate_reset_token, hash_token, is_unique_violation,
};

/// Identity row as the service consumes it.
#[derive(Clone, Debug)]
pub(super) struct AccountRecord {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) name: String,
    pub(super) role: Role,
    pub(super) tenant_id: Uuid,
    pub(super) password_hash: String,
    pub(super) password_salt: String,
    pub(super) password_iters: i32,
    pub(super) plan: Plan,
}

pub(super) struct NewAccount<'a> {
    pub(super) email: &'a str,
    pub(super) name: &'a str,
    pub(super) role: Role,
    pub(super) tenant_id: Uuid,
    pub(super) password_hash: &'a str,
    pub(super) password_salt: &'a str,
    pub(super) password_iters: i32,
}

#[derive(Debug)]
pub(super) enum RegisterOutcome {
    Created(AccountRecord),
    Conflict,
}

#[derive(Debug)]
pub(super) enum RotationOutcome {
    Rotated {
        account: AccountRecord,
        refresh_token: String,
    },
    Unknown,
    Expired,
}

#[derive(Debug)]
pub(super) enum RedeemOutcome {
    Reset { account_id: Uuid },
    Unknown,
    Expired,
}

const ACCOUNT_COLUMNS: &str = "id, email, name, role, tenant_id, password_hash, password_salt, \
     password_iters, plan";

fn account_from_row(row: &PgRow) -> Result<AccountRecord> {
    let role: String = row.get("role");
    let plan: String = row.get("plan");
    Ok(AccountRecord {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        role: role.parse()?,
        tenant_id: row.get("tenant_id"),
        password_hash: row.get("password_hash"),
        password_salt: row.get("password_salt"),
        password_iters: row.get("password_iters"),
        plan: plan.parse()?,
    })
}

pub(super) async fn insert_account(
    pool: &PgPool,
    new: &NewAccount<'_>,
) -> Result<RegisterOutcome> {
    let query = format!(
        r"
        INSERT INTO accounts
            (email, name, role, tenant_id, password_hash, password_salt, password_algo,
             password_iters)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ACCOUNT_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(new.email)
        .bind(new.name)
        .bind(new.role.as_str())
        .bind(new.tenant_id)
        .bind(new.password_hash)
        .bind(new.password_salt)
        .bind(PASSWORD_ALGO)
        .bind(new.password_iters)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(RegisterOutcome::Created(account_from_row(&row)?)),
        Err(err) if is_unique_violation(&err) => Ok(RegisterOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert account"),
    }
}

pub(super) async fn lookup_account_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by email")?;
    row.as_ref().map(account_from_row).transpose()
}

pub(super) async fn lookup_account_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<AccountRecord>> {
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by id")?;
    row.as_ref().map(account_from_row).transpose()
}

pub(super) async fn touch_last_login(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = "UPDATE accounts SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update last login")?;
    Ok(())
}

/// Create a refresh session and return the raw token for the response body.
/// Only the hash is stored.
pub(super) async fn insert_session(
    pool: &PgPool,
    account_id: Uuid,
    ttl_seconds: i64,
    client: &ClientMeta,
) -> Result<String> {
    let query = r"
        INSERT INTO sessions
            (account_id, refresh_token_hash, expires_at, last_used_at, user_agent, ip)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'), NOW(), $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_refresh_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(&token_hash)
            .bind(ttl_seconds)
            .bind(client.user_agent.as_deref())
            .bind(client.ip.as_deref())
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique refresh token"))
}

/// Redeem a refresh token: revoke its session and mint the next chain link in
/// one transaction. Two concurrent redemptions of the same token both observe
/// the conditional revoke, so exactly one wins.
pub(super) async fn rotate_session(
    pool: &PgPool,
    token_hash: &[u8],
    ttl_seconds: i64,
    client: &ClientMeta,
) -> Result<RotationOutcome> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to begin rotation transaction")?;

    let query = r"
        UPDATE sessions
        SET revoked_at = NOW(), last_used_at = NOW()
        WHERE refresh_token_hash = $1 AND revoked_at IS NULL
        RETURNING account_id, expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke session for rotation")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(RotationOutcome::Unknown);
    };

    let expires_at: DateTime<Utc> = row.get("expires_at");
    if expires_at < Utc::now() {
        // Expired sessions stay unrevoked; they are already passively dead.
        let _ = tx.rollback().await;
        return Ok(RotationOutcome::Expired);
    }

    let account_id: Uuid = row.get("account_id");
    let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load account for rotation")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(RotationOutcome::Unknown);
    };
    let account = account_from_row(&row)?;

    let refresh_token = generate_refresh_token()?;
    let new_hash = hash_token(&refresh_token);
    let query = r"
        INSERT INTO sessions
            (account_id, refresh_token_hash, expires_at, last_used_at, user_agent, ip)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'), NOW(), $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account.id)
        .bind(&new_hash)
        .bind(ttl_seconds)
        .bind(client.user_agent.as_deref())
        .bind(client.ip.as_deref())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert rotated session")?;

    tx.commit()
        .await
        .context("failed to commit rotation transaction")?;

    Ok(RotationOutcome::Rotated {
        account,
        refresh_token,
    })
}

/// Logout is idempotent; revoking an already-revoked or unknown token is a
/// no-op.
pub(super) async fn revoke_session_by_hash(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = r"
        UPDATE sessions
        SET revoked_at = NOW()
        WHERE refresh_token_hash = $1 AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke session")?;
    Ok(())
}

/// Issue a single-use reset grant and return the raw token for delivery.
pub(super) async fn insert_reset_grant(
    pool: &PgPool,
    account_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO password_reset_grants (account_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_reset_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(account_id)
            .bind(&token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert reset grant"),
        }
    }

    Err(anyhow!("failed to generate unique reset token"))
}

/// Consume a reset grant, store the new credential, and revoke every session
/// of the account, all in one transaction. The conditional `used_at` update
/// makes the grant single-use under concurrency.
pub(super) async fn redeem_reset_grant(
    pool: &PgPool,
    token_hash: &[u8],
    new_password_hash: &str,
    new_password_salt: &str,
    password_iters: i32,
) -> Result<RedeemOutcome> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to begin reset transaction")?;

    let query = r"
        UPDATE password_reset_grants
        SET used_at = NOW()
        WHERE token_hash = $1 AND used_at IS NULL
        RETURNING account_id, expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume reset grant")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(RedeemOutcome::Unknown);
    };

    let expires_at: DateTime<Utc> = row.get("expires_at");
    if expires_at < Utc::now() {
        let _ = tx.rollback().await;
        return Ok(RedeemOutcome::Expired);
    }

    let account_id: Uuid = row.get("account_id");
    let query = r"
        UPDATE accounts
        SET password_hash = $2, password_salt = $3, password_iters = $4, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .bind(new_password_hash)
        .bind(new_password_salt)
        .bind(password_iters)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to store new credential")?;

    // Global logout: a redeemed reset invalidates every outstanding session.
    let query = r"
        UPDATE sessions
        SET revoked_at = NOW()
        WHERE account_id = $1 AND revoked_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke sessions after reset")?;

    tx.commit()
        .await
        .context("failed to commit reset transaction")?;

    Ok(RedeemOutcome::Reset { account_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_outcome_debug_names() {
        assert_eq!(format!("{:?}", RegisterOutcome::Conflict), "Conflict");
    }

    #[test]
    fn rotation_outcome_debug_names() {
        assert_eq!(format!("{:?}", RotationOutcome::Unknown), "Unknown");
        assert_eq!(format!("{:?}", RotationOutcome::Expired), "Expired");
    }

    #[test]
    fn redeem_outcome_debug_names() {
        assert_eq!(format!("{:?}", RedeemOutcome::Unknown), "Unknown");
        assert_eq!(format!("{:?}", RedeemOutcome::Expired), "Expired");
    }

    #[test]
    fn account_columns_cover_the_record_fields() {
        for column in [
            "id",
            "email",
            "name",
            "role",
            "tenant_id",
            "password_hash",
            "password_salt",
            "password_iters",
            "plan",
        ] {
            assert!(ACCOUNT_COLUMNS.contains(column), "missing {column}");
        }
    }
}
