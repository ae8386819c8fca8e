//! Sliding-window rate limiting with temporary blocks.
//!
//! One counter row per `(endpoint, client)` key. A request inside the window
//! increments the counter; exhausting the budget sets `blocked_until` and
//! every request until then is denied without incrementing. The whole
//! check-then-act sequence runs under a row lock so concurrent requests from
//! the same client cannot undercount.
//!
//! A failing counter store never takes the service down with it: storage
//! errors fail OPEN and the request is allowed through. Availability wins
//! over strict throttling for infrastructure faults.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::{Instrument, warn};

#[derive(Clone, Copy, Debug)]
pub struct RateLimitPolicy {
    pub max_attempts: i32,
    pub window_seconds: i64,
    pub block_seconds: i64,
}

/// Login/registration throttle: 5 attempts per minute, then a 15 minute block.
pub(crate) const AUTH_POLICY: RateLimitPolicy = RateLimitPolicy {
    max_attempts: 5,
    window_seconds: 60,
    block_seconds: 15 * 60,
};

/// Password-reset throttle: 3 attempts per minute, then a 60 minute block.
pub(crate) const RESET_POLICY: RateLimitPolicy = RateLimitPolicy {
    max_attempts: 3,
    window_seconds: 60,
    block_seconds: 60 * 60,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Blocked { retry_after_seconds: u64 },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(
        &self,
        endpoint: &str,
        client: &str,
        policy: RateLimitPolicy,
    ) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check(
        &self,
        _endpoint: &str,
        _client: &str,
        _policy: RateLimitPolicy,
    ) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug)]
struct CounterRow {
    attempts: i32,
    last_attempt_at: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verdict {
    /// Write the new count, stamp the attempt, clear any stale block.
    Allow { attempts: i32 },
    /// Budget exhausted on this attempt; write the block and deny.
    Block {
        attempts: i32,
        blocked_until: DateTime<Utc>,
        retry_after_seconds: u64,
    },
    /// Inside an active block; deny without touching the counter.
    AlreadyBlocked { retry_after_seconds: u64 },
}

/// Pure window/block transition. `counter` is `None` for a never-seen key.
fn decide(counter: Option<&CounterRow>, now: DateTime<Utc>, policy: RateLimitPolicy) -> Verdict {
    let Some(counter) = counter else {
        return Verdict::Allow { attempts: 1 };
    };

    if let Some(blocked_until) = counter.blocked_until {
        if blocked_until > now {
            return Verdict::AlreadyBlocked {
                retry_after_seconds: remaining_seconds(blocked_until, now),
            };
        }
    }

    if now - counter.last_attempt_at > Duration::seconds(policy.window_seconds) {
        return Verdict::Allow { attempts: 1 };
    }

    let attempts = counter.attempts.saturating_add(1);
    if attempts > policy.max_attempts {
        let blocked_until = now + Duration::seconds(policy.block_seconds);
        Verdict::Block {
            attempts,
            blocked_until,
            retry_after_seconds: remaining_seconds(blocked_until, now),
        }
    } else {
        Verdict::Allow { attempts }
    }
}

fn remaining_seconds(blocked_until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (blocked_until - now).num_milliseconds();
    u64::try_from(millis.div_euclid(1000) + i64::from(millis.rem_euclid(1000) > 0))
        .unwrap_or(0)
        .max(1)
}

/// Counter store backed by the `rate_limit_counters` table.
#[derive(Clone, Debug)]
pub struct PgRateLimiter {
    pool: PgPool,
}

impl PgRateLimiter {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn check_inner(&self, key: &str, policy: RateLimitPolicy) -> Result<RateLimitDecision> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin rate limit transaction")?;

        // Seed an empty counter so the FOR UPDATE below always has a row to
        // lock; the epoch stamp makes it read as an expired window.
        let query = r"
            INSERT INTO rate_limit_counters (key, attempts, last_attempt_at)
            VALUES ($1, 0, to_timestamp(0))
            ON CONFLICT (key) DO NOTHING
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(key)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to seed rate limit counter")?;

        let query = r"
            SELECT attempts, last_attempt_at, blocked_until
            FROM rate_limit_counters
            WHERE key = $1
            FOR UPDATE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(key)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lock rate limit counter")?;

        let counter = CounterRow {
            attempts: row.get("attempts"),
            last_attempt_at: row.get("last_attempt_at"),
            blocked_until: row.get("blocked_until"),
        };

        let decision = match decide(Some(&counter), now, policy) {
            Verdict::Allow { attempts } => {
                write_counter(&mut tx, key, attempts, now, None).await?;
                RateLimitDecision::Allowed
            }
            Verdict::Block {
                attempts,
                blocked_until,
                retry_after_seconds,
            } => {
                write_counter(&mut tx, key, attempts, now, Some(blocked_until)).await?;
                RateLimitDecision::Blocked {
                    retry_after_seconds,
                }
            }
            Verdict::AlreadyBlocked {
                retry_after_seconds,
            } => RateLimitDecision::Blocked {
                retry_after_seconds,
            },
        };

        tx.commit()
            .await
            .context("failed to commit rate limit transaction")?;
        Ok(decision)
    }
}

async fn write_counter(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    key: &str,
    attempts: i32,
    now: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
) -> Result<()> {
    let query = r"
        UPDATE rate_limit_counters
        SET attempts = $2, last_attempt_at = $3, blocked_until = $4
        WHERE key = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(key)
        .bind(attempts)
        .bind(now)
        .bind(blocked_until)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update rate limit counter")?;
    Ok(())
}

#[async_trait]
impl RateLimiter for PgRateLimiter {
    async fn check(
        &self,
        endpoint: &str,
        client: &str,
        policy: RateLimitPolicy,
    ) -> RateLimitDecision {
        let key = format!("{endpoint}:{client}");
        match self.check_inner(&key, policy).await {
            Ok(decision) => decision,
            Err(err) => {
                // Fail open: counter loss must not reject legitimate traffic.
                warn!("rate limit store unavailable, failing open: {err:#}");
                RateLimitDecision::Allowed
            }
        }
    }
}
