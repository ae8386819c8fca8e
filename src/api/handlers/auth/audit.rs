//! Append-only audit trail.
//!
//! This core only ever writes audit rows; nothing here reads them back.
//! Recording is best-effort: a failed insert is logged and the request
//! proceeds, since losing an audit row must not fail an auth operation.

use sqlx::PgPool;
use tracing::{Instrument, error};
use uuid::Uuid;

use super::utils::ClientMeta;

pub(super) const RESOURCE_AUTH: &str = "auth";

pub(super) async fn record_event(
    pool: &PgPool,
    account_id: Option<Uuid>,
    action: &str,
    meta: Option<serde_json::Value>,
    client: &ClientMeta,
) {
    // Serialized on the way in; the column is jsonb.
    let meta_text = meta.map(|value| value.to_string());
    let query = r"
        INSERT INTO audit_events (account_id, action, resource, meta, ip, user_agent)
        VALUES ($1, $2, $3, $4::jsonb, $5, $6)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(account_id)
        .bind(action)
        .bind(RESOURCE_AUTH)
        .bind(meta_text)
        .bind(client.ip.as_deref())
        .bind(client.user_agent.as_deref())
        .execute(pool)
        .instrument(span)
        .await;

    if let Err(err) = result {
        error!("failed to record audit event {action}: {err}");
    }
}
