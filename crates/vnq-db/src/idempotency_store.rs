//! Generic idempotency ledger backing [`vnq_schemas::IdempotencyRecord`].
//!
//! Separate from `orders.idempotency_key` (which dedupes order placement
//! specifically): this table is for any use case that wants a
//! client-chosen key bound to at most one stored outcome with a TTL.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};

use vnq_schemas::IdempotencyRecord;

pub struct PgIdempotencyStore {
    pool: PgPool,
}

impl PgIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new record. Returns `false` without writing if `key` already exists.
    pub async fn insert_if_absent(&self, record: &IdempotencyRecord) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            insert into idempotency_keys (key, result_json, created_at, expires_at)
            values ($1, $2, $3, $4)
            on conflict (key) do nothing
            returning key
            "#,
        )
        .bind(&record.key)
        .bind(&record.result_json)
        .bind(record.created_at)
        .bind(record.expires_at)
        .fetch_optional(&self.pool)
        .await
        .context("idempotency_keys insert failed")?;

        Ok(row.is_some())
    }

    pub async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query("select key, result_json, created_at, expires_at from idempotency_keys where key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("idempotency_keys lookup failed")?;

        let Some(row) = row else { return Ok(None) };

        Ok(Some(IdempotencyRecord {
            key: row.try_get("key")?,
            result_json: row.try_get("result_json")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        }))
    }

    /// Delete all records whose `expires_at` has passed. Returns the number removed.
    pub async fn purge_expired(&self, now: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        let res = sqlx::query("delete from idempotency_keys where expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("idempotency_keys purge failed")?;

        Ok(res.rows_affected())
    }
}
