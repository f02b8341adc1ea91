//! Idempotency record — binds a client-chosen key to at most one outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored idempotency outcome. `result_json` carries whatever the
/// originating use case returned (e.g. a serialized `PlaceOrderResult`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub result_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub const DEFAULT_TTL_HOURS: i64 = 24;

    pub fn new(key: impl Into<String>, result_json: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            result_json,
            created_at: now,
            expires_at: now + chrono::Duration::hours(Self::DEFAULT_TTL_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
