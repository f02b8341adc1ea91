//! Append-only audit trail for order approvals and rejections.
//!
//! A plain monotonic append, not a hash-chained log: multi-process audit
//! ordering across concurrent writers is not guaranteed here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use vnq_execution::{AuditOutcome, AuditRecord, AuditSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventType {
    OrderApproved,
    OrderRejected,
    RiskRejected,
    BrokerRejected,
}

impl AuditEventType {
    fn as_str(self) -> &'static str {
        match self {
            AuditEventType::OrderApproved => "ORDER_APPROVED",
            AuditEventType::OrderRejected => "ORDER_REJECTED",
            AuditEventType::RiskRejected => "RISK_REJECTED",
            AuditEventType::BrokerRejected => "BROKER_REJECTED",
        }
    }
}

/// One append-only audit row: every `place_order` outcome and every
/// risk-gate rejection the composition root wants recorded.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub run_id: Option<Uuid>,
    pub ts_utc: DateTime<Utc>,
    pub agent: String,
    pub event_type: AuditEventType,
    pub idempotency_key: Option<String>,
    pub checks_passed: Vec<String>,
    pub checks_failed: Vec<String>,
    pub payload: Value,
}

/// Append one audit event. There is no update/delete path -- the table is
/// write-once by design.
pub async fn insert_audit_event(pool: &PgPool, ev: &AuditEvent) -> Result<()> {
    sqlx::query(
        r#"
        insert into audit_events (
          run_id, ts_utc, agent, event_type, idempotency_key,
          checks_passed, checks_failed, payload
        ) values ($1,$2,$3,$4,$5,$6,$7,$8)
        "#,
    )
    .bind(ev.run_id)
    .bind(ev.ts_utc)
    .bind(&ev.agent)
    .bind(ev.event_type.as_str())
    .bind(&ev.idempotency_key)
    .bind(serde_json::to_value(&ev.checks_passed).context("serialize checks_passed")?)
    .bind(serde_json::to_value(&ev.checks_failed).context("serialize checks_failed")?)
    .bind(&ev.payload)
    .execute(pool)
    .await
    .context("insert_audit_event failed")?;

    Ok(())
}

/// Adapts `place_order`'s narrow `vnq_execution::AuditSink` port onto this
/// table -- the composition root's one real audit writer.
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        let (event_type, checks_passed, checks_failed) = match record.outcome {
            AuditOutcome::Submitted => (AuditEventType::OrderApproved, vec!["risk_gate".to_string()], vec![]),
            AuditOutcome::RiskRejected => (AuditEventType::RiskRejected, vec![], vec!["risk_gate".to_string()]),
            AuditOutcome::BrokerRejected => {
                (AuditEventType::BrokerRejected, vec!["risk_gate".to_string()], vec!["broker".to_string()])
            }
        };

        let ev = AuditEvent {
            run_id: None,
            ts_utc: record.at,
            agent: "place_order".to_string(),
            event_type,
            idempotency_key: Some(record.idempotency_key),
            checks_passed,
            checks_failed,
            payload: serde_json::json!({
                "order_id": record.order_id,
                "rejection_reason": record.rejection_reason,
            }),
        };
        insert_audit_event(&self.pool, &ev).await
    }
}

/// Load audit events for a run, oldest first -- used by operators reviewing
/// why an order was rejected.
pub async fn load_audit_events_for_run(pool: &PgPool, run_id: Uuid) -> Result<Vec<(DateTime<Utc>, String, String)>> {
    let rows: Vec<(DateTime<Utc>, String, String)> = sqlx::query_as(
        r#"
        select ts_utc, agent, event_type
        from audit_events
        where run_id = $1
        order by ts_utc asc, event_id asc
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await
    .context("load_audit_events_for_run failed")?;

    Ok(rows)
}
