//! The `place_order` use case.
//!
//! Sequencing: idempotency lookup first, then risk gate, then broker call.
//! A duplicate `idempotency_key` short-circuits with the previously stored
//! result instead of erroring.
//!
//! The initial lookup is only a fast path -- two callers racing on the same
//! key can both miss it. The actual dedup guarantee comes from
//! `OrderStore::insert`'s conflict signal: whichever caller loses the
//! insert re-fetches and returns the winner's row as `Replayed` instead of
//! proceeding to its own broker call, so at most one broker submission ever
//! happens per key.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use vnq_risk::{validate_order, DailyLossState, OrderRequest};
use vnq_schemas::{Order, OrderStatus, OrderType, PortfolioState, Price, Quantity, RiskLimit, Side, Symbol};

use crate::ports::{AuditOutcome, AuditRecord, AuditSink, BrokerAdapter, OrderStore};

#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub symbol: Symbol,
    pub exchange: vnq_schemas::Exchange,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub limit_price: Price,
    pub reference_price: Price,
    pub pending_sell_qty: i64,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// A previous call with the same idempotency key already produced this
    /// order; it is returned unchanged and no new side effects occur.
    Replayed,
    /// The risk gate rejected the order before it ever reached the broker.
    RiskRejected,
    /// The order passed the risk gate and was (or, under `dry_run`, would
    /// have been) sent to the broker.
    Submitted,
    /// The broker rejected the order after the risk gate approved it.
    BrokerRejected,
}

#[derive(Debug, Clone)]
pub struct PlacementResult {
    pub order: Order,
    pub outcome: PlacementOutcome,
}

/// Place an order: idempotency dedup, risk gate, (optionally) broker
/// submission, in that order. `dry_run` stops short of the broker call and
/// leaves the order `Pending` -- used by paper-trading / backtest callers.
#[allow(clippy::too_many_arguments)]
pub async fn place_order(
    draft: OrderDraft,
    portfolio: &PortfolioState,
    limits: &RiskLimit,
    daily_loss: &DailyLossState,
    store: &dyn OrderStore,
    broker: &dyn BrokerAdapter,
    audit: &dyn AuditSink,
    dry_run: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<PlacementResult> {
    if let Some(existing) = store.find_by_idempotency_key(&draft.idempotency_key).await? {
        tracing::info!(idempotency_key = %draft.idempotency_key, order_id = %existing.order_id, "replaying previously placed order");
        return Ok(PlacementResult {
            order: existing,
            outcome: PlacementOutcome::Replayed,
        });
    }

    let band = vnq_risk::calculate_price_band(draft.symbol.clone(), draft.exchange, draft.reference_price);
    let created = Order {
        order_id: Uuid::new_v4().to_string(),
        symbol: draft.symbol.clone(),
        side: draft.side,
        order_type: draft.order_type,
        quantity: draft.quantity,
        limit_price: draft.limit_price,
        ceiling_price: band.ceiling,
        floor_price: band.floor,
        status: OrderStatus::Created,
        filled_quantity: Quantity::new(0),
        avg_fill_price: Price::from_i64(0),
        broker_order_id: None,
        rejection_reason: None,
        idempotency_key: draft.idempotency_key.clone(),
        created_at: now,
        updated_at: now,
    };

    let req = OrderRequest {
        symbol: draft.symbol.clone(),
        exchange: draft.exchange,
        side: draft.side,
        quantity: draft.quantity,
        limit_price: draft.limit_price,
        reference_price: draft.reference_price,
        pending_sell_qty: draft.pending_sell_qty,
    };
    let gate_result = validate_order(&req, portfolio, limits, daily_loss);
    let gated = vnq_risk::apply_gate_result(&created, &gate_result, now)?;

    if !gate_result.approved {
        tracing::warn!(order_id = %gated.order_id, reason = ?gated.rejection_reason, "order rejected by risk gate");
        if !store.insert(&gated).await? {
            return replay_existing(store, &draft.idempotency_key).await;
        }
        audit
            .record(AuditRecord {
                order_id: gated.order_id.clone(),
                idempotency_key: gated.idempotency_key.clone(),
                outcome: AuditOutcome::RiskRejected,
                rejection_reason: gated.rejection_reason.clone(),
                at: now,
            })
            .await?;
        return Ok(PlacementResult {
            order: gated,
            outcome: PlacementOutcome::RiskRejected,
        });
    }

    if !store.insert(&gated).await? {
        // Another caller with this idempotency_key won the insert race
        // between our lookup above and now; their broker submission (or
        // lack of one) is authoritative, not ours.
        return replay_existing(store, &draft.idempotency_key).await;
    }

    if dry_run {
        audit
            .record(AuditRecord {
                order_id: gated.order_id.clone(),
                idempotency_key: gated.idempotency_key.clone(),
                outcome: AuditOutcome::Submitted,
                rejection_reason: None,
                at: now,
            })
            .await?;
        return Ok(PlacementResult {
            order: gated,
            outcome: PlacementOutcome::Submitted,
        });
    }

    match broker.place_order(&gated).await {
        Ok(ack) => {
            let accepted = gated.transition_to(
                OrderStatus::Pending,
                vnq_schemas::order::TransitionPatch {
                    broker_order_id: Some(ack.broker_order_id),
                    ..Default::default()
                },
                now,
            )?;
            store.update(&accepted).await?;
            audit
                .record(AuditRecord {
                    order_id: accepted.order_id.clone(),
                    idempotency_key: accepted.idempotency_key.clone(),
                    outcome: AuditOutcome::Submitted,
                    rejection_reason: None,
                    at: now,
                })
                .await?;
            Ok(PlacementResult {
                order: accepted,
                outcome: PlacementOutcome::Submitted,
            })
        }
        Err(rejection) => {
            let rejected = gated.transition_to(
                OrderStatus::BrokerRejected,
                vnq_schemas::order::TransitionPatch {
                    rejection_reason: Some(rejection.reason),
                    ..Default::default()
                },
                now,
            )?;
            store.update(&rejected).await?;
            tracing::error!(order_id = %rejected.order_id, "broker rejected order");
            audit
                .record(AuditRecord {
                    order_id: rejected.order_id.clone(),
                    idempotency_key: rejected.idempotency_key.clone(),
                    outcome: AuditOutcome::BrokerRejected,
                    rejection_reason: rejected.rejection_reason.clone(),
                    at: now,
                })
                .await?;
            Ok(PlacementResult {
                order: rejected,
                outcome: PlacementOutcome::BrokerRejected,
            })
        }
    }
}

/// Fetch the row a concurrent caller won the insert race for. The row must
/// exist -- the conflict that sent us here came from that exact key.
async fn replay_existing(store: &dyn OrderStore, idempotency_key: &str) -> anyhow::Result<PlacementResult> {
    let existing = store
        .find_by_idempotency_key(idempotency_key)
        .await?
        .ok_or_else(|| anyhow::anyhow!("insert conflicted on idempotency_key {idempotency_key} but no row was found"))?;
    tracing::info!(idempotency_key = %idempotency_key, order_id = %existing.order_id, "lost idempotent insert race, replaying winner's order");
    Ok(PlacementResult {
        order: existing,
        outcome: PlacementOutcome::Replayed,
    })
}
