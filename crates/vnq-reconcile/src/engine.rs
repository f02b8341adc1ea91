//! Per-order reconciliation.
//!
//! Pure, deterministic: given the locally-known order and what the broker
//! currently reports, decide whether to transition, leave it alone, or log a
//! conflict. No IO here -- the periodic task in [`crate::task`] owns the
//! broker/store calls and feeds this function their results.

use chrono::{DateTime, Utc};

use vnq_execution::BrokerOrderStatus;
use vnq_schemas::order::TransitionPatch;
use vnq_schemas::{Order, OrderStatus, Price};

use crate::status_map::map_broker_status;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Broker status matches (or maps to) the order's current local status;
    /// nothing to do.
    Unchanged,
    /// The order converged toward the broker-reported status.
    Transitioned(Order),
    /// The broker reported a status that would require an illegal FSM
    /// transition (e.g. MATCHED on a locally-CANCELLED order), or an
    /// unrecognized status string. Local state is kept -- local FSM
    /// invariants outrank broker optimism.
    Conflict { local: Order, broker_raw_status: String },
    /// The order is already terminal locally; the broker no longer needs to
    /// be queried for it (the synchronizer filters these out before calling
    /// this function, this variant exists for defensive completeness).
    AlreadyTerminal,
}

/// Reconcile one order against one broker status report.
pub fn reconcile_order(local: &Order, broker: &BrokerOrderStatus, now: DateTime<Utc>) -> ReconcileOutcome {
    if local.status.is_terminal() {
        return ReconcileOutcome::AlreadyTerminal;
    }

    let Some(mapped) = map_broker_status(&broker.raw_status) else {
        return ReconcileOutcome::Conflict {
            local: local.clone(),
            broker_raw_status: broker.raw_status.clone(),
        };
    };

    if mapped == local.status {
        return ReconcileOutcome::Unchanged;
    }

    let patch = match mapped {
        OrderStatus::PartialFill | OrderStatus::Matched => TransitionPatch {
            filled_quantity: Some(vnq_schemas::Quantity::new(broker.filled_quantity)),
            avg_fill_price: broker.avg_fill_price.map(Price::new),
            broker_order_id: Some(broker.broker_order_id.clone()),
            ..Default::default()
        },
        OrderStatus::BrokerRejected => TransitionPatch {
            rejection_reason: Some(format!("broker reported status {}", broker.raw_status)),
            ..Default::default()
        },
        _ => TransitionPatch::default(),
    };

    match local.transition_to(mapped, patch, now) {
        Ok(transitioned) => ReconcileOutcome::Transitioned(transitioned),
        Err(err) => {
            tracing::warn!(
                order_id = %local.order_id,
                local_status = ?local.status,
                broker_status = %broker.raw_status,
                error = %err,
                "reconcile: broker-implied transition is illegal under the local FSM, keeping local state"
            );
            ReconcileOutcome::Conflict {
                local: local.clone(),
                broker_raw_status: broker.raw_status.clone(),
            }
        }
    }
}
