//! Periodic order-status synchronizer.
//!
//! On every tick: fetch locally-open orders, query the broker for each by
//! `broker_order_id`, reconcile, and persist whatever changed. A query
//! failure for one order (network blip, broker-side hiccup) is logged and
//! skipped -- it must never abort the whole tick, since the remaining
//! orders still need to converge.

use std::sync::Arc;
use std::time::Duration;

use vnq_execution::{BrokerAdapter, OrderStore};
use vnq_resilience::ShutdownSignal;

use crate::engine::{reconcile_order, ReconcileOutcome};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(2);

/// Run one reconciliation pass over every locally-open order.
pub async fn run_sync_tick(store: &dyn OrderStore, broker: &dyn BrokerAdapter) -> anyhow::Result<()> {
    let open_orders = store.find_open_orders().await?;
    let now = chrono::Utc::now();

    for order in open_orders {
        let Some(broker_order_id) = order.broker_order_id.clone() else {
            // Created but never submitted -- nothing at the broker to reconcile against yet.
            continue;
        };

        let broker_status = match broker.get_order_status(&broker_order_id).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(order_id = %order.order_id, %broker_order_id, error = %err, "reconcile: broker status query failed, skipping this tick");
                continue;
            }
        };

        match reconcile_order(&order, &broker_status, now) {
            ReconcileOutcome::Transitioned(updated) => {
                tracing::info!(
                    order_id = %updated.order_id,
                    from = ?order.status,
                    to = ?updated.status,
                    "reconcile: order converged to broker-reported status"
                );
                store.update(&updated).await?;
            }
            ReconcileOutcome::Conflict { local, broker_raw_status } => {
                tracing::error!(
                    order_id = %local.order_id,
                    local_status = ?local.status,
                    broker_raw_status = %broker_raw_status,
                    "reconcile: conflict between local FSM and broker-reported status, keeping local state"
                );
            }
            ReconcileOutcome::Unchanged | ReconcileOutcome::AlreadyTerminal => {}
        }
    }

    Ok(())
}

/// Run [`run_sync_tick`] on a fixed interval until shutdown is signalled.
pub async fn run_sync_task(
    store: Arc<dyn OrderStore>,
    broker: Arc<dyn BrokerAdapter>,
    interval: Duration,
    shutdown: ShutdownSignal,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                tracing::info!("reconcile task stopping on shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = run_sync_tick(store.as_ref(), broker.as_ref()).await {
                    tracing::error!(?err, "reconcile tick failed");
                }
            }
        }
    }
}
