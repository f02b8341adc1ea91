//! Composition-root adapter wiring `vnq_pipeline::PlaceOrderPort` to the
//! real `vnq_execution::place_order` use case.
//!
//! No crate in the workspace implements this port directly: the pipeline
//! only knows symbol/side/quantity/limit_price, while `place_order` needs a
//! reference price, portfolio snapshot, and risk limits too. This adapter
//! supplies the missing pieces from `AppState` at call time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use vnq_execution::{place_order, OrderDraft, PlacementOutcome};
use vnq_pipeline::PlaceOrderPort;
use vnq_schemas::{Exchange, OrderType, Price, Quantity, Side, Symbol};

use crate::state::AppState;

pub struct DaemonPlaceOrderPort {
    pub state: Arc<AppState>,
}

#[async_trait]
impl PlaceOrderPort for DaemonPlaceOrderPort {
    async fn place(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: i64,
        limit_price: Decimal,
        idempotency_key: &str,
    ) -> anyhow::Result<Option<String>> {
        let reference_price = self.state.tick_repo.get_latest_price(symbol).await?;

        let draft = OrderDraft {
            symbol: symbol.clone(),
            // The pipeline's screener/technical nodes reason over symbols
            // only; HOSE is the default listing venue for the large-cap
            // names the watchlist screen is tuned for.
            exchange: Exchange::Hose,
            side,
            order_type: OrderType::Lo,
            quantity: Quantity::new(quantity),
            limit_price: Price::new(limit_price),
            reference_price: Price::new(reference_price),
            pending_sell_qty: 0,
            idempotency_key: idempotency_key.to_string(),
        };

        let (portfolio, limits, daily_loss) = {
            let portfolio = self.state.portfolio.read().await.clone();
            let limits = self.state.risk_limits.read().await.clone();
            let daily_loss = self.state.daily_pnl.read().await.to_daily_loss_state();
            (portfolio, limits, daily_loss)
        };

        let result = place_order(
            draft,
            &portfolio,
            &limits,
            &daily_loss,
            self.state.order_store.as_ref(),
            self.state.broker.as_ref(),
            self.state.audit.as_ref(),
            self.state.dry_run,
            Utc::now(),
        )
        .await?;

        match result.outcome {
            PlacementOutcome::Submitted => Ok(result.order.broker_order_id),
            PlacementOutcome::Replayed => Ok(result.order.broker_order_id),
            PlacementOutcome::RiskRejected | PlacementOutcome::BrokerRejected => Ok(None),
        }
    }
}
