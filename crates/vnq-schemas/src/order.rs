//! Order entity — immutable value with an enforced, whitelisted FSM.
//!
//! A pure function consults a constant lookup table of allowed successors
//! and produces a *new* value; nothing is ever mutated in place.
//! `transition_to` is that function here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value_objects::{Price, Quantity, Symbol};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Lo,
    Ato,
    Atc,
    Mp,
}

/// Order lifecycle states — whitelist approach.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Pending,
    PartialFill,
    Matched,
    Rejected,
    BrokerRejected,
    Cancelled,
}

impl OrderStatus {
    /// Whitelisted successors for this state. Empty = terminal.
    fn allowed_successors(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Created => &[Pending, Rejected, Cancelled],
            Pending => &[PartialFill, Matched, BrokerRejected, Cancelled],
            PartialFill => &[PartialFill, Matched, Cancelled],
            Matched | Rejected | BrokerRejected | Cancelled => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_successors().is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// An immutable order record. Any status change produces a new `Order`
/// through [`Order::transition_to`]; this value is never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub limit_price: Price,
    pub ceiling_price: Price,
    pub floor_price: Price,

    pub status: OrderStatus,
    pub filled_quantity: Quantity,
    pub avg_fill_price: Price,

    pub broker_order_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub idempotency_key: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields that may be set by a transition in addition to the new status.
/// Anything left `None` keeps the prior order's value.
#[derive(Debug, Clone, Default)]
pub struct TransitionPatch {
    pub filled_quantity: Option<Quantity>,
    pub avg_fill_price: Option<Price>,
    pub broker_order_id: Option<String>,
    pub rejection_reason: Option<String>,
}

impl Order {
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// Apply a whitelisted state transition, producing a new `Order`.
    ///
    /// Enforces two invariants after assembling the candidate value:
    /// - `filled_quantity <= quantity` always.
    /// - A patch that sets a non-zero `filled_quantity` on a transition into
    ///   a status that implies no fills occurred (e.g. `CREATED -> REJECTED`)
    ///   is rejected.
    pub fn transition_to(
        &self,
        next: OrderStatus,
        patch: TransitionPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, InvalidTransition> {
        if !self.status.allowed_successors().contains(&next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let mut candidate = self.clone();
        candidate.status = next;
        candidate.updated_at = now;
        if let Some(fq) = patch.filled_quantity {
            candidate.filled_quantity = fq;
        }
        if let Some(afp) = patch.avg_fill_price {
            candidate.avg_fill_price = afp;
        }
        if let Some(boid) = patch.broker_order_id {
            candidate.broker_order_id = Some(boid);
        }
        if let Some(reason) = patch.rejection_reason {
            candidate.rejection_reason = Some(reason);
        }

        // Post-assembly invariant checks. A contradictory patch (e.g. fills
        // appearing on a terminal-reject transition) is itself an invalid
        // transition, not a silently-accepted order.
        if candidate.filled_quantity.raw() > candidate.quantity.raw() {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if matches!(next, OrderStatus::Created | OrderStatus::Rejected)
            && candidate.filled_quantity.raw() != 0
        {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 9, 9, 30, 0).unwrap()
    }

    fn fresh_order() -> Order {
        Order {
            order_id: "ord-1".into(),
            symbol: Symbol::new("FPT"),
            side: Side::Buy,
            order_type: OrderType::Lo,
            quantity: Quantity::new(500),
            limit_price: Price::from_i64(72_000),
            ceiling_price: Price::from_i64(77_000),
            floor_price: Price::from_i64(67_000),
            status: OrderStatus::Created,
            filled_quantity: Quantity::new(0),
            avg_fill_price: Price::from_i64(0),
            broker_order_id: None,
            rejection_reason: None,
            idempotency_key: "IDEM-ABC".into(),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[test]
    fn created_to_pending_is_legal() {
        let o = fresh_order();
        let next = o
            .transition_to(OrderStatus::Pending, TransitionPatch::default(), ts())
            .unwrap();
        assert_eq!(next.status, OrderStatus::Pending);
        // original untouched
        assert_eq!(o.status, OrderStatus::Created);
    }

    #[test]
    fn created_to_matched_is_illegal() {
        let o = fresh_order();
        let err = o
            .transition_to(OrderStatus::Matched, TransitionPatch::default(), ts())
            .unwrap_err();
        assert_eq!(err.from, OrderStatus::Created);
        assert_eq!(err.to, OrderStatus::Matched);
    }

    #[test]
    fn terminal_states_have_no_successors() {
        let mut o = fresh_order();
        o.status = OrderStatus::Matched;
        assert!(o.status.is_terminal());
        let err = o
            .transition_to(OrderStatus::Cancelled, TransitionPatch::default(), ts())
            .unwrap_err();
        assert_eq!(err.from, OrderStatus::Matched);
    }

    #[test]
    fn partial_fill_then_matched() {
        let o = fresh_order();
        let pending = o
            .transition_to(OrderStatus::Pending, TransitionPatch::default(), ts())
            .unwrap();
        let partial = pending
            .transition_to(
                OrderStatus::PartialFill,
                TransitionPatch {
                    filled_quantity: Some(Quantity::new(200)),
                    avg_fill_price: Some(Price::from_i64(72_000)),
                    ..Default::default()
                },
                ts(),
            )
            .unwrap();
        assert_eq!(partial.remaining().raw(), 300);
        let matched = partial
            .transition_to(
                OrderStatus::Matched,
                TransitionPatch {
                    filled_quantity: Some(Quantity::new(500)),
                    ..Default::default()
                },
                ts(),
            )
            .unwrap();
        assert_eq!(matched.remaining().raw(), 0);
    }

    #[test]
    fn fills_on_reject_are_rejected_by_invariant_check() {
        let o = fresh_order();
        let err = o
            .transition_to(
                OrderStatus::Rejected,
                TransitionPatch {
                    filled_quantity: Some(Quantity::new(100)),
                    ..Default::default()
                },
                ts(),
            )
            .unwrap_err();
        assert_eq!(err.from, OrderStatus::Created);
    }

    #[test]
    fn filled_quantity_cannot_exceed_requested_quantity() {
        let o = fresh_order();
        let pending = o
            .transition_to(OrderStatus::Pending, TransitionPatch::default(), ts())
            .unwrap();
        let err = pending
            .transition_to(
                OrderStatus::PartialFill,
                TransitionPatch {
                    filled_quantity: Some(Quantity::new(600)),
                    ..Default::default()
                },
                ts(),
            )
            .unwrap_err();
        assert_eq!(err.from, OrderStatus::Pending);
    }
}
