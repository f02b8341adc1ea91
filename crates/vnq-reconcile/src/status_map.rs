//! Broker status → local FSM status mapping table.
//!
//! A string-keyed match arm per broker vocabulary, retargeted from the
//! generic Alpaca-style status strings to the SSI wire vocabulary and
//! widened to the full `vnq_schemas::OrderStatus` enum.

use vnq_schemas::OrderStatus;

/// Map a raw broker status string to the local FSM status it implies.
///
/// Unknown strings degrade to `Pending` with a logged warning -- a strict
/// failure here would falsely reject live orders mid-session, so the
/// synchronizer simply skips the order this tick rather than attempting a
/// transition into a status it can't justify.
pub fn map_broker_status(raw: &str) -> Option<OrderStatus> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "NEW" | "QUEUED" | "PENDING" | "PENDING_NEW" => Some(OrderStatus::Pending),
        "PARTIAL" | "PARTIALLY_FILLED" => Some(OrderStatus::PartialFill),
        "MATCHED" | "FILLED" | "FULLY_FILLED" => Some(OrderStatus::Matched),
        "CANCELLED" | "CANCELED" | "EXPIRED" => Some(OrderStatus::Cancelled),
        "REJECTED" | "BROKER_REJECTED" => Some(OrderStatus::BrokerRejected),
        other => {
            tracing::warn!(raw = %other, "unrecognized broker order status, skipping this tick");
            None
        }
    }
}
