//! vnq-execution
//!
//! The `place_order` use case: idempotency dedup, the risk gate, and broker
//! submission, composed behind a narrow set of ports so this crate never
//! depends on a concrete persistence or broker adapter.

pub mod place_order;
pub mod ports;

pub use place_order::{place_order, OrderDraft, PlacementOutcome, PlacementResult};
pub use ports::{
    AuditOutcome, AuditRecord, AuditSink, BrokerAck, BrokerAdapter, BrokerOrderStatus, BrokerRejected, OrderStore,
};
