//! vnq-reconcile
//!
//! The order status synchronizer: a periodic loop that converges
//! local order state toward the broker's source of truth, never silently
//! overwriting a terminal local status.

pub mod engine;
pub mod status_map;
pub mod task;

pub use engine::{reconcile_order, ReconcileOutcome};
pub use status_map::map_broker_status;
pub use task::{run_sync_task, run_sync_tick, DEFAULT_SYNC_INTERVAL};
