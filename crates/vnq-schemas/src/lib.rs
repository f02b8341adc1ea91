//! vnq-schemas
//!
//! Value objects, domain entities, the order FSM, and the shared pipeline
//! scratchpad. Everything here is a plain data type or a pure, total
//! function over data — no I/O, no ports. Adapters and use cases in other
//! crates depend on these shapes.

pub mod agent_state;
pub mod idempotency;
pub mod order;
pub mod portfolio;
pub mod tick;
pub mod value_objects;

pub use agent_state::{
    AgentPhase, AgentState, EarlyWarningLevel, EarlyWarningResult, ExecutionPlan,
    PipelineConfig, PortfolioContext, RiskAssessment, ScreenerResult, SignalAction,
    TechnicalScore,
};
pub use idempotency::IdempotencyRecord;
pub use order::{InvalidTransition, Order, OrderStatus, OrderType, Side, TransitionPatch};
pub use portfolio::{CashBalance, PortfolioState, Position, RiskLimit};
pub use tick::{Tick, TickValidationError};
pub use value_objects::{Exchange, Price, Quantity, Symbol, LOT_SIZE};
