//! vnq-pipeline
//!
//! The multi-agent decision pipeline: a statically-defined DAG
//! over [`vnq_schemas::AgentState`] -- screener -> technical -> optional
//! fundamental -> risk -> executor -> finalize, with deterministic
//! conditional routing. No node's control flow is LLM-directed; every route
//! is plain Rust over shared state.

pub mod indicators;
pub mod nodes;
pub mod ports;
pub mod state;
pub mod supervisor;

pub use ports::{AiEnginePort, EarlyWarningAssessment, OhlcvBar, PlaceOrderPort, RiskLevel, ScreenerCandidate, ScreenerPort, TickRepoPort};
pub use state::{apply, inject_context, PartialAgentUpdate};
pub use supervisor::Supervisor;
