//! The multi-agent pipeline's DAG nodes. Each node is a plain
//! function or a thin async wrapper over a port call; routing between them
//! lives in [`crate::supervisor`], never inside a node.

pub mod executor;
pub mod finalize;
pub mod fundamental;
pub mod risk;
pub mod screener;
pub mod technical;
