//! vnq-md
//!
//! Live tick ingestion: a bounded ring buffer fed by an ingest task and
//! drained on a timer by a flush task.

pub mod ring_buffer;
pub mod tasks;

pub use ring_buffer::{RingBuffer, DEFAULT_MAX_BUFFER_SIZE};
pub use tasks::{run_flush_task, run_ingest_task, DEFAULT_FLUSH_INTERVAL};
