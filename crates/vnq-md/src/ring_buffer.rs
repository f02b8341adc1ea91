//! Bounded tick ring buffer.
//!
//! The ingest task pushes ticks as they arrive off the market-data feed; the
//! flush task drains them on a timer into persistence. If the flush task
//! falls behind, the oldest ticks are dropped rather than growing unbounded
//! memory -- a live trading feed cares about throughput staying
//! bounded more than about never losing a tick under sustained backpressure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use vnq_schemas::Tick;

pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100_000;

pub struct RingBuffer {
    max_size: usize,
    buffer: Mutex<VecDeque<Tick>>,
    total_ingested: AtomicU64,
    total_dropped: AtomicU64,
    total_flushed: AtomicU64,
}

impl RingBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            buffer: Mutex::new(VecDeque::with_capacity(max_size.min(1024))),
            total_ingested: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
            total_flushed: AtomicU64::new(0),
        }
    }

    /// Push a tick, evicting the oldest entry if the buffer is full.
    pub fn push(&self, tick: Tick) {
        let mut buf = self.buffer.lock().unwrap();
        if buf.len() >= self.max_size {
            buf.pop_front();
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }
        buf.push_back(tick);
        self.total_ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// Drain up to `limit` ticks in FIFO order for the flush task.
    pub fn drain(&self, limit: usize) -> Vec<Tick> {
        let mut buf = self.buffer.lock().unwrap();
        let n = limit.min(buf.len());
        let batch: Vec<Tick> = buf.drain(..n).collect();
        self.total_flushed.fetch_add(batch.len() as u64, Ordering::Relaxed);
        batch
    }

    /// Drain everything currently buffered -- used on graceful shutdown so
    /// no ingested tick is lost to an in-progress stop.
    pub fn drain_all(&self) -> Vec<Tick> {
        let len = self.buffer.lock().unwrap().len();
        self.drain(len)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_ingested(&self) -> u64 {
        self.total_ingested.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }

    pub fn total_flushed(&self) -> u64 {
        self.total_flushed.load(Ordering::Relaxed)
    }
}
