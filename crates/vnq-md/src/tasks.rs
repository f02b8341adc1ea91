//! Ingest and flush tasks wired around the [`RingBuffer`](crate::ring_buffer::RingBuffer).
//!
//! Two independent tokio tasks share one buffer: the ingest task is a
//! producer consuming from an upstream tick source (the `vnq-broker`
//! WebSocket client or a replay feed), the flush task is a consumer that
//! wakes on a fixed interval and persists whatever has accumulated. Neither
//! task blocks the other -- a slow flush never backpressures ingest, it
//! just means the buffer fills and starts dropping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use vnq_resilience::ShutdownSignal;
use vnq_schemas::Tick;

use crate::ring_buffer::RingBuffer;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Consume ticks from `source` and push them into `buffer` until the
/// channel closes or shutdown is signalled.
pub async fn run_ingest_task(
    buffer: Arc<RingBuffer>,
    mut source: mpsc::Receiver<Tick>,
    shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                tracing::info!("ingest task stopping on shutdown signal");
                break;
            }
            maybe_tick = source.recv() => {
                match maybe_tick {
                    Some(tick) => buffer.push(tick),
                    None => {
                        tracing::info!("ingest source closed, stopping ingest task");
                        break;
                    }
                }
            }
        }
    }
}

/// Drain `buffer` on a fixed interval via `flush`. On shutdown, performs one
/// final drain of whatever remains so no ingested tick is lost.
pub async fn run_flush_task<F, Fut>(
    buffer: Arc<RingBuffer>,
    interval: Duration,
    shutdown: ShutdownSignal,
    mut flush: F,
) where
    F: FnMut(Vec<Tick>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                let remaining = buffer.drain_all();
                if !remaining.is_empty() {
                    if let Err(err) = flush(remaining).await {
                        tracing::error!(?err, "final flush on shutdown failed");
                    }
                }
                tracing::info!("flush task stopping on shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let batch = buffer.drain(buffer.len());
                if batch.is_empty() {
                    continue;
                }
                if let Err(err) = flush(batch).await {
                    tracing::error!(?err, "periodic flush failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vnq_schemas::{Exchange, Price, Symbol};

    fn tick() -> Tick {
        Tick::new(
            Symbol::new("FPT"),
            Price::from_i64(72_000),
            100,
            Exchange::Hose,
            Utc.with_ymd_and_hms(2026, 7, 30, 9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn ingest_task_pushes_ticks_until_channel_closes() {
        let buffer = Arc::new(RingBuffer::new(100));
        let (tx, rx) = mpsc::channel(8);
        let shutdown = ShutdownSignal::new();

        tx.send(tick()).await.unwrap();
        tx.send(tick()).await.unwrap();
        drop(tx);

        run_ingest_task(buffer.clone(), rx, shutdown).await;
        assert_eq!(buffer.total_ingested(), 2);
    }

    #[tokio::test]
    async fn ingest_task_stops_on_shutdown_signal() {
        let buffer = Arc::new(RingBuffer::new(100));
        let (_tx, rx) = mpsc::channel(8);
        let shutdown = ShutdownSignal::new();
        let shutdown_clone = shutdown.clone();

        let handle = tokio::spawn(run_ingest_task(buffer, rx, shutdown_clone));
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("ingest task should stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn flush_task_drains_remaining_ticks_on_shutdown() {
        let buffer = Arc::new(RingBuffer::new(100));
        buffer.push(tick());
        buffer.push(tick());

        let shutdown = ShutdownSignal::new();
        let shutdown_clone = shutdown.clone();
        let flushed_count = Arc::new(AtomicUsize::new(0));
        let counter = flushed_count.clone();

        let handle = tokio::spawn(run_flush_task(
            buffer.clone(),
            Duration::from_secs(60),
            shutdown_clone,
            move |batch: Vec<Tick>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(batch.len(), Ordering::SeqCst);
                    Ok(())
                }
            },
        ));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("flush task should stop promptly")
            .unwrap();
        assert_eq!(flushed_count.load(Ordering::SeqCst), 2);
        assert!(buffer.is_empty());
    }
}
