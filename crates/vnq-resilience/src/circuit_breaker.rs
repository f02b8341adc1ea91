//! Per-dependency circuit breaker.
//!
//! Grounded on `original_source/packages/adapters/src/adapters/circuit_breaker.py`:
//! CLOSED passes calls and counts failures; at `failure_threshold` it trips
//! OPEN and fails fast until `recovery_timeout` elapses, then admits one
//! HALF_OPEN probe. Success closes it; failure re-opens it and resets the
//! timer. Ported to Rust as an explicit state enum behind a mutex rather
//! than the Python dataclass's bare fields, since callers here are
//! concurrent Tokio tasks rather than a single-threaded event loop.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("circuit '{name}' is open, retry after {remaining_ms}ms")]
pub struct CircuitOpen {
    pub name: String,
    pub remaining_ms: u64,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    /// Set while a HALF_OPEN probe is in flight; gates `admit()` so a burst
    /// of concurrent callers can't all reach the dependency at once.
    half_open_probe_in_flight: bool,
}

/// A circuit breaker guarding one outbound dependency (e.g. "broker-rest").
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                half_open_probe_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().unwrap().failure_count
    }

    /// Check whether a call may proceed right now, transitioning OPEN ->
    /// HALF_OPEN if the recovery timeout has elapsed. Does not itself run
    /// the call — see [`CircuitBreaker::call`] for the wrapped version.
    ///
    /// HALF_OPEN admits exactly one probe: the caller that flips the flag
    /// below wins it, and every other concurrent caller is rejected until
    /// `on_success`/`on_failure` clears it.
    fn admit(&self) -> Result<(), CircuitOpen> {
        let mut g = self.inner.lock().unwrap();
        match g.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                if g.half_open_probe_in_flight {
                    Err(CircuitOpen {
                        name: self.name.clone(),
                        remaining_ms: 0,
                    })
                } else {
                    g.half_open_probe_in_flight = true;
                    Ok(())
                }
            }
            CircuitState::Open => {
                let elapsed = g
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.recovery_timeout {
                    g.state = CircuitState::HalfOpen;
                    g.half_open_probe_in_flight = true;
                    tracing::info!(circuit = %self.name, "OPEN -> HALF_OPEN");
                    Ok(())
                } else {
                    let remaining = self.recovery_timeout - elapsed;
                    Err(CircuitOpen {
                        name: self.name.clone(),
                        remaining_ms: remaining.as_millis() as u64,
                    })
                }
            }
        }
    }

    fn on_success(&self) {
        let mut g = self.inner.lock().unwrap();
        if g.state == CircuitState::HalfOpen {
            tracing::info!(circuit = %self.name, "HALF_OPEN -> CLOSED");
        }
        g.state = CircuitState::Closed;
        g.failure_count = 0;
        g.half_open_probe_in_flight = false;
    }

    fn on_failure(&self) {
        let mut g = self.inner.lock().unwrap();
        g.failure_count += 1;
        g.last_failure_time = Some(Instant::now());
        g.half_open_probe_in_flight = false;
        if g.failure_count >= self.failure_threshold {
            g.state = CircuitState::Open;
            tracing::error!(
                circuit = %self.name,
                failure_count = g.failure_count,
                "-> OPEN"
            );
        }
    }

    /// Run `f` through the breaker. `E` is the caller's error type; any
    /// `Err` counts as a failure for breaker-tripping purposes.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.admit().map_err(BreakerError::Open)?;
        match f().await {
            Ok(v) => {
                self.on_success();
                Ok(v)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error(transparent)]
    Open(#[from] CircuitOpen),
    #[error(transparent)]
    Inner(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stays_closed_below_threshold() {
        let cb = CircuitBreaker::new("test", 3, Duration::from_millis(30));
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 2);
    }

    #[tokio::test]
    async fn trips_open_at_threshold() {
        let cb = CircuitBreaker::new("test", 3, Duration::from_millis(30));
        for _ in 0..3 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let err = cb.call(|| async { Ok::<_, &str>(()) }).await.unwrap_err();
        assert!(matches!(err, BreakerError::Open(_)));
    }

    #[tokio::test]
    async fn recovers_through_half_open_on_success() {
        let cb = CircuitBreaker::new("test", 3, Duration::from_millis(30));
        for _ in 0..3 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(35)).await;

        let calls = AtomicU32::new(0);
        let ok = cb
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;
        assert!(ok.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new("test", 1, Duration::from_millis(10));
        let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = cb.call(|| async { Err::<(), _>("boom again") }).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn half_open_admits_only_one_probe_at_a_time() {
        let cb = CircuitBreaker::new("test", 1, Duration::from_millis(5));
        let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(10)).await;

        // The first caller claims the single HALF_OPEN probe slot...
        assert!(cb.admit().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // ...and every concurrent caller behind it is rejected, not admitted
        // alongside it.
        assert!(cb.admit().is_err());
        assert!(cb.admit().is_err());

        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        // The slot is released once the probe resolves.
        assert!(cb.admit().is_ok());
    }
}
