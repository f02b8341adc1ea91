//! Immutable market tick, self-validating against exchange price bands.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::value_objects::{Exchange, Price, Symbol};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TickValidationError {
    #[error("tick volume must be positive, got {0}")]
    NonPositiveVolume(i64),
    #[error("tick price must be positive, got {0}")]
    NonPositivePrice(String),
}

/// A single market tick. Created at ingestion, immutable forever after.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: Symbol,
    pub price: Price,
    pub volume: i64,
    pub exchange: Exchange,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    /// Construct a tick, rejecting structurally invalid values.
    ///
    /// This is a basic sanity check (positive price/volume), not the
    /// regulatory price-band check — that requires a reference price and
    /// lives in `vnq-risk::price_band`.
    pub fn new(
        symbol: Symbol,
        price: Price,
        volume: i64,
        exchange: Exchange,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, TickValidationError> {
        if volume <= 0 {
            return Err(TickValidationError::NonPositiveVolume(volume));
        }
        if price.raw().is_sign_negative() || price.raw().is_zero() {
            return Err(TickValidationError::NonPositivePrice(price.to_wire_string()));
        }
        Ok(Self {
            symbol,
            price,
            volume,
            exchange,
            timestamp,
        })
    }
}
