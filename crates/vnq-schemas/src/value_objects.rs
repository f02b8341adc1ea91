//! Branded value objects underpinning every financial entity.
//!
//! `Price` wraps [`rust_decimal::Decimal`] — float is forbidden anywhere on a
//! calculation path that touches money. `Quantity` wraps `i64` and is
//! validated lot-aligned (multiple of 100) at order placement, not at
//! construction, since intermediate
//! computations (e.g. sizing before rounding) legitimately produce
//! non-lot-aligned values.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// HOSE/HNX/UPCOM lot size — the minimum tradable quantity unit.
pub const LOT_SIZE: i64 = 100;

/// A ticker symbol, branded to prevent accidental mixing with other strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::new(s)
    }
}

/// A share quantity. Signed in position-delta contexts; order quantities
/// are always positive and lot-validated by the risk gate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    pub const fn new(raw: i64) -> Self {
        Quantity(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    /// `true` if this quantity is a whole multiple of the exchange lot size.
    pub fn is_lot_aligned(self) -> bool {
        self.0 % LOT_SIZE == 0
    }

    /// Round down to the nearest whole lot. Used by position sizing.
    pub fn round_down_to_lot(raw: i64) -> Quantity {
        Quantity((raw / LOT_SIZE) * LOT_SIZE)
    }
}

impl Add for Quantity {
    type Output = Quantity;
    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Quantity;
    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 - rhs.0)
    }
}

/// A monetary price, exact fixed-precision decimal. Wire format (broker
/// requests/responses, persistence) is always a decimal string — never a
/// float — so values round-trip exactly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    pub const fn new(value: Decimal) -> Self {
        Price(value)
    }

    pub fn from_i64(whole_vnd: i64) -> Self {
        Price(Decimal::from(whole_vnd))
    }

    pub fn raw(self) -> Decimal {
        self.0
    }

    /// Parse from the broker's decimal-string wire format.
    pub fn parse(s: &str) -> Result<Self, rust_decimal::Error> {
        s.parse::<Decimal>().map(Price)
    }

    /// Render as the broker's decimal-string wire format.
    pub fn to_wire_string(self) -> String {
        self.0.to_string()
    }

    /// Multiply by a share quantity to compute an order/position value.
    pub fn value_for(self, qty: Quantity) -> Decimal {
        self.0 * Decimal::from(qty.raw())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Price {
    type Output = Price;
    fn add(self, rhs: Price) -> Price {
        Price(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Price;
    fn sub(self, rhs: Price) -> Price {
        Price(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Price;
    fn mul(self, rhs: Decimal) -> Price {
        Price(self.0 * rhs)
    }
}

/// The three Vietnamese exchanges the core trades on. Each has its own
/// regulatory price band and tick-size rules (§4.3).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Hose,
    Hnx,
    Upcom,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Exchange::Hose => "HOSE",
            Exchange::Hnx => "HNX",
            Exchange::Upcom => "UPCOM",
        };
        write!(f, "{s}")
    }
}

impl Exchange {
    /// Regulatory price-band percentage for this exchange (§4.3).
    pub fn band_pct(self) -> Decimal {
        match self {
            Exchange::Hose => Decimal::new(7, 2),   // 0.07
            Exchange::Hnx => Decimal::new(10, 2),    // 0.10
            Exchange::Upcom => Decimal::new(15, 2),  // 0.15
        }
    }
}
