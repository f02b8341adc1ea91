//! Regulatory price-band and tick-size enforcement.
//!
//! Ported from `original_source/packages/core/src/core/use_cases/price_band.py`:
//! the ceiling/floor percentages and HOSE's price-tiered tick sizes are set
//! by law, not configurable, and are hardcoded here for that reason. Ceiling
//! snaps DOWN to the tick grid (conservative for buyers), floor snaps UP
//! (conservative for sellers) — this snapping is mandatory and must be
//! directly observable by callers, so `PriceBand` exposes the already
//! snapped values, never the raw percentage math.

use rust_decimal::Decimal;

use vnq_schemas::{Exchange, Price, Symbol};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBand {
    pub symbol: Symbol,
    pub exchange: Exchange,
    pub reference_price: Price,
    pub ceiling: Price,
    pub floor: Price,
    pub tick_size: Decimal,
}

/// HOSE's price-tiered tick size. HNX/UPCOM use a flat 100 VND regardless
/// of price level.
fn tick_size_for(exchange: Exchange, reference_price: Decimal) -> Decimal {
    match exchange {
        Exchange::Hnx | Exchange::Upcom => Decimal::from(100),
        Exchange::Hose => {
            if reference_price < Decimal::from(10_000) {
                Decimal::from(10)
            } else if reference_price < Decimal::from(50_000) {
                Decimal::from(50)
            } else {
                Decimal::from(100)
            }
        }
    }
}

fn snap_down(value: Decimal, tick: Decimal) -> Decimal {
    (value / tick).trunc() * tick
}

fn snap_up(value: Decimal, tick: Decimal) -> Decimal {
    let floor_div = (value / tick).trunc();
    if floor_div * tick == value {
        value
    } else {
        (floor_div + Decimal::ONE) * tick
    }
}

/// Compute the ceiling/floor/tick-size band for `reference_price` on
/// `exchange`. Raw ceiling/floor are `ref * (1 +/- band_pct)`, then snapped
/// to the tick grid.
pub fn calculate_price_band(symbol: Symbol, exchange: Exchange, reference_price: Price) -> PriceBand {
    let ref_dec = reference_price.raw();
    let band_pct = exchange.band_pct();

    let raw_ceiling = ref_dec * (Decimal::ONE + band_pct);
    let raw_floor = ref_dec * (Decimal::ONE - band_pct);

    let tick = tick_size_for(exchange, ref_dec);
    let ceiling = snap_down(raw_ceiling, tick);
    let floor = snap_up(raw_floor, tick);

    PriceBand {
        symbol,
        exchange,
        reference_price,
        ceiling: Price::new(ceiling),
        floor: Price::new(floor),
        tick_size: tick,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceBandViolation {
    ExceedsCeiling { price: Price, ceiling: Price },
    BelowFloor { price: Price, floor: Price },
    TickMisaligned { price: Price, tick_size: Decimal, nearest_valid: Price },
}

impl PriceBandViolation {
    /// Human-readable reason, stable on the substrings callers match on
    /// ("exceeds ceiling", "below floor").
    pub fn reason(&self) -> String {
        match self {
            PriceBandViolation::ExceedsCeiling { price, ceiling } => {
                format!("price {price} exceeds ceiling {ceiling}")
            }
            PriceBandViolation::BelowFloor { price, floor } => {
                format!("price {price} below floor {floor}")
            }
            PriceBandViolation::TickMisaligned {
                price,
                tick_size,
                nearest_valid,
            } => format!(
                "price {price} not aligned to tick size {tick_size}; nearest valid = {nearest_valid}"
            ),
        }
    }
}

/// Validate an order price against its band. Runs ceiling, then floor,
/// then tick-alignment, stopping at the first violation found -- a strict
/// "1. then 2. then 3." check order, unlike the aggregate risk-gate checks
/// which all run independently.
pub fn validate_order_price(price: Price, band: &PriceBand) -> Result<(), PriceBandViolation> {
    if price.raw() > band.ceiling.raw() {
        return Err(PriceBandViolation::ExceedsCeiling {
            price,
            ceiling: band.ceiling,
        });
    }
    if price.raw() < band.floor.raw() {
        return Err(PriceBandViolation::BelowFloor {
            price,
            floor: band.floor,
        });
    }
    let remainder = price.raw() % band.tick_size;
    if !remainder.is_zero() {
        return Err(PriceBandViolation::TickMisaligned {
            price,
            tick_size: band.tick_size,
            nearest_valid: Price::new(snap_down(price.raw(), band.tick_size)),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym() -> Symbol {
        Symbol::new("FPT")
    }

    #[test]
    fn hose_band_at_100k_reference() {
        let band = calculate_price_band(sym(), Exchange::Hose, Price::from_i64(100_000));
        // raw ceiling 107_000, tick 100 at that level -> already aligned
        assert_eq!(band.ceiling, Price::from_i64(107_000));
        assert_eq!(band.floor, Price::from_i64(93_000));
        assert_eq!(band.tick_size, Decimal::from(100));
    }

    #[test]
    fn hose_band_low_price_uses_10_vnd_tick() {
        // ref 9000, band 7% -> raw ceiling 9630, tick size 10 (ref < 10_000)
        let band = calculate_price_band(sym(), Exchange::Hose, Price::from_i64(9_000));
        assert_eq!(band.tick_size, Decimal::from(10));
        assert_eq!(band.ceiling, Price::from_i64(9_630));
        assert_eq!(band.floor, Price::from_i64(8_370));
    }

    #[test]
    fn ceiling_and_floor_bracket_reference_and_are_tick_multiples() {
        let band = calculate_price_band(sym(), Exchange::Hose, Price::from_i64(37_450));
        assert!(band.floor.raw() <= Price::from_i64(37_450).raw());
        assert!(Price::from_i64(37_450).raw() <= band.ceiling.raw());
        assert!((band.ceiling.raw() % band.tick_size).is_zero());
        assert!((band.floor.raw() % band.tick_size).is_zero());
    }

    #[test]
    fn price_at_snapped_ceiling_is_accepted() {
        let band = calculate_price_band(sym(), Exchange::Hose, Price::from_i64(100_000));
        assert!(validate_order_price(band.ceiling, &band).is_ok());
    }

    #[test]
    fn price_one_tick_above_ceiling_is_rejected() {
        let band = calculate_price_band(sym(), Exchange::Hose, Price::from_i64(100_000));
        let over = Price::new(band.ceiling.raw() + band.tick_size);
        let err = validate_order_price(over, &band).unwrap_err();
        assert!(err.reason().contains("exceeds ceiling"));
    }

    #[test]
    fn scenario_hose_108000_rejected_over_ceiling() {
        // reference 100_000, submit BUY at 108_000: over the 7% ceiling.
        let band = calculate_price_band(sym(), Exchange::Hose, Price::from_i64(100_000));
        assert_eq!(band.ceiling, Price::from_i64(107_000));
        let err = validate_order_price(Price::from_i64(108_000), &band).unwrap_err();
        assert!(err.reason().contains("exceeds ceiling"));
    }

    #[test]
    fn below_floor_rejected() {
        let band = calculate_price_band(sym(), Exchange::Hose, Price::from_i64(100_000));
        let err = validate_order_price(Price::from_i64(90_000), &band).unwrap_err();
        assert!(err.reason().contains("below floor"));
    }

    #[test]
    fn tick_misaligned_price_rejected() {
        let band = calculate_price_band(sym(), Exchange::Hose, Price::from_i64(100_000));
        // within band but not a multiple of the 100 VND tick at this level
        let err = validate_order_price(Price::from_i64(100_050), &band).unwrap_err();
        assert!(matches!(err, PriceBandViolation::TickMisaligned { .. }));
    }

    #[test]
    fn hnx_and_upcom_use_flat_100_tick() {
        let hnx = calculate_price_band(sym(), Exchange::Hnx, Price::from_i64(5_000));
        assert_eq!(hnx.tick_size, Decimal::from(100));
        let upcom = calculate_price_band(sym(), Exchange::Upcom, Price::from_i64(5_000));
        assert_eq!(upcom.tick_size, Decimal::from(100));
    }
}
