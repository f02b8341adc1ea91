//! Postgres-backed raw tick storage, and the [`TickRepoPort`] adapter the
//! pipeline's technical/risk nodes query through.
//!
//! `get_ohlcv` and `calculate_var_historical` read from the canonical
//! `md_bars` table rather than the raw `ticks` stream, since technical and
//! risk analysis reason over daily bars, not tick-by-tick prints.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use vnq_pipeline::{OhlcvBar, TickRepoPort};
use vnq_schemas::{Exchange, Price, Symbol, Tick};

pub struct PgTickRepo {
    pool: PgPool,
}

impl PgTickRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn exchange_to_str(e: Exchange) -> &'static str {
    match e {
        Exchange::Hose => "HOSE",
        Exchange::Hnx => "HNX",
        Exchange::Upcom => "UPCOM",
    }
}

fn exchange_from_str(s: &str) -> Result<Exchange> {
    match s {
        "HOSE" => Ok(Exchange::Hose),
        "HNX" => Ok(Exchange::Hnx),
        "UPCOM" => Ok(Exchange::Upcom),
        other => Err(anyhow::anyhow!("invalid exchange in db row: {other}")),
    }
}

/// Append a raw tick to the `ticks` stream. There is no dedup here -- the
/// wire feed is expected to be append-only; `vnq-md`'s ring buffer handles
/// in-memory coalescing ahead of persistence.
pub async fn insert_tick(pool: &PgPool, tick: &Tick) -> Result<()> {
    sqlx::query(
        r#"
        insert into ticks (symbol, exchange, price, volume, ts_utc)
        values ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(tick.symbol.as_str())
    .bind(exchange_to_str(tick.exchange))
    .bind(tick.price.to_wire_string())
    .bind(tick.volume)
    .bind(tick.timestamp)
    .execute(pool)
    .await
    .context("insert_tick failed")?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct FetchTicksArgs {
    pub symbol: Symbol,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: i64,
}

/// Fetch raw ticks for a symbol, oldest first, bounded by an optional
/// `[start, end]` window and a row limit.
pub async fn fetch_ticks(pool: &PgPool, args: FetchTicksArgs) -> Result<Vec<Tick>> {
    let rows = sqlx::query(
        r#"
        select symbol, exchange, price, volume, ts_utc
        from ticks
        where symbol = $1
          and ($2::timestamptz is null or ts_utc >= $2)
          and ($3::timestamptz is null or ts_utc <= $3)
        order by ts_utc asc
        limit $4
        "#,
    )
    .bind(args.symbol.as_str())
    .bind(args.start)
    .bind(args.end)
    .bind(args.limit)
    .fetch_all(pool)
    .await
    .context("fetch_ticks failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let symbol: String = row.try_get("symbol")?;
        let exchange: String = row.try_get("exchange")?;
        let price: String = row.try_get("price")?;
        let volume: i64 = row.try_get("volume")?;
        let ts_utc: DateTime<Utc> = row.try_get("ts_utc")?;

        let tick = Tick::new(
            Symbol::new(symbol),
            Price::parse(&price)?,
            volume,
            exchange_from_str(&exchange)?,
            ts_utc,
        )
        .map_err(|e| anyhow::anyhow!("stored tick failed reconstruction: {e}"))?;
        out.push(tick);
    }
    Ok(out)
}

#[async_trait]
impl TickRepoPort for PgTickRepo {
    async fn get_ohlcv(&self, symbol: &Symbol, days: u32) -> Result<Vec<OhlcvBar>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            select close_micros
            from md_bars
            where symbol = $1 and timeframe = '1D' and is_complete = true
            order by end_ts desc
            limit $2
            "#,
        )
        .bind(symbol.as_str())
        .bind(days as i64)
        .fetch_all(&self.pool)
        .await
        .context("get_ohlcv failed")?;

        // Return oldest-first: callers (moving averages, VaR windows) expect
        // chronological order.
        Ok(rows
            .into_iter()
            .rev()
            .map(|(close_micros,)| OhlcvBar {
                close: close_micros as f64 / 1_000_000.0,
            })
            .collect())
    }

    async fn query_volume_spikes(&self, threshold_multiplier: f64) -> Result<HashSet<Symbol>> {
        // For each symbol, compare its most recent 1D bar's volume against
        // the trailing 20-bar average (excluding the latest bar itself).
        let rows: Vec<(String, i64, Option<f64>)> = sqlx::query_as(
            r#"
            with ranked as (
                select
                    symbol,
                    volume,
                    row_number() over (partition by symbol order by end_ts desc) as rn
                from md_bars
                where timeframe = '1D'
            )
            select
                latest.symbol,
                latest.volume,
                avg(trailing.volume) as avg_volume
            from ranked latest
            left join ranked trailing
                on trailing.symbol = latest.symbol
               and trailing.rn between 2 and 21
            where latest.rn = 1
            group by latest.symbol, latest.volume
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("query_volume_spikes failed")?;

        let mut out = HashSet::new();
        for (symbol, latest_volume, avg_volume) in rows {
            let Some(avg_volume) = avg_volume else { continue };
            if avg_volume <= 0.0 {
                continue;
            }
            if (latest_volume as f64) > avg_volume * threshold_multiplier {
                out.insert(Symbol::new(symbol));
            }
        }
        Ok(out)
    }

    async fn get_latest_price(&self, symbol: &Symbol) -> Result<Decimal> {
        let row: Option<(String,)> = sqlx::query_as(
            "select price from ticks where symbol = $1 order by ts_utc desc limit 1",
        )
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("get_latest_price tick lookup failed")?;

        if let Some((price,)) = row {
            return Ok(Price::parse(&price)?.raw());
        }

        // No raw tick yet (e.g. backtest replay): fall back to the latest
        // complete daily bar's close.
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            select close_micros
            from md_bars
            where symbol = $1 and timeframe = '1D' and is_complete = true
            order by end_ts desc
            limit 1
            "#,
        )
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("get_latest_price bar fallback failed")?;

        let (close_micros,) = row.ok_or_else(|| anyhow::anyhow!("no price data for symbol {symbol}"))?;
        Ok(Decimal::new(close_micros, 6))
    }

    async fn calculate_var_historical(&self, symbol: &Symbol, confidence: f64, window_days: u32) -> Result<Decimal> {
        if !(0.0..1.0).contains(&confidence) {
            return Err(anyhow::anyhow!("confidence must be in (0,1), got {confidence}"));
        }

        let closes = self.get_ohlcv(symbol, window_days + 1).await?;
        if closes.len() < 2 {
            return Ok(Decimal::ZERO);
        }

        let mut returns: Vec<f64> = closes
            .windows(2)
            .map(|w| (w[1].close - w[0].close) / w[0].close)
            .collect();
        returns.sort_by(|a, b| a.partial_cmp(b).unwrap());

        // Historical VaR: the loss at the (1 - confidence) percentile of
        // the empirical return distribution, expressed as a positive
        // fraction of position value.
        let tail = 1.0 - confidence;
        let idx = ((returns.len() as f64) * tail).floor() as usize;
        let idx = idx.min(returns.len() - 1);
        let worst_return = returns[idx];

        let var = (-worst_return).max(0.0);
        Decimal::try_from(var).context("VaR result not representable as Decimal")
    }
}
