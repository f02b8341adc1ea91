//! Hive-partitioned parquet export of the raw tick stream.
//!
//! Partitions by `(year, month, day)` directories the way most Hive-style
//! data lakes expect, so downstream readers can prune by path instead of
//! scanning the whole table. Partition pruning itself is left to the
//! client reading these files; this module only produces the layout.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use polars::prelude::*;
use sqlx::PgPool;

use vnq_schemas::{Exchange, Price, Symbol};

/// Target row-group size. Roughly 100k rows keeps individual parquet files
/// queryable without per-row-group overhead dominating small partitions.
const ROW_GROUP_SIZE: usize = 100_000;

struct PartitionKey {
    year: i32,
    month: u32,
    day: u32,
}

impl PartitionKey {
    fn dir_name(&self) -> String {
        format!("year={:04}/month={:02}/day={:02}", self.year, self.month, self.day)
    }
}

fn exchange_to_str(e: Exchange) -> &'static str {
    match e {
        Exchange::Hose => "HOSE",
        Exchange::Hnx => "HNX",
        Exchange::Upcom => "UPCOM",
    }
}

/// Export all ticks for `symbol` into `out_dir`, one parquet file per
/// `(year, month, day)` partition, zstd-compressed.
///
/// Returns the list of partition directories written.
pub async fn export_ticks_to_parquet(pool: &PgPool, symbol: &Symbol, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let rows: Vec<(String, String, i64, chrono::DateTime<Utc>)> = sqlx::query_as(
        r#"
        select exchange, price, volume, ts_utc
        from ticks
        where symbol = $1
        order by ts_utc asc
        "#,
    )
    .bind(symbol.as_str())
    .fetch_all(pool)
    .await
    .context("export_ticks_to_parquet: fetch failed")?;

    let mut by_partition: BTreeMap<(i32, u32, u32), Vec<(String, String, i64, chrono::DateTime<Utc>)>> =
        BTreeMap::new();

    for row in rows {
        let ts = row.3;
        let key = (ts.year(), ts.month(), ts.day());
        by_partition.entry(key).or_default().push(row);
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create export root {}", out_dir.display()))?;

    let mut written = Vec::new();
    for ((year, month, day), partition_rows) in by_partition {
        let key = PartitionKey { year, month, day };
        let partition_dir = out_dir.join(key.dir_name());
        fs::create_dir_all(&partition_dir)
            .with_context(|| format!("failed to create partition dir {}", partition_dir.display()))?;

        let mut df = rows_to_dataframe(symbol, &partition_rows)?;
        let file_path = partition_dir.join("ticks.parquet");
        let file = std::fs::File::create(&file_path)
            .with_context(|| format!("failed to create {}", file_path.display()))?;

        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .with_row_group_size(Some(ROW_GROUP_SIZE))
            .finish(&mut df)
            .with_context(|| format!("failed to write parquet to {}", file_path.display()))?;

        written.push(partition_dir);
    }

    Ok(written)
}

fn rows_to_dataframe(
    symbol: &Symbol,
    rows: &[(String, String, i64, chrono::DateTime<Utc>)],
) -> Result<DataFrame> {
    let n = rows.len();
    let mut symbols = Vec::with_capacity(n);
    let mut exchanges = Vec::with_capacity(n);
    let mut prices = Vec::with_capacity(n);
    let mut volumes = Vec::with_capacity(n);
    let mut ts_millis = Vec::with_capacity(n);

    for (exchange, price, volume, ts) in rows {
        let parsed = Price::parse(price).context("stored tick price failed to parse")?;
        symbols.push(symbol.as_str().to_string());
        exchanges.push(exchange_to_str_from_wire(exchange)?.to_string());
        prices.push(parsed.raw().to_string());
        volumes.push(*volume);
        ts_millis.push(ts.timestamp_millis());
    }

    let df = df! {
        "symbol" => symbols,
        "exchange" => exchanges,
        "price" => prices,
        "volume" => volumes,
        "ts_millis" => ts_millis,
    }?;

    Ok(df)
}

fn exchange_to_str_from_wire(s: &str) -> Result<&'static str> {
    match s {
        "HOSE" => Ok(exchange_to_str(Exchange::Hose)),
        "HNX" => Ok(exchange_to_str(Exchange::Hnx)),
        "UPCOM" => Ok(exchange_to_str(Exchange::Upcom)),
        other => Err(anyhow::anyhow!("invalid exchange in db row: {other}")),
    }
}
