//! Tracks which config leaves each run mode actually reads, so a stale or
//! misspelled key introduced by a config edit is caught instead of silently
//! ignored -- the config-hash/audit story only holds if the hash covers
//! keys someone actually looked at.
//!
//! Consumption is tracked per exact leaf JSON pointer, not per section: a
//! sibling key under a consumed section (e.g. an extra field someone added
//! under `/risk`) is still reported as unused unless it is named here too.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::leaf_pointers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Backtest,
    Paper,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Default)]
pub struct UnusedKeysReport {
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeysReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

const ENGINE: &[&str] = &["/engine/mode", "/engine/engine_id"];

const BROKER: &[&str] = &[
    "/broker/base_url",
    "/broker/keys_env/consumer_id",
    "/broker/keys_env/consumer_secret",
    "/broker/keys_env/private_key_path",
    "/broker/keys_env/account_no",
];

const RISK: &[&str] = &[
    "/risk/max_position_pct",
    "/risk/max_daily_loss",
    "/risk/kill_switch_active",
    "/risk/stop_loss_pct",
    "/risk/take_profit_pct",
];

const EXECUTION: &[&str] = &["/execution/dry_run"];

const PIPELINE: &[&str] = &["/pipeline/max_candidates", "/pipeline/score_threshold"];

const DATA_STORE: &[&str] = &["/data/store/dsn_env"];

const DATA_PROVIDERS: &[&str] = &["/data/providers/market/api_key_env"];

const RATE_LIMITS: &[&str] = &["/rate_limits/default_tier", "/rate_limits/tiers"];

const CORS: &[&str] = &["/cors/origins"];

const RECONCILE: &[&str] = &["/reconcile/interval_seconds"];

const MD: &[&str] = &["/md/buffer_capacity", "/md/flush_interval_seconds"];

const TELEGRAM: &[&str] = &[
    "/telegram/bot_token_env",
    "/telegram/channels/paper",
    "/telegram/channels/live",
    "/telegram/channels/backtest",
    "/telegram/channels/alerts",
    "/telegram/channels/heartbeat",
];

pub fn consumed_pointers(mode: ConfigMode) -> Vec<&'static str> {
    let mut v: Vec<&'static str> = ENGINE.to_vec();
    v.extend_from_slice(DATA_STORE);
    v.extend_from_slice(RISK);
    v.extend_from_slice(TELEGRAM);
    match mode {
        ConfigMode::Backtest => {}
        ConfigMode::Paper => {
            v.extend_from_slice(BROKER);
            v.extend_from_slice(EXECUTION);
            v.extend_from_slice(PIPELINE);
        }
        ConfigMode::Live => {
            v.extend_from_slice(BROKER);
            v.extend_from_slice(EXECUTION);
            v.extend_from_slice(PIPELINE);
            v.extend_from_slice(DATA_PROVIDERS);
            v.extend_from_slice(RATE_LIMITS);
            v.extend_from_slice(CORS);
            v.extend_from_slice(RECONCILE);
            v.extend_from_slice(MD);
        }
    }
    v
}

/// Compare every leaf pointer in `config_json` against `mode`'s consumed
/// set. With [`UnusedKeyPolicy::Fail`], any unused leaf is an error; with
/// [`UnusedKeyPolicy::Warn`] the report is still built (for the caller to
/// log) but resolves `Ok`.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeysReport> {
    let consumed = consumed_pointers(mode);
    let unused: Vec<String> = leaf_pointers(config_json)
        .into_iter()
        .filter(|leaf| !consumed.iter().any(|c| *c == leaf))
        .collect();

    if policy == UnusedKeyPolicy::Fail && !unused.is_empty() {
        bail!("CONFIG_UNUSED_KEYS: {} key(s) not consumed by mode: {:?}", unused.len(), unused);
    }

    Ok(UnusedKeysReport { unused_leaf_pointers: unused })
}
