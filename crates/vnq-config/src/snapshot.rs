//! `ConfigSnapshot`: a record of exactly which config was in
//! effect for a run, logged once at startup so an incident review can tell
//! what the engine actually saw without needing the raw YAML on hand.

use chrono::{DateTime, Utc};

use crate::LoadedConfig;

#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub mode: String,
    pub config_hash: String,
    pub loaded_at: DateTime<Utc>,
}

impl ConfigSnapshot {
    pub fn new(loaded: &LoadedConfig, mode: impl Into<String>, loaded_at: DateTime<Utc>) -> Self {
        Self { mode: mode.into(), config_hash: loaded.config_hash.clone(), loaded_at }
    }

    /// Emit the snapshot as a single structured log line. Called once at
    /// startup, never per-request -- the hash is what an incident review
    /// keys off of, so it must appear exactly once and early.
    pub fn log(&self) {
        tracing::info!(
            mode = %self.mode,
            config_hash = %self.config_hash,
            loaded_at = %self.loaded_at,
            "config snapshot"
        );
    }
}
