//! Layered YAML configuration loading, canonical-JSON hashing, secret-leak
//! scanning, and mode-aware secret resolution.
//!
//! Config files never carry secret values -- only the NAMES of the
//! environment variables that hold them. [`secrets`] is the
//! single place that turns those names into resolved values; everything
//! else in the workspace receives a [`secrets::ResolvedSecrets`] at startup
//! rather than calling `std::env::var` itself. [`consumption`] tracks which
//! config keys each run mode actually reads, so a stale or misspelled key
//! in a YAML layer is caught instead of silently ignored.

pub mod consumption;
pub mod secrets;
pub mod snapshot;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Load + merge YAML files in order, then canonicalize to JSON and hash.
/// Later files override earlier files via deep-merge.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut sources = Vec::with_capacity(paths.len());
    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        sources.push(parse_yaml(&s, p)?);
    }
    build(sources)
}

/// Same as [`load_layered_yaml`] but takes YAML already in memory -- used by
/// tests and by callers that assemble config from something other than the
/// filesystem (e.g. a secrets manager payload).
pub fn load_layered_yaml_from_strings(yamls: &[&str]) -> Result<LoadedConfig> {
    let mut sources = Vec::with_capacity(yamls.len());
    for (i, s) in yamls.iter().enumerate() {
        sources.push(parse_yaml(s, &format!("<layer {i}>"))?);
    }
    build(sources)
}

fn parse_yaml(s: &str, label: &str) -> Result<Value> {
    let yaml_val: serde_yaml::Value =
        serde_yaml::from_str(s).with_context(|| format!("parse yaml: {label}"))?;
    serde_json::to_value(yaml_val).context("yaml->json conversion failed")
}

fn build(sources: Vec<Value>) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());
    for src in sources {
        deep_merge(&mut merged, src);
    }

    scan_for_secrets(&merged, "")?;

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config_json: serde_json::from_str(&canonical).context("canonical json parse failed")?,
        canonical_json: canonical,
        config_hash: hash,
    })
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonicalize JSON by sorting all object keys recursively and emitting
/// compact JSON, so the hash only changes when the config's meaning changes.
fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// A safety net against committing live secrets to a config file by
/// accident: config is only ever supposed to carry env var NAMES, never
/// resolved values. Rejects strings that look like a credential or key
/// material rather than a name.
fn scan_for_secrets(v: &Value, pointer: &str) -> Result<()> {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                scan_for_secrets(child, &format!("{pointer}/{k}"))?;
            }
        }
        Value::Array(arr) => {
            for (i, child) in arr.iter().enumerate() {
                scan_for_secrets(child, &format!("{pointer}/{i}"))?;
            }
        }
        Value::String(s) => {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED at {pointer}: value looks like a resolved secret, not an env var name");
            }
        }
        _ => {}
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    s.starts_with("sk-")
        || s.starts_with("AKIA")
        || s.contains("-----BEGIN")
        || s.starts_with("ghp_")
        || s.starts_with("xox")
}

/// Recursively collect every leaf JSON pointer under `v`, sorted.
pub(crate) fn leaf_pointers(v: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaf_pointers(v, String::new(), &mut out);
    out.sort();
    out
}

fn collect_leaf_pointers(v: &Value, prefix: String, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                collect_leaf_pointers(child, format!("{prefix}/{k}"), out);
            }
        }
        Value::Array(arr) => {
            for (i, child) in arr.iter().enumerate() {
                collect_leaf_pointers(child, format!("{prefix}/{i}"), out);
            }
        }
        _ => out.push(prefix),
    }
}
