//! Config hash stability: loading the same layered YAML twice, or with keys
//! reordered, must produce identical canonical JSON and hash; different
//! values must produce different hashes.

use vnq_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
engine:
  engine_id: "MAIN"
  mode: "PAPER"
risk:
  max_daily_loss: 5000000
  max_position_pct: 0.2
broker:
  keys_env:
    consumer_id: "SSI_CONSUMER_ID"
    consumer_secret: "SSI_CONSUMER_SECRET"
"#;

/// Same content as BASE_YAML but with keys in different order.
const BASE_YAML_REORDERED: &str = r#"
risk:
  max_position_pct: 0.2
  max_daily_loss: 5000000
broker:
  keys_env:
    consumer_secret: "SSI_CONSUMER_SECRET"
    consumer_id: "SSI_CONSUMER_ID"
engine:
  mode: "PAPER"
  engine_id: "MAIN"
"#;

const OVERLAY_YAML: &str = r#"
engine:
  mode: "LIVE"
risk:
  max_daily_loss: 3000000
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash, "same YAML input must produce identical hash");
    assert_eq!(a.canonical_json, b.canonical_json, "canonical JSON must be identical for same input");
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(original.config_hash, reordered.config_hash, "reordering keys must not change the hash");
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let modified = r#"
engine:
  engine_id: "EXP"
  mode: "PAPER"
risk:
  max_daily_loss: 9000000
  max_position_pct: 0.3
broker:
  keys_env:
    consumer_id: "SSI_CONSUMER_ID_EXP"
    consumer_secret: "SSI_CONSUMER_SECRET_EXP"
"#;
    let b = load_layered_yaml_from_strings(&[modified]).unwrap();

    assert_ne!(a.config_hash, b.config_hash, "different config values must produce different hashes");
}

#[test]
fn merged_layers_produce_stable_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash, "same merge layers must produce identical hash");

    let mode = a.config_json.pointer("/engine/mode").and_then(|v| v.as_str()).unwrap();
    assert_eq!(mode, "LIVE", "overlay should override base engine.mode");

    let loss = a.config_json.pointer("/risk/max_daily_loss").and_then(|v| v.as_f64()).unwrap();
    assert!((loss - 3_000_000.0).abs() < 1e-9, "overlay should override base max_daily_loss");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64, "SHA-256 hash should be 64 hex chars");
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn empty_config_produces_stable_hash() {
    let a = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let b = load_layered_yaml_from_strings(&["{}"]).unwrap();
    assert_eq!(a.config_hash, b.config_hash, "empty configs must produce identical hash");
}
