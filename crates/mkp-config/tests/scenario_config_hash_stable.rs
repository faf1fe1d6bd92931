//! Config hash stability.
//!
//! GREEN when:
//! - Identical layer stacks hash identically.
//! - Reordering keys within a YAML layer does not change the hash.
//! - Different values produce different hashes.
//! - An overlay layer overrides the base and the result hashes stably.

use mkp_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
procurement:
  provider_id: "DEMO-my-project"
  token_env: "MKP_PROCUREMENT_TOKEN"
store:
  kind: "json_file"
  path: "/var/lib/mkp/customers.json"
reconcile:
  signup_policy: "approve_on_pending"
  cancellation_policy: "defer"
"#;

const BASE_YAML_REORDERED: &str = r#"
reconcile:
  cancellation_policy: "defer"
  signup_policy: "approve_on_pending"
store:
  path: "/var/lib/mkp/customers.json"
  kind: "json_file"
procurement:
  token_env: "MKP_PROCUREMENT_TOKEN"
  provider_id: "DEMO-my-project"
"#;

const OVERLAY_YAML: &str = r#"
reconcile:
  signup_policy: "await_external_signup"
store:
  kind: "postgres"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base_and_hash_is_stable() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    assert_eq!(
        a.config_json.pointer("/reconcile/signup_policy").unwrap(),
        "await_external_signup"
    );
    assert_eq!(a.config_json.pointer("/store/kind").unwrap(), "postgres");
    // Untouched base keys survive the merge.
    assert_eq!(
        a.config_json.pointer("/store/path").unwrap(),
        "/var/lib/mkp/customers.json"
    );
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
