//! Command handler modules for mkp-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod account;
pub mod customers;
pub mod db;
pub mod replay;
pub mod usage;

use anyhow::{Context, Result};
use mkp_config::{
    report_unused_keys, resolve_secrets, ConfigMode, LoadedConfig, ResolvedSecrets, Settings,
    UnusedKeyPolicy,
};
use std::fs;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Logs go to stderr so stdout stays `key=value` parseable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

/// Everything a command needs from its config layers.
pub struct Prepared {
    pub loaded: LoadedConfig,
    pub settings: Settings,
    pub secrets: ResolvedSecrets,
}

/// Load layered config for `mode`, warn about unused keys, resolve secrets.
pub fn prepare(config_paths: &[String], mode: ConfigMode) -> Result<Prepared> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = mkp_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(mode, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS mode={} unused_leaf_keys={}",
            mode.as_str(),
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
    }

    let secrets = resolve_secrets(&loaded.config_json, mode)?;
    let settings = Settings::from_config_json(&loaded.config_json)?;
    Ok(Prepared {
        loaded,
        settings,
        secrets,
    })
}

/// Load a message body from either an inline string or a file path.
///
/// The body is passed through verbatim (minus a UTF-8 BOM); decoding is the
/// reconciler's job.
pub fn load_payload(payload: Option<String>, payload_file: Option<String>) -> Result<Vec<u8>> {
    if let Some(p) = payload_file {
        let bytes = fs::read(&p).with_context(|| format!("read payload-file failed: {}", p))?;
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
        return Ok(bytes.to_vec());
    }

    let raw = payload.context("must provide --payload or --payload-file")?;
    Ok(raw.into_bytes())
}
