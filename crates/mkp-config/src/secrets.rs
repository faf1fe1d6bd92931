//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"MKP_PROCUREMENT_TOKEN"`).
//! - Binaries call [`resolve_secrets`] once at startup and pass the result
//!   into constructors; no other module reads secret env vars.
//! - `Debug` redacts values. Errors name the variable, never the value.
//!
//! # Mode-aware enforcement
//! | Mode          | Required                                             |
//! |---------------|------------------------------------------------------|
//! | `Reconcile`   | procurement API token                                |
//! | `UsageReport` | service-control token                                |
//! | `Inspect`     | nothing beyond the database URL                      |
//! | any           | database URL when `/store/kind` is `postgres`        |

use anyhow::{bail, Result};
use serde_json::Value;

use crate::settings::{read_str_at, StoreKind};
use crate::ConfigMode;

pub const DEFAULT_PROCUREMENT_TOKEN_ENV: &str = "MKP_PROCUREMENT_TOKEN";
pub const DEFAULT_SERVICE_CONTROL_TOKEN_ENV: &str = "MKP_SERVICE_CONTROL_TOKEN";
pub const DEFAULT_DATABASE_URL_ENV: &str = "MKP_DATABASE_URL";

/// Secrets resolved from the environment for one process.
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Bearer token for the Partner Procurement API.
    pub procurement_token: Option<String>,
    /// Bearer token for the service-control (usage reporting) API.
    pub service_control_token: Option<String>,
    /// Postgres connection URL (only when the postgres store is selected).
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "procurement_token",
                &self.procurement_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "service_control_token",
                &self.service_control_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

struct SecretEnvNames {
    procurement_token_var: String,
    service_control_token_var: String,
    database_url_var: String,
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        procurement_token_var: read_str_at(config_json, "/procurement/token_env")
            .unwrap_or_else(|| DEFAULT_PROCUREMENT_TOKEN_ENV.to_string()),
        service_control_token_var: read_str_at(config_json, "/usage/token_env")
            .unwrap_or_else(|| DEFAULT_SERVICE_CONTROL_TOKEN_ENV.to_string()),
        database_url_var: read_str_at(config_json, "/store/database_url_env")
            .unwrap_or_else(|| DEFAULT_DATABASE_URL_ENV.to_string()),
    }
}

/// Unset and blank both count as missing.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve all secrets for `mode`.
///
/// # Errors
/// Names the first missing required env var.
pub fn resolve_secrets(config_json: &Value, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let names = parse_env_names(config_json);

    let procurement_token = resolve_env(&names.procurement_token_var);
    let service_control_token = resolve_env(&names.service_control_token_var);
    let database_url = resolve_env(&names.database_url_var);

    match mode {
        ConfigMode::Reconcile => {
            if procurement_token.is_none() {
                bail!(
                    "SECRETS_MISSING mode={}: required env var '{}' \
                     (procurement API token) is not set or empty",
                    mode.as_str(),
                    names.procurement_token_var,
                );
            }
        }
        ConfigMode::UsageReport => {
            if service_control_token.is_none() {
                bail!(
                    "SECRETS_MISSING mode={}: required env var '{}' \
                     (service-control token) is not set or empty",
                    mode.as_str(),
                    names.service_control_token_var,
                );
            }
        }
        ConfigMode::Inspect => {}
    }

    if StoreKind::from_config_json(config_json)? == StoreKind::Postgres && database_url.is_none()
    {
        bail!(
            "SECRETS_MISSING mode={}: store.kind=postgres requires env var '{}' \
             (database URL) to be set",
            mode.as_str(),
            names.database_url_var,
        );
    }

    Ok(ResolvedSecrets {
        procurement_token,
        service_control_token,
        database_url,
    })
}
