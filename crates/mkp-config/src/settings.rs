//! Typed view over the merged config tree.
//!
//! Every pointer read here must also appear in
//! [`crate::consumed_pointers_for_mode`].

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

pub const DEFAULT_PROCUREMENT_BASE_URL: &str = "https://cloudcommerceprocurement.googleapis.com";
pub const DEFAULT_SERVICE_CONTROL_BASE_URL: &str = "https://servicecontrol.googleapis.com";
pub const DEFAULT_STORE_PATH: &str = "customers.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_UNITS_PER_REPORT: i64 = 10;

/// Record store backend selected by `/store/kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    JsonFile,
    Postgres,
}

impl StoreKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "json_file" | "json" | "file" => Ok(StoreKind::JsonFile),
            "postgres" | "pg" => Ok(StoreKind::Postgres),
            other => Err(anyhow!(
                "invalid store.kind '{}'. expected one of: memory | json_file | postgres",
                other
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::JsonFile => "json_file",
            StoreKind::Postgres => "postgres",
        }
    }

    /// `/store/kind`, defaulting to `json_file`.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        match read_str_at(config_json, "/store/kind") {
            Some(s) => StoreKind::parse(&s),
            None => Ok(StoreKind::JsonFile),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcurementSettings {
    /// Provider id as registered with the marketplace, e.g. `DEMO-my-project`.
    pub provider_id: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// `approve_on_pending` | `await_external_signup`
    pub signup_policy: String,
    /// `defer` | `remove_product`
    pub cancellation_policy: String,
}

/// Which service-control surface the usage job reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageEnvironment {
    Prod,
    /// Reports to `staging.<service_name>`; metric names keep the bare name.
    Staging,
}

impl UsageEnvironment {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" => Ok(UsageEnvironment::Prod),
            "staging" => Ok(UsageEnvironment::Staging),
            other => Err(anyhow!(
                "invalid usage.environment '{}'. expected one of: prod | staging",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UsageSettings {
    pub service_name: Option<String>,
    pub environment: UsageEnvironment,
    pub service_control_base_url: String,
    pub units_per_report: i64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub procurement: ProcurementSettings,
    pub store: StoreSettings,
    pub reconcile: ReconcileSettings,
    pub bind_addr: SocketAddr,
    pub usage: UsageSettings,
}

impl Settings {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let bind_raw = read_str_at(config_json, "/daemon/bind_addr")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .with_context(|| format!("invalid daemon.bind_addr '{bind_raw}'"))?;

        let units_per_report = match config_json.pointer("/usage/units_per_report") {
            None | Some(Value::Null) => DEFAULT_UNITS_PER_REPORT,
            Some(v) => v
                .as_i64()
                .ok_or_else(|| anyhow!("usage.units_per_report must be an integer"))?,
        };
        if units_per_report < 0 {
            bail!("usage.units_per_report must be >= 0, got {units_per_report}");
        }

        Ok(Settings {
            procurement: ProcurementSettings {
                provider_id: read_str_at(config_json, "/procurement/provider_id"),
                base_url: read_str_at(config_json, "/procurement/base_url")
                    .unwrap_or_else(|| DEFAULT_PROCUREMENT_BASE_URL.to_string()),
            },
            store: StoreSettings {
                kind: StoreKind::from_config_json(config_json)?,
                path: read_str_at(config_json, "/store/path")
                    .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string())
                    .into(),
            },
            reconcile: ReconcileSettings {
                signup_policy: read_str_at(config_json, "/reconcile/signup_policy")
                    .unwrap_or_else(|| "approve_on_pending".to_string()),
                cancellation_policy: read_str_at(config_json, "/reconcile/cancellation_policy")
                    .unwrap_or_else(|| "defer".to_string()),
            },
            bind_addr,
            usage: UsageSettings {
                service_name: read_str_at(config_json, "/usage/service_name"),
                environment: match read_str_at(config_json, "/usage/environment") {
                    Some(s) => UsageEnvironment::parse(&s)?,
                    None => UsageEnvironment::Prod,
                },
                service_control_base_url: read_str_at(
                    config_json,
                    "/usage/service_control_base_url",
                )
                .unwrap_or_else(|| DEFAULT_SERVICE_CONTROL_BASE_URL.to_string()),
                units_per_report,
            },
        })
    }
}

/// Non-empty trimmed string at `pointer`, or `None`.
pub(crate) fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
