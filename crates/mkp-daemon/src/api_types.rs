//! Request and response types for all mkp-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use std::collections::BTreeMap;

use mkp_schemas::Customer;
use serde::{Deserialize, Serialize};

use crate::state::CounterSnapshot;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub store_kind: String,
    pub config_hash: Option<String>,
    pub signup_policy: String,
    pub cancellation_policy: String,
    pub counters: CounterSnapshot,
}

// ---------------------------------------------------------------------------
// /v1/pubsub/push
// ---------------------------------------------------------------------------

/// Push-subscription envelope as delivered by the broker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(default)]
    pub message: Option<PushMessage>,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushMessage {
    /// Base64 (standard alphabet) message body.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, rename = "messageId", alias = "message_id")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// 503 body: the message stays unacknowledged and will be redelivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredResponse {
    pub disposition: String,
    pub reason: String,
    pub event_id: Option<String>,
}

/// Body for 4xx/5xx failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// "decode" | "store" | "procurement"
    pub kind: String,
    pub error: String,
}

// ---------------------------------------------------------------------------
// /v1/customers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomersResponse {
    pub customers: Vec<Customer>,
}
