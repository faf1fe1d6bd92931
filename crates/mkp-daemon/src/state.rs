//! Shared runtime state for mkp-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mkp_reconcile::{ReconcileError, ReconcileOutcome, Reconciler};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    /// One reconciled message, acked or deferred.
    Outcome(ReconcileOutcome),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Delivery counters since process start.
#[derive(Debug, Default)]
pub struct Counters {
    received: AtomicU64,
    acked: AtomicU64,
    deferred: AtomicU64,
    decode_errors: AtomicU64,
    store_errors: AtomicU64,
    procurement_errors: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub received: u64,
    pub acked: u64,
    pub deferred: u64,
    pub decode_errors: u64,
    pub store_errors: u64,
    pub procurement_errors: u64,
}

impl Counters {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count the result of one reconciliation. `Ok(None)` (empty payload) is an ack.
    pub fn record(&self, result: &Result<Option<ReconcileOutcome>, ReconcileError>) {
        let slot = match result {
            Ok(Some(o)) if !o.disposition.is_ack() => &self.deferred,
            Ok(_) => &self.acked,
            Err(ReconcileError::Decode(_)) => &self.decode_errors,
            Err(ReconcileError::Store(_)) => &self.store_errors,
            Err(ReconcileError::Procurement(_)) => &self.procurement_errors,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    /// Envelope-level rejections never reach the reconciler.
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            received: self.received.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            procurement_errors: self.procurement_errors.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub reconciler: Reconciler,
    pub counters: Arc<Counters>,
    /// Hash of the merged config this process booted with.
    pub config_hash: Option<String>,
}

impl AppState {
    pub fn new(reconciler: Reconciler) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "mkp-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            reconciler,
            counters: Arc::new(Counters::default()),
            config_hash: None,
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
