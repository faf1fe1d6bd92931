//! Axum router and all HTTP handlers for mkp-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.  All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.
//!
//! # Push acknowledgment
//! The broker treats any 2xx as an ack and anything else as a nack, so the
//! status code is the disposition:
//!
//! | Result                        | Status |
//! |-------------------------------|--------|
//! | ack / empty payload           | 204    |
//! | defer                         | 503    |
//! | undecodable envelope or event | 400    |
//! | record store failure          | 500    |
//! | procurement API failure       | 502    |

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use futures_util::{Stream, StreamExt};
use mkp_reconcile::ReconcileError;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::{
    api_types::{
        CustomersResponse, DeferredResponse, ErrorResponse, HealthResponse, PushEnvelope,
        StatusResponse,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/pubsub/push", post(pubsub_push))
        .route("/v1/customers", get(customers_list))
        .route("/v1/customers/:account_id", get(customer_show))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = st.reconciler.policy();
    (
        StatusCode::OK,
        Json(StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            store_kind: st.reconciler.store().kind().to_string(),
            config_hash: st.config_hash.clone(),
            signup_policy: policy.signup.as_str().to_string(),
            cancellation_policy: policy.cancellation.as_str().to_string(),
            counters: st.counters.snapshot(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/pubsub/push
// ---------------------------------------------------------------------------

pub(crate) async fn pubsub_push(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    st.counters.record_received();

    let payload = match decode_envelope(&body) {
        Ok(p) => p,
        Err(msg) => {
            st.counters.record_decode_error();
            warn!(error = %msg, "push envelope rejected");
            return error_response(StatusCode::BAD_REQUEST, "decode", msg);
        }
    };

    let result = st.reconciler.handle_payload(&payload).await;
    st.counters.record(&result);

    match result {
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Ok(Some(outcome)) => {
            let resp = match outcome.disposition.defer_reason() {
                None => StatusCode::NO_CONTENT.into_response(),
                Some(reason) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(DeferredResponse {
                        disposition: "defer".to_string(),
                        reason: reason.to_string(),
                        event_id: outcome.event_id.clone(),
                    }),
                )
                    .into_response(),
            };
            let _ = st.bus.send(BusMsg::Outcome(outcome));
            resp
        }
        Err(e) => {
            let status = match &e {
                ReconcileError::Decode(_) => StatusCode::BAD_REQUEST,
                ReconcileError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ReconcileError::Procurement(_) => StatusCode::BAD_GATEWAY,
            };
            let _ = st.bus.send(BusMsg::LogLine {
                level: "WARN".to_string(),
                msg: format!("{} error: {}", e.kind(), e),
            });
            error_response(status, e.kind(), e.to_string())
        }
    }
}

/// Unwrap the push envelope into the raw message body.
///
/// A missing message or empty `data` yields an empty body, which the
/// reconciler acknowledges without work.
fn decode_envelope(body: &[u8]) -> Result<Vec<u8>, String> {
    let envelope: PushEnvelope =
        serde_json::from_slice(body).map_err(|e| format!("invalid push envelope: {e}"))?;

    let Some(message) = envelope.message else {
        return Ok(Vec::new());
    };
    debug!(
        message_id = message.message_id.as_deref().unwrap_or(""),
        subscription = envelope.subscription.as_deref().unwrap_or(""),
        "push received"
    );

    match message.data.as_deref().map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(data) => base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| format!("message data is not valid base64: {e}")),
    }
}

fn error_response(status: StatusCode, kind: &str, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            kind: kind.to_string(),
            error,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/customers
// ---------------------------------------------------------------------------

pub(crate) async fn customers_list(State(st): State<Arc<AppState>>) -> Response {
    match st.reconciler.store().list_all().await {
        Ok(customers) => (StatusCode::OK, Json(CustomersResponse { customers })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "store", e.to_string()),
    }
}

pub(crate) async fn customer_show(
    State(st): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Response {
    match st.reconciler.store().read(&account_id).await {
        Ok(Some(customer)) => (StatusCode::OK, Json(customer)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no customer for account '{account_id}'"),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "store", e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Outcome(_) => "outcome",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_without_message_is_empty() {
        assert!(decode_envelope(br#"{"subscription":"s"}"#).unwrap().is_empty());
        assert!(decode_envelope(br#"{"message":{"data":""}}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn envelope_data_is_base64_decoded() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"{\"x\":1}");
        let body = format!(r#"{{"message":{{"data":"{b64}","messageId":"m1"}}}}"#);
        assert_eq!(decode_envelope(body.as_bytes()).unwrap(), b"{\"x\":1}");
    }

    #[test]
    fn bad_base64_and_bad_json_are_rejected() {
        assert!(decode_envelope(br#"{"message":{"data":"%%%"}}"#).is_err());
        assert!(decode_envelope(b"not json").is_err());
    }
}
