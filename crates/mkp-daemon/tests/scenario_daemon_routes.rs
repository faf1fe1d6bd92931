//! In-process scenario tests for mkp-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; no network I/O required.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use base64::Engine as _;
use http_body_util::BodyExt;
use mkp_daemon::{routes, state};
use mkp_procurement::ProcurementApi;
use mkp_reconcile::Reconciler;
use mkp_schemas::{ApprovalState, EntitlementState, EventType};
use mkp_store::RecordStore;
use mkp_testkit::{
    account, account_payload, entitlement, entitlement_payload, FakeProcurement, FlakyStore,
    Harness,
};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state(h: &Harness) -> Arc<state::AppState> {
    Arc::new(state::AppState::new(h.reconciler.clone()).with_config_hash("abc123"))
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

/// Wrap a raw message body in a push envelope.
fn push(payload: &[u8]) -> Request<axum::body::Body> {
    let envelope = serde_json::json!({
        "message": {
            "data": base64::engine::general_purpose::STANDARD.encode(payload),
            "messageId": "m-1",
            "attributes": {}
        },
        "subscription": "projects/p/subscriptions/codelab"
    });
    push_raw(envelope.to_string())
}

fn push_raw(body: impl Into<String>) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/pubsub/push")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.into()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// GET /v1/health, /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let h = Harness::default();
    let (status, body) = call(routes::build_router(make_state(&h)), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "mkp-daemon");
}

#[tokio::test]
async fn status_reports_store_policy_and_zero_counters() {
    let h = Harness::default();
    let (status, body) = call(routes::build_router(make_state(&h)), get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["store_kind"], "memory");
    assert_eq!(json["config_hash"], "abc123");
    assert_eq!(json["signup_policy"], "approve_on_pending");
    assert_eq!(json["cancellation_policy"], "defer");
    assert_eq!(json["counters"]["received"], 0);
}

// ---------------------------------------------------------------------------
// POST /v1/pubsub/push
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approved_account_push_acks_and_creates_customer() {
    let h = Harness::default();
    h.procurement
        .put_account(account("acct-1", Some(ApprovalState::Approved)));
    let st = make_state(&h);

    let (status, body) = call(
        routes::build_router(st.clone()),
        push(&account_payload(EventType::AccountActive, "acct-1")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, body) = call(routes::build_router(st.clone()), get("/v1/customers/acct-1")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["procurement_account_id"], "acct-1");
    assert!(!json["internal_account_id"].as_str().unwrap().is_empty());

    let (_, body) = call(routes::build_router(st), get("/v1/customers")).await;
    assert_eq!(parse_json(body)["customers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_entitlement_defers_with_503_and_reason() {
    let h = Harness::default();
    let st = make_state(&h);

    let (status, body) = call(
        routes::build_router(st.clone()),
        push(&entitlement_payload(
            EventType::EntitlementCreationRequested,
            "ent-404",
            None,
        )),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json = parse_json(body);
    assert_eq!(json["disposition"], "defer");
    assert_eq!(json["reason"], "entitlement_not_found");

    let counters = st.counters.snapshot();
    assert_eq!(counters.received, 1);
    assert_eq!(counters.deferred, 1);
    assert_eq!(counters.acked, 0);
}

#[tokio::test]
async fn entitlement_for_unknown_customer_defers() {
    let h = Harness::default();
    h.procurement.put_entitlement(entitlement(
        "ent-1",
        "acct-9",
        "prod-a",
        "plan-basic",
        EntitlementState::ActivationRequested,
    ));

    let (status, body) = call(
        routes::build_router(make_state(&h)),
        push(&entitlement_payload(
            EventType::EntitlementCreationRequested,
            "ent-1",
            None,
        )),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(parse_json(body)["reason"], "customer_missing");
    assert_eq!(h.procurement.approval_calls(), 0);
}

#[tokio::test]
async fn empty_envelope_and_empty_data_are_acked() {
    let h = Harness::default();
    let st = make_state(&h);

    let (status, _) = call(routes::build_router(st.clone()), push_raw("{}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(
        routes::build_router(st.clone()),
        push_raw(r#"{"message":{"data":"","messageId":"m-2"}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(h.procurement.calls().is_empty());
    assert_eq!(st.counters.snapshot().acked, 2);
}

#[tokio::test]
async fn undecodable_bodies_are_400() {
    let h = Harness::default();
    let st = make_state(&h);

    let (status, body) = call(routes::build_router(st.clone()), push_raw("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(body)["kind"], "decode");

    let (status, _) = call(
        routes::build_router(st.clone()),
        push_raw(r#"{"message":{"data":"@@not-base64@@"}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        routes::build_router(st.clone()),
        push(br#"{"eventType":"ENTITLEMENT_SUSPENDED","entitlement":{"id":"e"}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(st.counters.snapshot().decode_errors, 3);
    assert!(h.procurement.calls().is_empty());
}

#[tokio::test]
async fn path_like_ids_are_400_and_never_reach_procurement() {
    let h = Harness::default();
    let st = make_state(&h);

    let (status, body) = call(
        routes::build_router(st.clone()),
        push(&entitlement_payload(
            EventType::EntitlementCreationRequested,
            "x/../../../OTHER-prov/entitlements/victim",
            None,
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(body)["kind"], "decode");
    assert!(h.procurement.calls().is_empty());
}

#[tokio::test]
async fn procurement_failure_is_502() {
    let h = Harness::default();
    h.procurement
        .put_account(account("acct-1", Some(ApprovalState::Pending)));
    h.procurement.fail("get_account");
    let st = make_state(&h);

    let (status, body) = call(
        routes::build_router(st.clone()),
        push(&account_payload(EventType::AccountActive, "acct-1")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(parse_json(body)["kind"], "procurement");
    assert_eq!(st.counters.snapshot().procurement_errors, 1);
}

#[tokio::test]
async fn store_failure_is_500_and_nothing_is_persisted() {
    let procurement = Arc::new(FakeProcurement::new());
    procurement.put_account(account("acct-1", Some(ApprovalState::Approved)));
    let store = Arc::new(FlakyStore::new());
    store.set_failing(true);
    let reconciler = Reconciler::new(
        store.clone() as Arc<dyn RecordStore>,
        procurement.clone() as Arc<dyn ProcurementApi>,
    );
    let st = Arc::new(state::AppState::new(reconciler));

    let (status, body) = call(
        routes::build_router(st.clone()),
        push(&account_payload(EventType::AccountActive, "acct-1")),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(parse_json(body)["kind"], "store");
    assert!(store.read("acct-1").await.unwrap().is_none());

    // Redelivery after the store recovers succeeds.
    store.set_failing(false);
    let (status, _) = call(
        routes::build_router(st),
        push(&account_payload(EventType::AccountActive, "acct-1")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(store.writes(), 1);
}

// ---------------------------------------------------------------------------
// GET /v1/customers/:account_id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_customer_is_404() {
    let h = Harness::default();
    let (status, body) = call(routes::build_router(make_state(&h)), get("/v1/customers/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["kind"], "not_found");
}

// ---------------------------------------------------------------------------
// Event bus
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconciled_messages_are_published_on_the_bus() {
    let h = Harness::default();
    h.procurement
        .put_account(account("acct-1", Some(ApprovalState::Approved)));
    let st = make_state(&h);
    let mut rx = st.bus.subscribe();

    let (status, _) = call(
        routes::build_router(st.clone()),
        push(&account_payload(EventType::AccountActive, "acct-1")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    match rx.try_recv().expect("one outcome on the bus") {
        state::BusMsg::Outcome(o) => {
            assert_eq!(o.subject_id, "acct-1");
            assert!(o.disposition.is_ack());
        }
        other => panic!("unexpected bus message: {other:?}"),
    }
}
