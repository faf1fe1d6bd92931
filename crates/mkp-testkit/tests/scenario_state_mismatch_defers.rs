//! Scenario: a state mismatch defers and never double-applies.
//!
//! # Invariants under test
//! - ENTITLEMENT_CREATION_REQUESTED against an entitlement already ACTIVE
//!   defers and does not call approve-entitlement again.
//! - ENTITLEMENT_ACTIVE / ENTITLEMENT_PLAN_CHANGED against a non-ACTIVE
//!   entitlement defers without writing.
//! - Entitlement not-found defers under the default cancellation policy.
//! - An account-class event type with an entitlement subject defers.

use mkp_reconcile::{DeferReason, Disposition};
use mkp_schemas::{ApprovalState, EntitlementState, EventType};
use mkp_store::RecordStore;
use mkp_testkit::{account, entitlement, Call, Harness};

async fn customer(h: &Harness) {
    h.procurement
        .put_account(account("acct-1", Some(ApprovalState::Approved)));
    h.reconciler.process_account("acct-1").await.unwrap();
}

#[tokio::test]
async fn duplicate_creation_request_is_approved_once() {
    let h = Harness::default();
    customer(&h).await;
    h.procurement.put_entitlement(entitlement(
        "ent-1",
        "acct-1",
        "prod-a",
        "basic",
        EntitlementState::ActivationRequested,
    ));

    let first = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementCreationRequested, None)
        .await
        .unwrap();
    assert!(first.is_ack());

    // The fake moved the entitlement to ACTIVE; the duplicate must not re-approve.
    for _ in 0..3 {
        let d = h
            .reconciler
            .process_entitlement("ent-1", EventType::EntitlementCreationRequested, None)
            .await
            .unwrap();
        assert_eq!(
            d,
            Disposition::Defer(DeferReason::StateMismatch {
                expected: EntitlementState::ActivationRequested,
                actual: EntitlementState::Active,
            })
        );
    }
    assert_eq!(h.procurement.count(&Call::ApproveEntitlement("ent-1".into())), 1);
}

#[tokio::test]
async fn activation_events_against_inactive_entitlement_defer_without_writing() {
    let h = Harness::default();
    customer(&h).await;
    h.procurement.put_entitlement(entitlement(
        "ent-1",
        "acct-1",
        "prod-a",
        "basic",
        EntitlementState::PendingCancellation,
    ));

    for t in [EventType::EntitlementActive, EventType::EntitlementPlanChanged] {
        let d = h.reconciler.process_entitlement("ent-1", t, None).await.unwrap();
        assert!(
            matches!(d, Disposition::Defer(DeferReason::StateMismatch { .. })),
            "{t}: {d}"
        );
    }
    assert!(h.store.read("acct-1").await.unwrap().unwrap().products.is_empty());
}

#[tokio::test]
async fn entitlement_not_found_defers() {
    let h = Harness::default();
    customer(&h).await;

    let d = h
        .reconciler
        .process_entitlement("ghost", EventType::EntitlementActive, None)
        .await
        .unwrap();
    assert_eq!(d, Disposition::Defer(DeferReason::EntitlementNotFound));
}

#[tokio::test]
async fn account_event_type_with_entitlement_subject_defers() {
    let h = Harness::default();
    customer(&h).await;
    h.procurement
        .put_entitlement(entitlement("ent-1", "acct-1", "prod-a", "basic", EntitlementState::Active));

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::AccountActive, None)
        .await
        .unwrap();
    assert_eq!(
        d,
        Disposition::Defer(DeferReason::UnsupportedEventType(EventType::AccountActive))
    );
    assert_eq!(h.procurement.approval_calls(), 0);
}
