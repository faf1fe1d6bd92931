//! Scenario: entitlement cancellation handling per policy.
//!
//! # Invariants under test
//! Default (`defer`):
//! - ENTITLEMENT_CANCELLED, ENTITLEMENT_PENDING_CANCELLATION,
//!   ENTITLEMENT_CANCELLATION_REVERTED and ENTITLEMENT_DELETED defer and
//!   leave the product entry in place.
//!
//! `remove_product`:
//! - ENTITLEMENT_CANCELLED with authoritative state CANCELLED removes the
//!   product entry and acknowledges; a redelivery acknowledges as a no-op.
//! - ENTITLEMENT_CANCELLED with any other authoritative state defers.
//! - The other three cancellation events acknowledge without change.
//! - Entitlement not-found acknowledges.

use mkp_reconcile::{
    Action, CancellationPolicy, DeferReason, Disposition, ReconcilePolicy,
};
use mkp_schemas::{ApprovalState, EntitlementState, EventType};
use mkp_store::RecordStore;
use mkp_testkit::{account, entitlement, Harness};

const OTHER_CANCELLATION_EVENTS: [EventType; 3] = [
    EventType::EntitlementPendingCancellation,
    EventType::EntitlementCancellationReverted,
    EventType::EntitlementDeleted,
];

async fn with_active_product(policy: CancellationPolicy) -> Harness {
    let h = Harness::new(ReconcilePolicy {
        cancellation: policy,
        ..ReconcilePolicy::default()
    });
    h.procurement
        .put_account(account("acct-1", Some(ApprovalState::Approved)));
    h.reconciler.process_account("acct-1").await.unwrap();
    h.procurement
        .put_entitlement(entitlement("ent-1", "acct-1", "prod-a", "basic", EntitlementState::Active));
    h.reconciler
        .process_entitlement("ent-1", EventType::EntitlementActive, None)
        .await
        .unwrap();
    h
}

async fn product_count(h: &Harness) -> usize {
    h.store.read("acct-1").await.unwrap().unwrap().products.len()
}

#[tokio::test]
async fn default_policy_defers_every_cancellation_event() {
    let h = with_active_product(CancellationPolicy::Defer).await;
    h.procurement.update_entitlement("ent-1", |e| {
        e.state = EntitlementState::Cancelled;
    });

    for t in [EventType::EntitlementCancelled]
        .into_iter()
        .chain(OTHER_CANCELLATION_EVENTS)
    {
        let d = h.reconciler.process_entitlement("ent-1", t, None).await.unwrap();
        assert_eq!(d, Disposition::Defer(DeferReason::NotImplemented(t)));
    }
    assert_eq!(product_count(&h).await, 1);
}

#[tokio::test]
async fn remove_product_drops_entry_on_cancelled() {
    let h = with_active_product(CancellationPolicy::RemoveProduct).await;
    h.procurement.update_entitlement("ent-1", |e| {
        e.state = EntitlementState::Cancelled;
    });

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementCancelled, None)
        .await
        .unwrap();
    assert_eq!(d, Disposition::Ack(Action::ProductRemoved));
    assert_eq!(product_count(&h).await, 0);

    let again = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementCancelled, None)
        .await
        .unwrap();
    assert_eq!(again, Disposition::Ack(Action::NoChange));
}

#[tokio::test]
async fn remove_product_defers_cancelled_event_while_still_active() {
    let h = with_active_product(CancellationPolicy::RemoveProduct).await;

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementCancelled, None)
        .await
        .unwrap();
    assert_eq!(
        d,
        Disposition::Defer(DeferReason::StateMismatch {
            expected: EntitlementState::Cancelled,
            actual: EntitlementState::Active,
        })
    );
    assert_eq!(product_count(&h).await, 1);
}

#[tokio::test]
async fn remove_product_acknowledges_other_cancellation_events() {
    let h = with_active_product(CancellationPolicy::RemoveProduct).await;
    h.procurement.update_entitlement("ent-1", |e| {
        e.state = EntitlementState::PendingCancellation;
    });

    for t in OTHER_CANCELLATION_EVENTS {
        let d = h.reconciler.process_entitlement("ent-1", t, None).await.unwrap();
        assert_eq!(d, Disposition::Ack(Action::NoChange), "{t}");
    }
    assert_eq!(product_count(&h).await, 1);
}

#[tokio::test]
async fn remove_product_acknowledges_entitlement_not_found() {
    let h = with_active_product(CancellationPolicy::RemoveProduct).await;
    h.procurement.remove_entitlement("ent-1");

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementDeleted, None)
        .await
        .unwrap();
    assert_eq!(d, Disposition::Ack(Action::NoChange));
}
