//! Scenario: plan changes keep the activation time.
//!
//! # Invariants under test
//! - ENTITLEMENT_PLAN_CHANGED updates `plan_id` and leaves `start_time`
//!   (and `last_report_time`) untouched.
//! - ENTITLEMENT_PLAN_CHANGE_REQUESTED approves the entitlement's pending
//!   plan, falls back to the message plan, and defers when neither is known.
//! - ENTITLEMENT_PLAN_CHANGE_CANCELLED acknowledges without change.

use mkp_reconcile::{Action, DeferReason, Disposition};
use mkp_schemas::{ApprovalState, EntitlementState, EventType};
use mkp_store::RecordStore;
use mkp_testkit::{account, entitlement, Call, Harness, CREATE_TIME};

const T0: &str = CREATE_TIME;

async fn active_customer(h: &Harness) {
    h.procurement
        .put_account(account("acct-1", Some(ApprovalState::Approved)));
    h.reconciler.process_account("acct-1").await.unwrap();
    h.procurement
        .put_entitlement(entitlement("ent-1", "acct-1", "prod-a", "basic", EntitlementState::Active));
    h.reconciler
        .process_entitlement("ent-1", EventType::EntitlementActive, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn plan_changed_keeps_start_time_and_report_cursor() {
    let h = Harness::default();
    active_customer(&h).await;

    let mut c = h.store.read("acct-1").await.unwrap().unwrap();
    c.products.get_mut("prod-a").unwrap().last_report_time = Some("2024-02-01T00:00:00Z".into());
    h.store.write(&c).await.unwrap();

    // Upstream reports the new plan with a later timestamp.
    h.procurement.update_entitlement("ent-1", |e| {
        e.plan = "pro".to_string();
        e.create_time = "2024-03-01T00:00:00Z".to_string();
    });

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementPlanChanged, None)
        .await
        .unwrap();
    assert_eq!(d, Disposition::Ack(Action::ProductUpserted));

    let p = h.store.read("acct-1").await.unwrap().unwrap().products["prod-a"].clone();
    assert_eq!(p.plan_id, "pro");
    assert_eq!(p.start_time, T0);
    assert_eq!(p.last_report_time.as_deref(), Some("2024-02-01T00:00:00Z"));
}

#[tokio::test]
async fn plan_change_request_uses_pending_plan() {
    let h = Harness::default();
    active_customer(&h).await;
    h.procurement.update_entitlement("ent-1", |e| {
        e.state = EntitlementState::PendingPlanChangeApproval;
        e.new_pending_plan = Some("pro".to_string());
    });

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementPlanChangeRequested, Some("ignored"))
        .await
        .unwrap();
    assert_eq!(d, Disposition::Ack(Action::PlanChangeApproved));
    assert_eq!(
        h.procurement.count(&Call::ApprovePlanChange {
            entitlement_id: "ent-1".into(),
            plan: "pro".into()
        }),
        1
    );

    // Redelivery: upstream already moved to ACTIVE, so nothing is re-approved.
    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementPlanChangeRequested, Some("pro"))
        .await
        .unwrap();
    assert!(!d.is_ack());
    assert_eq!(h.procurement.approval_calls(), 1);
}

#[tokio::test]
async fn plan_change_request_falls_back_to_message_plan() {
    let h = Harness::default();
    active_customer(&h).await;
    h.procurement.update_entitlement("ent-1", |e| {
        e.state = EntitlementState::PendingPlanChangeApproval;
    });

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementPlanChangeRequested, Some("team"))
        .await
        .unwrap();
    assert_eq!(d, Disposition::Ack(Action::PlanChangeApproved));
    assert_eq!(h.procurement.entitlement("ent-1").unwrap().plan, "team");
}

#[tokio::test]
async fn plan_change_request_without_target_defers() {
    let h = Harness::default();
    active_customer(&h).await;
    h.procurement.update_entitlement("ent-1", |e| {
        e.state = EntitlementState::PendingPlanChangeApproval;
    });

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementPlanChangeRequested, None)
        .await
        .unwrap();
    assert_eq!(d, Disposition::Defer(DeferReason::MissingPendingPlan));
    assert_eq!(h.procurement.approval_calls(), 0);
}

#[tokio::test]
async fn plan_change_cancelled_is_a_no_op() {
    let h = Harness::default();
    active_customer(&h).await;
    let before = h.store.read("acct-1").await.unwrap();

    let d = h
        .reconciler
        .process_entitlement("ent-1", EventType::EntitlementPlanChangeCancelled, None)
        .await
        .unwrap();
    assert_eq!(d, Disposition::Ack(Action::NoChange));
    assert_eq!(h.store.read("acct-1").await.unwrap(), before);
}
