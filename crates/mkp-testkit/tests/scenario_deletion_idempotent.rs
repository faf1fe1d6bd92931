//! Scenario: account removal is idempotent.
//!
//! # Invariants under test
//! - An account missing upstream (not-found) deletes the local Customer and
//!   acknowledges.
//! - Processing the same removal again acknowledges and leaves no record.
//! - Removal for an account never recorded locally acknowledges as a no-op.

use mkp_reconcile::{Action, Disposition};
use mkp_schemas::{ApprovalState, EventType};
use mkp_store::RecordStore;
use mkp_testkit::{account, account_payload, Harness};

#[tokio::test]
async fn removal_twice_acknowledges_both_times() {
    let h = Harness::default();
    h.procurement
        .put_account(account("acct-1", Some(ApprovalState::Approved)));
    h.reconciler.process_account("acct-1").await.unwrap();
    assert!(h.store.read("acct-1").await.unwrap().is_some());

    h.procurement.remove_account("acct-1");
    let payload = account_payload(EventType::AccountDeleted, "acct-1");

    let first = h.reconciler.handle_payload(&payload).await.unwrap().unwrap();
    assert_eq!(first.disposition, Disposition::Ack(Action::CustomerDeleted));
    assert!(h.store.read("acct-1").await.unwrap().is_none());

    let second = h.reconciler.handle_payload(&payload).await.unwrap().unwrap();
    assert_eq!(second.disposition, Disposition::Ack(Action::NoChange));
    assert!(h.store.read("acct-1").await.unwrap().is_none());
}

#[tokio::test]
async fn removal_of_unknown_account_is_a_no_op() {
    let h = Harness::default();
    let d = h.reconciler.process_account("never-seen").await.unwrap();
    assert_eq!(d, Disposition::Ack(Action::NoChange));
    assert!(h.store.list_all().await.unwrap().is_empty());
}
