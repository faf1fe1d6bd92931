//! mkp-testkit
//!
//! In-process doubles for exercising the reconciler without a network:
//! - [`FakeProcurement`]: Account/Entitlement state held in memory, every
//!   call recorded, approvals flip state the way the real service does,
//!   failures and latency injectable.
//! - [`FlakyStore`]: a [`MemoryStore`] whose writes can be made to fail.
//! - payload builders for the inbound message shape.

mod fake_procurement;
mod flaky_store;

pub use fake_procurement::{Call, FakeProcurement};
pub use flaky_store::FlakyStore;

use std::sync::Arc;

use mkp_reconcile::{ReconcilePolicy, Reconciler};
use mkp_schemas::{Account, Approval, ApprovalState, Entitlement, EntitlementState, EventType};
use mkp_store::{MemoryStore, RecordStore};

pub const PROVIDER: &str = "DEMO-testkit";
pub const CREATE_TIME: &str = "2024-01-01T00:00:00Z";

/// Account with an optional signup approval in `signup` state.
pub fn account(account_id: &str, signup: Option<ApprovalState>) -> Account {
    Account {
        name: format!("providers/{PROVIDER}/accounts/{account_id}"),
        provider: Some(PROVIDER.to_string()),
        state: Some("ACCOUNT_ACTIVE".to_string()),
        approvals: signup
            .map(|s| vec![Approval::new(mkp_schemas::SIGNUP_APPROVAL_NAME, s)])
            .unwrap_or_default(),
        create_time: Some(CREATE_TIME.to_string()),
        update_time: None,
    }
}

pub fn entitlement(
    entitlement_id: &str,
    account_id: &str,
    product: &str,
    plan: &str,
    state: EntitlementState,
) -> Entitlement {
    Entitlement {
        name: format!("providers/{PROVIDER}/entitlements/{entitlement_id}"),
        account: format!("providers/{PROVIDER}/accounts/{account_id}"),
        provider: Some(PROVIDER.to_string()),
        product: product.to_string(),
        plan: plan.to_string(),
        state,
        new_pending_plan: None,
        usage_reporting_id: None,
        create_time: CREATE_TIME.to_string(),
        update_time: None,
        message_to_user: None,
    }
}

pub fn account_payload(event_type: EventType, account_id: &str) -> Vec<u8> {
    serde_json::json!({
        "eventId": format!("evt-{}-{}", event_type.as_str(), account_id),
        "eventType": event_type.as_str(),
        "account": { "id": account_id }
    })
    .to_string()
    .into_bytes()
}

pub fn entitlement_payload(
    event_type: EventType,
    entitlement_id: &str,
    new_plan: Option<&str>,
) -> Vec<u8> {
    let mut ent = serde_json::json!({ "id": entitlement_id });
    if let Some(p) = new_plan {
        ent["newPlan"] = serde_json::Value::String(p.to_string());
    }
    serde_json::json!({
        "eventId": format!("evt-{}-{}", event_type.as_str(), entitlement_id),
        "eventType": event_type.as_str(),
        "entitlement": ent
    })
    .to_string()
    .into_bytes()
}

/// A reconciler wired to fresh in-memory doubles.
pub struct Harness {
    pub reconciler: Reconciler,
    pub procurement: Arc<FakeProcurement>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(policy: ReconcilePolicy) -> Self {
        let procurement = Arc::new(FakeProcurement::new());
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(
            store.clone() as Arc<dyn RecordStore>,
            procurement.clone() as Arc<dyn mkp_procurement::ProcurementApi>,
        )
        .with_policy(policy);
        Self {
            reconciler,
            procurement,
            store,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(ReconcilePolicy::default())
    }
}
