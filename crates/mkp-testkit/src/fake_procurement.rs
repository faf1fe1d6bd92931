use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use mkp_procurement::{ProcurementApi, ProcurementError};
use mkp_schemas::{Account, ApprovalState, Entitlement, EntitlementState, SIGNUP_APPROVAL_NAME};

/// One recorded call against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetAccount(String),
    ApproveAccount(String),
    GetEntitlement(String),
    ApproveEntitlement(String),
    ApprovePlanChange { entitlement_id: String, plan: String },
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<String, Account>,
    entitlements: BTreeMap<String, Entitlement>,
    calls: Vec<Call>,
    failing_ops: BTreeSet<&'static str>,
    latency: Option<Duration>,
}

/// In-memory procurement service.
#[derive(Default)]
pub struct FakeProcurement {
    state: Mutex<State>,
}

impl FakeProcurement {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn put_account(&self, account: Account) {
        let id = account.account_id().to_string();
        self.lock().accounts.insert(id, account);
    }

    pub fn remove_account(&self, account_id: &str) {
        self.lock().accounts.remove(account_id);
    }

    pub fn put_entitlement(&self, entitlement: Entitlement) {
        let id = entitlement.entitlement_id().to_string();
        self.lock().entitlements.insert(id, entitlement);
    }

    pub fn remove_entitlement(&self, entitlement_id: &str) {
        self.lock().entitlements.remove(entitlement_id);
    }

    /// Mutate a stored entitlement in place. No-op if absent.
    pub fn update_entitlement(&self, entitlement_id: &str, f: impl FnOnce(&mut Entitlement)) {
        if let Some(e) = self.lock().entitlements.get_mut(entitlement_id) {
            f(e);
        }
    }

    pub fn entitlement(&self, entitlement_id: &str) -> Option<Entitlement> {
        self.lock().entitlements.get(entitlement_id).cloned()
    }

    pub fn account(&self, account_id: &str) -> Option<Account> {
        self.lock().accounts.get(account_id).cloned()
    }

    /// Make every call to `op` fail until [`Self::clear_failures`]. `op` is
    /// the trait method name, e.g. `"approve_entitlement"`.
    pub fn fail(&self, op: &'static str) {
        self.lock().failing_ops.insert(op);
    }

    pub fn clear_failures(&self) {
        self.lock().failing_ops.clear();
    }

    /// Sleep this long inside every call, to widen race windows.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of approval calls of any kind.
    pub fn approval_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::ApproveAccount(_) | Call::ApproveEntitlement(_) | Call::ApprovePlanChange { .. }
                )
            })
            .count()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Record the call, then apply latency and failure injection.
    async fn enter(&self, op: &'static str, call: Call) -> Result<(), ProcurementError> {
        let (latency, failing) = {
            let mut s = self.lock();
            s.calls.push(call);
            (s.latency, s.failing_ops.contains(op))
        };
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
        if failing {
            return Err(ProcurementError::Injected {
                op,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProcurementApi for FakeProcurement {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, ProcurementError> {
        self.enter("get_account", Call::GetAccount(account_id.to_string()))
            .await?;
        Ok(self.account(account_id))
    }

    async fn approve_account(&self, account_id: &str) -> Result<(), ProcurementError> {
        self.enter("approve_account", Call::ApproveAccount(account_id.to_string()))
            .await?;
        let mut s = self.lock();
        let account = s.accounts.get_mut(account_id).ok_or_else(|| ProcurementError::Status {
            op: "approve_account",
            status: 404,
            body: format!("account {account_id} not found"),
        })?;
        for a in account.approvals.iter_mut() {
            if a.name == SIGNUP_APPROVAL_NAME {
                a.state = ApprovalState::Approved;
            }
        }
        Ok(())
    }

    async fn get_entitlement(
        &self,
        entitlement_id: &str,
    ) -> Result<Option<Entitlement>, ProcurementError> {
        self.enter(
            "get_entitlement",
            Call::GetEntitlement(entitlement_id.to_string()),
        )
        .await?;
        Ok(self.entitlement(entitlement_id))
    }

    async fn approve_entitlement(&self, entitlement_id: &str) -> Result<(), ProcurementError> {
        self.enter(
            "approve_entitlement",
            Call::ApproveEntitlement(entitlement_id.to_string()),
        )
        .await?;
        let mut s = self.lock();
        let e = s
            .entitlements
            .get_mut(entitlement_id)
            .ok_or_else(|| ProcurementError::Status {
                op: "approve_entitlement",
                status: 404,
                body: format!("entitlement {entitlement_id} not found"),
            })?;
        e.state = EntitlementState::Active;
        Ok(())
    }

    async fn approve_entitlement_plan_change(
        &self,
        entitlement_id: &str,
        new_plan: &str,
    ) -> Result<(), ProcurementError> {
        self.enter(
            "approve_entitlement_plan_change",
            Call::ApprovePlanChange {
                entitlement_id: entitlement_id.to_string(),
                plan: new_plan.to_string(),
            },
        )
        .await?;
        let mut s = self.lock();
        let e = s
            .entitlements
            .get_mut(entitlement_id)
            .ok_or_else(|| ProcurementError::Status {
                op: "approve_entitlement_plan_change",
                status: 404,
                body: format!("entitlement {entitlement_id} not found"),
            })?;
        e.plan = new_plan.to_string();
        e.new_pending_plan = None;
        e.state = EntitlementState::Active;
        Ok(())
    }
}
