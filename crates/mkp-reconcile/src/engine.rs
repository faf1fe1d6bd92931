use std::sync::Arc;

use mkp_procurement::ProcurementApi;
use mkp_schemas::{
    ApprovalState, Customer, Entitlement, EntitlementState, EventType, ProductEntitlement,
};
use mkp_store::{AccountLocks, RecordStore};
use tracing::{info, warn};

use crate::{
    normalize, Action, CancellationPolicy, DeferReason, Disposition, Event, ReconcileError,
    ReconcileOutcome, ReconcilePolicy, SignupPolicy, Subject,
};

/// The reconciliation state machine.
///
/// Cheap to clone; clones share the store, the procurement client and the
/// per-account locks.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    procurement: Arc<dyn ProcurementApi>,
    locks: AccountLocks,
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, procurement: Arc<dyn ProcurementApi>) -> Self {
        Self {
            store,
            procurement,
            locks: AccountLocks::new(),
            policy: ReconcilePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share locks with other writers of the same store (e.g. the usage job).
    pub fn with_locks(mut self, locks: AccountLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Normalize and reconcile one raw payload.
    ///
    /// `Ok(None)` means the payload was empty and must be acknowledged.
    pub async fn handle_payload(
        &self,
        raw: &[u8],
    ) -> Result<Option<ReconcileOutcome>, ReconcileError> {
        let event = match normalize(raw) {
            Ok(Some(ev)) => ev,
            Ok(None) => {
                info!(disposition = "ack", "empty payload ignored");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "payload rejected");
                return Err(e.into());
            }
        };

        let disposition = self.process_event(&event).await?;
        Ok(Some(ReconcileOutcome {
            event_id: event.event_id.clone(),
            event_type: event.event_type,
            subject_kind: event.subject.kind(),
            subject_id: event.subject.id().to_string(),
            disposition,
        }))
    }

    /// Route an event by its subject and log exactly one summary line.
    pub async fn process_event(&self, event: &Event) -> Result<Disposition, ReconcileError> {
        let result = match &event.subject {
            Subject::Account { account_id } => self.process_account(account_id).await,
            Subject::Entitlement {
                entitlement_id,
                new_plan,
            } => {
                self.process_entitlement(entitlement_id, event.event_type, new_plan.as_deref())
                    .await
            }
        };

        match &result {
            Ok(d) => info!(
                event_id = event.event_id.as_deref().unwrap_or(""),
                event_type = %event.event_type,
                subject = event.subject.kind(),
                id = event.subject.id(),
                disposition = %d,
                "reconciled"
            ),
            Err(e) => warn!(
                event_id = event.event_id.as_deref().unwrap_or(""),
                event_type = %event.event_type,
                subject = event.subject.kind(),
                id = event.subject.id(),
                error_kind = e.kind(),
                error = %e,
                "reconciliation failed; leaving unacknowledged"
            ),
        }
        result
    }

    // -----------------------------------------------------------------------
    // Account path
    // -----------------------------------------------------------------------

    /// Reconcile the Customer record for `account_id` against its Account.
    ///
    /// Account-class events always acknowledge unless an IO call fails.
    pub async fn process_account(&self, account_id: &str) -> Result<Disposition, ReconcileError> {
        let _guard = self.locks.acquire(account_id).await;

        let existing = self.store.read(account_id).await?;
        let Some(account) = self.procurement.get_account(account_id).await? else {
            if existing.is_some() {
                self.store.delete(account_id).await?;
                info!(account_id, "account removed upstream; customer deleted");
                return Ok(Disposition::Ack(Action::CustomerDeleted));
            }
            return Ok(Disposition::Ack(Action::NoChange));
        };

        let Some(signup) = account.signup_approval() else {
            return Ok(Disposition::Ack(Action::NoChange));
        };

        match signup.state {
            ApprovalState::Pending => match self.policy.signup {
                SignupPolicy::ApproveOnPending => {
                    self.procurement.approve_account(account_id).await?;
                    Ok(Disposition::Ack(Action::AccountApproved))
                }
                SignupPolicy::AwaitExternalSignup => Ok(Disposition::Ack(Action::NoChange)),
            },
            ApprovalState::Approved if existing.is_none() => {
                let customer = Customer::new(account_id, uuid::Uuid::new_v4().to_string());
                self.store.write(&customer).await?;
                info!(
                    account_id,
                    internal_account_id = %customer.internal_account_id,
                    "customer created"
                );
                Ok(Disposition::Ack(Action::CustomerCreated))
            }
            _ => Ok(Disposition::Ack(Action::NoChange)),
        }
    }

    // -----------------------------------------------------------------------
    // Entitlement path
    // -----------------------------------------------------------------------

    /// Reconcile one entitlement event against the authoritative Entitlement.
    ///
    /// `message_plan` is the plan carried by the message; it is only used when
    /// the entitlement itself does not name a pending plan.
    pub async fn process_entitlement(
        &self,
        entitlement_id: &str,
        event_type: EventType,
        message_plan: Option<&str>,
    ) -> Result<Disposition, ReconcileError> {
        let Some(entitlement) = self.procurement.get_entitlement(entitlement_id).await? else {
            return Ok(match self.policy.cancellation {
                CancellationPolicy::Defer => Disposition::Defer(DeferReason::EntitlementNotFound),
                // Entitlements are cancelled before they are deleted.
                CancellationPolicy::RemoveProduct => Disposition::Ack(Action::NoChange),
            });
        };

        let account_id = entitlement.account_id().to_string();
        let _guard = self.locks.acquire(&account_id).await;

        let Some(mut customer) = self.store.read(&account_id).await? else {
            return Ok(Disposition::Defer(DeferReason::CustomerMissing));
        };

        self.dispatch(&mut customer, entitlement_id, &entitlement, event_type, message_plan)
            .await
            .or_else(defer)
    }

    async fn dispatch(
        &self,
        customer: &mut Customer,
        entitlement_id: &str,
        entitlement: &Entitlement,
        event_type: EventType,
        message_plan: Option<&str>,
    ) -> Result<Disposition, Step> {
        match event_type {
            EventType::EntitlementCreationRequested => {
                require_state(entitlement, EntitlementState::ActivationRequested)?;
                self.procurement.approve_entitlement(entitlement_id).await?;
                Ok(Disposition::Ack(Action::EntitlementApproved))
            }

            EventType::EntitlementActive => {
                require_state(entitlement, EntitlementState::Active)?;
                self.upsert_product(customer, entitlement, Carry::Activation).await
            }

            EventType::EntitlementPlanChangeRequested => {
                require_state(entitlement, EntitlementState::PendingPlanChangeApproval)?;
                let target = entitlement
                    .new_pending_plan
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .or(message_plan);
                let Some(plan) = target else {
                    return Err(Step::Defer(DeferReason::MissingPendingPlan));
                };
                self.procurement
                    .approve_entitlement_plan_change(entitlement_id, plan)
                    .await?;
                Ok(Disposition::Ack(Action::PlanChangeApproved))
            }

            EventType::EntitlementPlanChanged => {
                require_state(entitlement, EntitlementState::Active)?;
                self.upsert_product(customer, entitlement, Carry::PlanChange).await
            }

            // No pending change is ever recorded locally.
            EventType::EntitlementPlanChangeCancelled => Ok(Disposition::Ack(Action::NoChange)),

            EventType::EntitlementCancelled => match self.policy.cancellation {
                CancellationPolicy::Defer => {
                    Err(Step::Defer(DeferReason::NotImplemented(event_type)))
                }
                CancellationPolicy::RemoveProduct => {
                    require_state(entitlement, EntitlementState::Cancelled)?;
                    self.remove_product(customer, entitlement).await
                }
            },

            EventType::EntitlementPendingCancellation
            | EventType::EntitlementCancellationReverted
            | EventType::EntitlementDeleted => match self.policy.cancellation {
                CancellationPolicy::Defer => {
                    Err(Step::Defer(DeferReason::NotImplemented(event_type)))
                }
                CancellationPolicy::RemoveProduct => Ok(Disposition::Ack(Action::NoChange)),
            },

            EventType::AccountActive | EventType::AccountDeleted => {
                Err(Step::Defer(DeferReason::UnsupportedEventType(event_type)))
            }
        }
    }

    async fn upsert_product(
        &self,
        customer: &mut Customer,
        entitlement: &Entitlement,
        carry: Carry,
    ) -> Result<Disposition, Step> {
        let mut entry = ProductEntitlement::new(
            entitlement.product.clone(),
            entitlement.plan.clone(),
            entitlement.create_time.clone(),
        )
        .with_consumer_id(entitlement.usage_reporting_id.as_deref());

        if let Some(prior) = customer.product(&entry.product_id) {
            match carry {
                Carry::PlanChange => {
                    entry.start_time = prior.start_time.clone();
                    entry.last_report_time = prior.last_report_time.clone();
                }
                Carry::Activation if prior.start_time == entry.start_time => {
                    entry.last_report_time = prior.last_report_time.clone();
                }
                Carry::Activation => {}
            }
            if prior == &entry {
                return Ok(Disposition::Ack(Action::NoChange));
            }
        }

        let product_id = entry.product_id.clone();
        let plan_id = entry.plan_id.clone();
        customer.put_product(entry);
        self.store.write(customer).await?;
        info!(
            account_id = %customer.procurement_account_id,
            product_id = %product_id,
            plan_id = %plan_id,
            "product entry upserted"
        );
        Ok(Disposition::Ack(Action::ProductUpserted))
    }

    async fn remove_product(
        &self,
        customer: &mut Customer,
        entitlement: &Entitlement,
    ) -> Result<Disposition, Step> {
        if customer.remove_product(&entitlement.product).is_none() {
            return Ok(Disposition::Ack(Action::NoChange));
        }
        self.store.write(customer).await?;
        info!(
            account_id = %customer.procurement_account_id,
            product_id = %entitlement.product,
            "product entry removed"
        );
        Ok(Disposition::Ack(Action::ProductRemoved))
    }
}

/// How an upsert treats the prior entry for the same product.
#[derive(Clone, Copy)]
enum Carry {
    Activation,
    PlanChange,
}

/// Early exit from a dispatch branch: either a deferral or a real error.
enum Step {
    Defer(DeferReason),
    Fail(ReconcileError),
}

impl From<ReconcileError> for Step {
    fn from(e: ReconcileError) -> Self {
        Step::Fail(e)
    }
}

impl From<mkp_store::StoreError> for Step {
    fn from(e: mkp_store::StoreError) -> Self {
        Step::Fail(e.into())
    }
}

impl From<mkp_procurement::ProcurementError> for Step {
    fn from(e: mkp_procurement::ProcurementError) -> Self {
        Step::Fail(e.into())
    }
}

fn require_state(entitlement: &Entitlement, expected: EntitlementState) -> Result<(), Step> {
    if entitlement.state == expected {
        Ok(())
    } else {
        Err(Step::Defer(DeferReason::StateMismatch {
            expected,
            actual: entitlement.state,
        }))
    }
}

fn defer(step: Step) -> Result<Disposition, ReconcileError> {
    match step {
        Step::Defer(reason) => Ok(Disposition::Defer(reason)),
        Step::Fail(e) => Err(e),
    }
}
