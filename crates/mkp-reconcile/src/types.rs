use std::fmt;

use mkp_schemas::{EntitlementState, EventType};
use serde::Serialize;

/// What an acknowledged reconciliation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    AccountApproved,
    CustomerCreated,
    CustomerDeleted,
    EntitlementApproved,
    PlanChangeApproved,
    ProductUpserted,
    ProductRemoved,
    NoChange,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::AccountApproved => "account_approved",
            Action::CustomerCreated => "customer_created",
            Action::CustomerDeleted => "customer_deleted",
            Action::EntitlementApproved => "entitlement_approved",
            Action::PlanChangeApproved => "plan_change_approved",
            Action::ProductUpserted => "product_upserted",
            Action::ProductRemoved => "product_removed",
            Action::NoChange => "no_change",
        }
    }
}

/// Why a reconciliation left the message unacknowledged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferReason {
    /// Entitlement fetch returned not-found.
    EntitlementNotFound,
    /// Owning account has no Customer record yet.
    CustomerMissing,
    /// Authoritative state is not the one the event implies.
    StateMismatch {
        expected: EntitlementState,
        actual: EntitlementState,
    },
    /// Event class this policy does not handle.
    NotImplemented(EventType),
    /// Plan change requested but no target plan is known.
    MissingPendingPlan,
    /// Account-class event type carried an entitlement subject.
    UnsupportedEventType(EventType),
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferReason::EntitlementNotFound => write!(f, "entitlement_not_found"),
            DeferReason::CustomerMissing => write!(f, "customer_missing"),
            DeferReason::StateMismatch { expected, actual } => {
                write!(f, "state_mismatch expected={expected} actual={actual}")
            }
            DeferReason::NotImplemented(t) => write!(f, "not_implemented event_type={t}"),
            DeferReason::MissingPendingPlan => write!(f, "missing_pending_plan"),
            DeferReason::UnsupportedEventType(t) => {
                write!(f, "unsupported_event_type event_type={t}")
            }
        }
    }
}

/// Acknowledgment decision handed to the delivery adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "disposition", content = "detail", rename_all = "snake_case")]
pub enum Disposition {
    Ack(Action),
    Defer(DeferReason),
}

impl Disposition {
    /// `true`: fully handled, never redeliver. `false`: broker must redeliver.
    pub fn is_ack(&self) -> bool {
        matches!(self, Disposition::Ack(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Ack(_) => "ack",
            Disposition::Defer(_) => "defer",
        }
    }

    pub fn defer_reason(&self) -> Option<&DeferReason> {
        match self {
            Disposition::Defer(r) => Some(r),
            Disposition::Ack(_) => None,
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Ack(a) => write!(f, "ack({})", a.as_str()),
            Disposition::Defer(r) => write!(f, "defer({r})"),
        }
    }
}

/// One reconciled message, as reported to observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub event_id: Option<String>,
    pub event_type: EventType,
    pub subject_kind: &'static str,
    pub subject_id: String,
    #[serde(flatten)]
    pub disposition: Disposition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_ack_flag() {
        assert!(Disposition::Ack(Action::NoChange).is_ack());
        assert!(!Disposition::Defer(DeferReason::CustomerMissing).is_ack());
    }

    #[test]
    fn state_mismatch_display_names_both_states() {
        let d = Disposition::Defer(DeferReason::StateMismatch {
            expected: EntitlementState::ActivationRequested,
            actual: EntitlementState::Active,
        });
        assert_eq!(
            d.to_string(),
            "defer(state_mismatch expected=ENTITLEMENT_ACTIVATION_REQUESTED actual=ENTITLEMENT_ACTIVE)"
        );
    }

    #[test]
    fn outcome_serializes_flat_disposition() {
        let o = ReconcileOutcome {
            event_id: Some("e-1".to_string()),
            event_type: EventType::AccountActive,
            subject_kind: "account",
            subject_id: "acct-1".to_string(),
            disposition: Disposition::Ack(Action::CustomerCreated),
        };
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["event_type"], "ACCOUNT_ACTIVE");
        assert_eq!(v["disposition"], "ack");
        assert_eq!(v["detail"], "customer_created");
    }
}
