//! Policies for the two branches the procurement flow leaves open.

use mkp_config::settings::ReconcileSettings;

use crate::PolicyError;

/// What to do with a PENDING signup approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignupPolicy {
    /// Approve it. Only correct when signup provisioning already happened
    /// out-of-band.
    #[default]
    ApproveOnPending,
    /// Leave it for an external signup flow; acknowledge without change.
    AwaitExternalSignup,
}

impl SignupPolicy {
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve_on_pending" => Ok(SignupPolicy::ApproveOnPending),
            "await_external_signup" => Ok(SignupPolicy::AwaitExternalSignup),
            other => Err(PolicyError::Invalid {
                field: "reconcile.signup_policy",
                value: other.to_string(),
                expected: "approve_on_pending | await_external_signup",
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignupPolicy::ApproveOnPending => "approve_on_pending",
            SignupPolicy::AwaitExternalSignup => "await_external_signup",
        }
    }
}

/// Handling of entitlement cancellation and deletion events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancellationPolicy {
    /// Leave the four cancellation/deletion events and entitlement
    /// not-found unacknowledged.
    #[default]
    Defer,
    /// Drop the product entry on ENTITLEMENT_CANCELLED; acknowledge the
    /// other cancellation events and entitlement not-found.
    RemoveProduct,
}

impl CancellationPolicy {
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "defer" => Ok(CancellationPolicy::Defer),
            "remove_product" => Ok(CancellationPolicy::RemoveProduct),
            other => Err(PolicyError::Invalid {
                field: "reconcile.cancellation_policy",
                value: other.to_string(),
                expected: "defer | remove_product",
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationPolicy::Defer => "defer",
            CancellationPolicy::RemoveProduct => "remove_product",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilePolicy {
    pub signup: SignupPolicy,
    pub cancellation: CancellationPolicy,
}

impl ReconcilePolicy {
    pub fn from_settings(settings: &ReconcileSettings) -> Result<Self, PolicyError> {
        Ok(Self {
            signup: SignupPolicy::parse(&settings.signup_policy)?,
            cancellation: CancellationPolicy::parse(&settings.cancellation_policy)?,
        })
    }
}
