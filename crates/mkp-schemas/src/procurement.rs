use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the Account approval that gates customer signup.
pub const SIGNUP_APPROVAL_NAME: &str = "signup";

/// Lifecycle state of a named approval on an Account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
    /// Any state this build does not model (e.g. `STATE_UNSPECIFIED`).
    #[serde(other)]
    Unknown,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Pending => "PENDING",
            ApprovalState::Approved => "APPROVED",
            ApprovalState::Rejected => "REJECTED",
            ApprovalState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub name: String,
    pub state: ApprovalState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Approval {
    pub fn new(name: impl Into<String>, state: ApprovalState) -> Self {
        Self {
            name: name.into(),
            state,
            reason: None,
            update_time: None,
        }
    }
}

/// Provider-side Account resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Full resource name: `providers/<provider>/accounts/<id>`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Account lifecycle state, e.g. `ACCOUNT_ACTIVE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Account {
    /// First approval whose name matches `name`.
    pub fn approval(&self, name: &str) -> Option<&Approval> {
        self.approvals.iter().find(|a| a.name == name)
    }

    pub fn signup_approval(&self) -> Option<&Approval> {
        self.approval(SIGNUP_APPROVAL_NAME)
    }

    pub fn account_id(&self) -> &str {
        account_id_from_name(&self.name)
    }
}

/// Entitlement lifecycle states served by the Procurement API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitlementState {
    #[serde(rename = "ENTITLEMENT_ACTIVATION_REQUESTED")]
    ActivationRequested,
    #[serde(rename = "ENTITLEMENT_ACTIVE")]
    Active,
    #[serde(rename = "ENTITLEMENT_PENDING_CANCELLATION")]
    PendingCancellation,
    #[serde(rename = "ENTITLEMENT_CANCELLED")]
    Cancelled,
    #[serde(rename = "ENTITLEMENT_PENDING_PLAN_CHANGE")]
    PendingPlanChange,
    #[serde(rename = "ENTITLEMENT_PENDING_PLAN_CHANGE_APPROVAL")]
    PendingPlanChangeApproval,
    #[serde(rename = "ENTITLEMENT_SUSPENDED")]
    Suspended,
    #[serde(other)]
    Unknown,
}

impl EntitlementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementState::ActivationRequested => "ENTITLEMENT_ACTIVATION_REQUESTED",
            EntitlementState::Active => "ENTITLEMENT_ACTIVE",
            EntitlementState::PendingCancellation => "ENTITLEMENT_PENDING_CANCELLATION",
            EntitlementState::Cancelled => "ENTITLEMENT_CANCELLED",
            EntitlementState::PendingPlanChange => "ENTITLEMENT_PENDING_PLAN_CHANGE",
            EntitlementState::PendingPlanChangeApproval => {
                "ENTITLEMENT_PENDING_PLAN_CHANGE_APPROVAL"
            }
            EntitlementState::Suspended => "ENTITLEMENT_SUSPENDED",
            EntitlementState::Unknown => "ENTITLEMENT_STATE_UNKNOWN",
        }
    }
}

impl fmt::Display for EntitlementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-side Entitlement resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    /// Full resource name: `providers/<provider>/entitlements/<id>`.
    pub name: String,
    /// Owning account resource name: `providers/<provider>/accounts/<id>`.
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub product: String,
    pub plan: String,
    pub state: EntitlementState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_pending_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_reporting_id: Option<String>,
    #[serde(default)]
    pub create_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_to_user: Option<String>,
}

impl Entitlement {
    /// Id of the owning account, derived from the `account` back-reference.
    pub fn account_id(&self) -> &str {
        account_id_from_name(&self.account)
    }

    pub fn entitlement_id(&self) -> &str {
        resource_id(&self.name, "/entitlements/")
    }
}

/// Strip `providers/<provider>/accounts/` from an account resource name.
///
/// A bare id (no `/accounts/` segment) is returned unchanged.
pub fn account_id_from_name(name: &str) -> &str {
    resource_id(name, "/accounts/")
}

fn resource_id<'a>(name: &'a str, collection: &str) -> &'a str {
    match name.rfind(collection) {
        Some(idx) => &name[idx + collection.len()..],
        None => name,
    }
}
