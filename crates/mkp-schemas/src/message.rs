use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of event types published by the procurement service.
///
/// Decoding an unlisted value is an error; there is no catch-all variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    AccountActive,
    AccountDeleted,
    EntitlementCreationRequested,
    EntitlementActive,
    EntitlementPlanChangeRequested,
    EntitlementPlanChanged,
    EntitlementPlanChangeCancelled,
    EntitlementPendingCancellation,
    EntitlementCancellationReverted,
    EntitlementCancelled,
    EntitlementDeleted,
}

impl EventType {
    pub const ALL: [EventType; 11] = [
        EventType::AccountActive,
        EventType::AccountDeleted,
        EventType::EntitlementCreationRequested,
        EventType::EntitlementActive,
        EventType::EntitlementPlanChangeRequested,
        EventType::EntitlementPlanChanged,
        EventType::EntitlementPlanChangeCancelled,
        EventType::EntitlementPendingCancellation,
        EventType::EntitlementCancellationReverted,
        EventType::EntitlementCancelled,
        EventType::EntitlementDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AccountActive => "ACCOUNT_ACTIVE",
            EventType::AccountDeleted => "ACCOUNT_DELETED",
            EventType::EntitlementCreationRequested => "ENTITLEMENT_CREATION_REQUESTED",
            EventType::EntitlementActive => "ENTITLEMENT_ACTIVE",
            EventType::EntitlementPlanChangeRequested => "ENTITLEMENT_PLAN_CHANGE_REQUESTED",
            EventType::EntitlementPlanChanged => "ENTITLEMENT_PLAN_CHANGED",
            EventType::EntitlementPlanChangeCancelled => "ENTITLEMENT_PLAN_CHANGE_CANCELLED",
            EventType::EntitlementPendingCancellation => "ENTITLEMENT_PENDING_CANCELLATION",
            EventType::EntitlementCancellationReverted => "ENTITLEMENT_CANCELLATION_REVERTED",
            EventType::EntitlementCancelled => "ENTITLEMENT_CANCELLED",
            EventType::EntitlementDeleted => "ENTITLEMENT_DELETED",
        }
    }

    pub fn is_account_event(&self) -> bool {
        matches!(self, EventType::AccountActive | EventType::AccountDeleted)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account subject of an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    #[serde(default)]
    pub id: String,
    #[serde(
        default,
        rename = "updateTime",
        alias = "update_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub update_time: Option<String>,
}

/// Entitlement subject of an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRef {
    #[serde(default)]
    pub id: String,
    #[serde(
        default,
        rename = "newPlan",
        alias = "new_plan",
        skip_serializing_if = "Option::is_none"
    )]
    pub new_plan: Option<String>,
    #[serde(
        default,
        rename = "updateTime",
        alias = "update_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub update_time: Option<String>,
}

/// Raw inbound message body as published by the procurement service.
///
/// Both the service's camelCase keys and snake_case keys are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementMessage {
    #[serde(
        default,
        rename = "eventId",
        alias = "event_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub event_id: Option<String>,
    #[serde(
        default,
        rename = "eventType",
        alias = "event_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub event_type: Option<EventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlement: Option<EntitlementRef>,
}
