//! Event normalizer: raw payload bytes -> typed [`Event`].

use mkp_schemas::{EventType, ProcurementMessage};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not a valid procurement message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload has no event_type")]
    MissingEventType,
    #[error("payload has neither an account nor an entitlement id")]
    MissingSubject,
    #[error("payload carries both an account and an entitlement id")]
    AmbiguousSubject,
    #[error("payload id {0:?} is not a plain resource id")]
    InvalidId(String),
}

/// The resource an event is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Account {
        account_id: String,
    },
    Entitlement {
        entitlement_id: String,
        /// Target plan carried by plan-change messages.
        new_plan: Option<String>,
    },
}

impl Subject {
    pub fn kind(&self) -> &'static str {
        match self {
            Subject::Account { .. } => "account",
            Subject::Entitlement { .. } => "entitlement",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Subject::Account { account_id } => account_id,
            Subject::Entitlement { entitlement_id, .. } => entitlement_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_id: Option<String>,
    pub event_type: EventType,
    pub subject: Subject,
}

/// Decode one inbound payload.
///
/// `Ok(None)` for an empty or whitespace-only payload: nothing to do, acknowledge.
/// Anything else that is not exactly one subject with a non-empty id and a
/// known event type is a [`DecodeError`]. Ids must be a single resource id:
/// no `/`, `?`, `#` and no dot segments.
pub fn normalize(raw: &[u8]) -> Result<Option<Event>, DecodeError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let msg: ProcurementMessage = serde_json::from_slice(raw)?;
    let event_type = msg.event_type.ok_or(DecodeError::MissingEventType)?;

    let account_id = msg
        .account
        .map(|a| a.id.trim().to_string())
        .filter(|id| !id.is_empty());
    let entitlement = msg.entitlement.and_then(|e| {
        let id = e.id.trim().to_string();
        (!id.is_empty()).then_some((id, e.new_plan.filter(|p| !p.trim().is_empty())))
    });

    let subject = match (account_id, entitlement) {
        (Some(account_id), None) => Subject::Account { account_id },
        (None, Some((entitlement_id, new_plan))) => Subject::Entitlement {
            entitlement_id,
            new_plan,
        },
        (Some(_), Some(_)) => return Err(DecodeError::AmbiguousSubject),
        (None, None) => return Err(DecodeError::MissingSubject),
    };
    check_id(subject.id())?;

    Ok(Some(Event {
        event_id: msg.event_id,
        event_type,
        subject,
    }))
}

fn check_id(id: &str) -> Result<(), DecodeError> {
    if id == "." || id == ".." || id.contains(['/', '?', '#']) {
        return Err(DecodeError::InvalidId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_none() {
        assert!(normalize(b"").unwrap().is_none());
        assert!(normalize(b"  \n").unwrap().is_none());
    }

    #[test]
    fn account_message() {
        let ev = normalize(br#"{"eventId":"e1","eventType":"ACCOUNT_ACTIVE","account":{"id":"acct-1"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(ev.event_type, EventType::AccountActive);
        assert_eq!(
            ev.subject,
            Subject::Account {
                account_id: "acct-1".to_string()
            }
        );
        assert_eq!(ev.event_id.as_deref(), Some("e1"));
    }

    #[test]
    fn entitlement_message_keeps_new_plan() {
        let ev = normalize(
            br#"{"event_type":"ENTITLEMENT_PLAN_CHANGE_REQUESTED",
                 "entitlement":{"id":"ent-1","new_plan":"pro"}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(ev.subject.kind(), "entitlement");
        assert_eq!(ev.subject.id(), "ent-1");
        assert_eq!(
            ev.subject,
            Subject::Entitlement {
                entitlement_id: "ent-1".to_string(),
                new_plan: Some("pro".to_string())
            }
        );
    }

    #[test]
    fn empty_subject_id_counts_as_absent() {
        let ev = normalize(
            br#"{"eventType":"ENTITLEMENT_ACTIVE","account":{"id":""},"entitlement":{"id":"ent-1"}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(ev.subject.kind(), "entitlement");
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(normalize(b"{not json"), Err(DecodeError::Json(_))));
        assert!(matches!(
            normalize(br#"{"eventType":"ENTITLEMENT_SUSPENDED","entitlement":{"id":"e"}}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            normalize(br#"{"account":{"id":"a"}}"#),
            Err(DecodeError::MissingEventType)
        ));
        assert!(matches!(
            normalize(br#"{"eventType":"ACCOUNT_ACTIVE"}"#),
            Err(DecodeError::MissingSubject)
        ));
        assert!(matches!(
            normalize(br#"{"eventType":"ACCOUNT_ACTIVE","account":{"id":"  "}}"#),
            Err(DecodeError::MissingSubject)
        ));
        assert!(matches!(
            normalize(
                br#"{"eventType":"ACCOUNT_ACTIVE","account":{"id":"a"},"entitlement":{"id":"e"}}"#
            ),
            Err(DecodeError::AmbiguousSubject)
        ));
    }

    #[test]
    fn ids_that_are_not_single_resource_ids_are_rejected() {
        for id in ["x/../../OTHER/entitlements/v", "ent-1?x=1", "ent#1", "..", "."] {
            let raw = serde_json::json!({
                "eventType": "ENTITLEMENT_ACTIVE",
                "entitlement": {"id": id}
            })
            .to_string();
            assert!(
                matches!(normalize(raw.as_bytes()), Err(DecodeError::InvalidId(ref got)) if got == id),
                "id {id:?} accepted"
            );
        }
        assert!(matches!(
            normalize(br#"{"eventType":"ACCOUNT_ACTIVE","account":{"id":"a/b"}}"#),
            Err(DecodeError::InvalidId(_))
        ));
        assert!(normalize(br#"{"eventType":"ACCOUNT_ACTIVE","account":{"id":"acct-1.v2"}}"#).is_ok());
    }
}
