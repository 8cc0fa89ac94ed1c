use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ActorRef, Lead};

/// Notification kinds a user is ever shown. Anything else is dropped.
pub const DISPLAYABLE_KINDS: &[&str] = &["lead_assigned"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub lead_id: Option<Uuid>,
    pub recipient_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_displayable(&self) -> bool {
        DISPLAYABLE_KINDS.contains(&self.kind.as_str())
    }
}

pub fn lead_assigned(lead: &Lead, closer: &ActorRef, at: DateTime<Utc>) -> Notification {
    let customer = if lead.customer_name.is_empty() {
        "Unknown"
    } else {
        lead.customer_name.as_str()
    };
    Notification {
        kind: "lead_assigned".to_string(),
        lead_id: Some(lead.id),
        recipient_id: closer.id.clone(),
        message: format!("New lead assigned: {customer}"),
        created_at: at,
    }
}

pub fn displayable(notifications: Vec<Notification>) -> Vec<Notification> {
    notifications
        .into_iter()
        .filter(Notification::is_displayable)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(kind: &str) -> Notification {
        Notification {
            kind: kind.to_string(),
            lead_id: None,
            recipient_id: "c-1".to_string(),
            message: "hello".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_allow_listed_kinds_survive() {
        let kept = displayable(vec![
            notification("lead_assigned"),
            notification("lead_updated"),
            notification("system_broadcast"),
            notification("LEAD_ASSIGNED"),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].kind, "lead_assigned");
    }

    #[test]
    fn payload_uses_type_field() {
        let parsed: Notification = serde_json::from_value(serde_json::json!({
            "type": "lead_assigned",
            "leadId": null,
            "recipientId": "c-1",
            "message": "New lead assigned: Avery Lee",
            "createdAt": "2026-02-02T10:00:00Z",
        }))
        .unwrap();
        assert!(parsed.is_displayable());
    }
}
