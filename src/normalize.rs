//! Raw store documents to typed records.
//!
//! Normalization never fails. Fields that are missing or of the wrong shape
//! fall back to empty strings, `None`, or defaults so a malformed document
//! still shows up in the lead table instead of disappearing.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{ActorRef, Closer, DispatchType, Lead, LeadStatus};

/// A timestamp in any of the shapes the store has been seen to hold.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Text(String),
    Millis(i64),
    Parts {
        seconds: i64,
        #[serde(default)]
        nanoseconds: u32,
    },
}

impl RawTimestamp {
    pub fn to_date(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            RawTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            RawTimestamp::Parts {
                seconds,
                nanoseconds,
            } => Utc.timestamp_opt(*seconds, *nanoseconds).single(),
        }
    }
}

/// Lead document as stored, every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLeadDocument {
    pub id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
    pub dispatch_type: Option<String>,
    pub assigned_closer_id: Option<String>,
    pub assigned_closer_name: Option<String>,
    pub setter_id: Option<String>,
    pub setter_name: Option<String>,
    pub team_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub created_at: Option<RawTimestamp>,
    #[serde(deserialize_with = "lenient")]
    pub updated_at: Option<RawTimestamp>,
    #[serde(deserialize_with = "lenient")]
    pub scheduled_appointment_time: Option<RawTimestamp>,
    pub photo_urls: Option<Vec<String>>,
    pub disposition_notes: Option<String>,
}

/// Deserializes to `None` instead of failing when the value has an
/// unexpected shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

pub fn normalize_lead(raw: RawLeadDocument) -> Lead {
    let assigned_closer = actor(raw.assigned_closer_id, raw.assigned_closer_name);
    let setter = actor(raw.setter_id, raw.setter_name);

    Lead {
        id: raw
            .id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .unwrap_or_else(Uuid::nil),
        customer_name: raw.customer_name.unwrap_or_default(),
        customer_phone: raw.customer_phone.unwrap_or_default(),
        address: raw.address.unwrap_or_default(),
        status: raw
            .status
            .as_deref()
            .map(LeadStatus::from_raw)
            .unwrap_or_else(|| LeadStatus::Unknown(String::new())),
        dispatch_type: raw
            .dispatch_type
            .as_deref()
            .map(DispatchType::from_raw)
            .unwrap_or(DispatchType::Immediate),
        assigned_closer,
        setter,
        team_id: raw.team_id.unwrap_or_default(),
        created_at: raw.created_at.and_then(|ts| ts.to_date()),
        updated_at: raw.updated_at.and_then(|ts| ts.to_date()),
        scheduled_appointment_time: raw.scheduled_appointment_time.and_then(|ts| ts.to_date()),
        photo_urls: raw.photo_urls.unwrap_or_default(),
        disposition_notes: raw.disposition_notes.unwrap_or_default(),
    }
}

/// Normalizes an arbitrary JSON value. Non-object values and objects with
/// badly typed fields still produce a lead.
pub fn normalize_value(value: Value) -> Lead {
    let raw = match serde_json::from_value::<RawLeadDocument>(value.clone()) {
        Ok(raw) => raw,
        Err(_) => salvage(&value),
    };
    normalize_lead(raw)
}

/// Field-by-field recovery when the document as a whole does not deserialize.
fn salvage(value: &Value) -> RawLeadDocument {
    let Some(map) = value.as_object() else {
        return RawLeadDocument::default();
    };
    let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
    let timestamp = |key: &str| {
        map.get(key)
            .and_then(|v| serde_json::from_value::<RawTimestamp>(v.clone()).ok())
    };

    RawLeadDocument {
        id: text("id"),
        customer_name: text("customerName"),
        customer_phone: text("customerPhone"),
        address: text("address"),
        status: text("status"),
        dispatch_type: text("dispatchType"),
        assigned_closer_id: text("assignedCloserId"),
        assigned_closer_name: text("assignedCloserName"),
        setter_id: text("setterId"),
        setter_name: text("setterName"),
        team_id: text("teamId"),
        created_at: timestamp("createdAt"),
        updated_at: timestamp("updatedAt"),
        scheduled_appointment_time: timestamp("scheduledAppointmentTime"),
        photo_urls: map.get("photoUrls").and_then(|v| {
            v.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
        }),
        disposition_notes: text("dispositionNotes"),
    }
}

fn actor(id: Option<String>, name: Option<String>) -> Option<ActorRef> {
    match (id, name) {
        (None, None) => None,
        (id, name) => {
            let id = id.unwrap_or_default();
            let name = name.unwrap_or_default();
            if id.is_empty() && name.is_empty() {
                None
            } else {
                Some(ActorRef { id, name })
            }
        }
    }
}

pub fn normalize_closer(value: &Value) -> Closer {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };
    let name = text("name");

    Closer {
        id: text("id"),
        name: if name.is_empty() {
            "Unknown".to_string()
        } else {
            name
        },
        team_id: text("teamId"),
        active: value.get("active").and_then(Value::as_bool).unwrap_or(true),
    }
}
