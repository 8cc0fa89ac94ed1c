use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LeadFlowError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeadStatus {
    WaitingAssignment,
    Accepted,
    InProcess,
    Scheduled,
    Sold,
    NoSale,
    Canceled,
    Rescheduled,
    /// Carried through from a document whose status string is not recognised.
    Unknown(String),
}

impl LeadStatus {
    pub const KNOWN: [LeadStatus; 8] = [
        LeadStatus::WaitingAssignment,
        LeadStatus::Accepted,
        LeadStatus::InProcess,
        LeadStatus::Scheduled,
        LeadStatus::Sold,
        LeadStatus::NoSale,
        LeadStatus::Canceled,
        LeadStatus::Rescheduled,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            LeadStatus::WaitingAssignment => "waiting_assignment",
            LeadStatus::Accepted => "accepted",
            LeadStatus::InProcess => "in_process",
            LeadStatus::Scheduled => "scheduled",
            LeadStatus::Sold => "sold",
            LeadStatus::NoSale => "no_sale",
            LeadStatus::Canceled => "canceled",
            LeadStatus::Rescheduled => "rescheduled",
            LeadStatus::Unknown(raw) => raw,
        }
    }

    /// Lenient conversion used at the normalization boundary.
    pub fn from_raw(raw: &str) -> Self {
        raw.parse()
            .unwrap_or_else(|_| LeadStatus::Unknown(raw.to_string()))
    }

    pub fn is_recovery_target(&self) -> bool {
        matches!(self, LeadStatus::Canceled | LeadStatus::NoSale)
    }
}

impl FromStr for LeadStatus {
    type Err = LeadFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadStatus::KNOWN
            .iter()
            .find(|status| status.as_str() == s)
            .cloned()
            .ok_or_else(|| LeadFlowError::UnknownStatus(s.to_string()))
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LeadStatus {
    fn from(value: String) -> Self {
        LeadStatus::from_raw(&value)
    }
}

impl From<LeadStatus> for String {
    fn from(value: LeadStatus) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DispatchType {
    Immediate,
    Scheduled,
}

impl DispatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchType::Immediate => "immediate",
            DispatchType::Scheduled => "scheduled",
        }
    }

    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "scheduled" => DispatchType::Scheduled,
            _ => DispatchType::Immediate,
        }
    }

    /// Status a freshly created lead starts in.
    pub fn initial_status(&self) -> LeadStatus {
        match self {
            DispatchType::Immediate => LeadStatus::WaitingAssignment,
            DispatchType::Scheduled => LeadStatus::Scheduled,
        }
    }
}

impl fmt::Display for DispatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closer or setter as referenced from a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub status: LeadStatus,
    pub dispatch_type: DispatchType,
    pub assigned_closer: Option<ActorRef>,
    pub setter: Option<ActorRef>,
    pub team_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub scheduled_appointment_time: Option<DateTime<Utc>>,
    pub photo_urls: Vec<String>,
    pub disposition_notes: String,
}

impl Lead {
    pub fn closer_name(&self) -> Option<&str> {
        self.assigned_closer.as_ref().map(|c| c.name.as_str())
    }

    pub fn closer_id(&self) -> Option<&str> {
        self.assigned_closer.as_ref().map(|c| c.id.as_str())
    }

    pub fn setter_name(&self) -> Option<&str> {
        self.setter.as_ref().map(|s| s.name.as_str())
    }
}

/// Input for creating a lead.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub customer_name: String,
    pub customer_phone: String,
    pub address: String,
    pub dispatch_type: DispatchType,
    pub setter: ActorRef,
    pub scheduled_appointment_time: Option<DateTime<Utc>>,
    pub photo_urls: Vec<String>,
    pub disposition_notes: String,
}

/// Inline edit of a lead's free-form fields; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct LeadPatch {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<String>,
    pub disposition_notes: Option<String>,
    pub scheduled_appointment_time: Option<DateTime<Utc>>,
}

impl LeadPatch {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.customer_phone.is_none()
            && self.address.is_none()
            && self.disposition_notes.is_none()
            && self.scheduled_appointment_time.is_none()
    }

    pub fn apply(&self, lead: &mut Lead) {
        if let Some(value) = &self.customer_name {
            lead.customer_name = value.clone();
        }
        if let Some(value) = &self.customer_phone {
            lead.customer_phone = value.clone();
        }
        if let Some(value) = &self.address {
            lead.address = value.clone();
        }
        if let Some(value) = &self.disposition_notes {
            lead.disposition_notes = value.clone();
        }
        if let Some(value) = self.scheduled_appointment_time {
            lead.scheduled_appointment_time = Some(value);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Closer {
    pub id: String,
    pub name: String,
    pub team_id: String,
    pub active: bool,
}

impl Closer {
    pub fn to_actor(&self) -> ActorRef {
        ActorRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// One row of the published sales spreadsheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaleRecord {
    pub closer: String,
    pub setter: String,
    pub kilowatts: String,
    pub realization: String,
    pub sale_date: String,
    pub region: String,
}

/// Per-actor totals produced by one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorStat {
    pub name: String,
    pub count: usize,
    pub total: f64,
}

#[derive(Debug, Clone)]
pub struct StatusSummary {
    pub status: LeadStatus,
    pub count: usize,
}
