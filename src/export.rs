use std::io::Write;

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::error::Result;
use crate::filter::StatusFilter;
use crate::models::Lead;

pub const HEADER: [&str; 10] = [
    "Customer Name",
    "Phone",
    "Address",
    "Status",
    "Dispatch Type",
    "Assigned Closer",
    "Setter",
    "Created At",
    "Updated At",
    "Scheduled Time",
];

/// What the exported rows were chosen by; only affects the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    Filtered(StatusFilter),
    Selected,
}

impl ExportScope {
    pub fn file_name(&self, date: NaiveDate) -> String {
        let prefix = match self {
            ExportScope::Filtered(status) => status.label(),
            ExportScope::Selected => "selected",
        };
        format!("{prefix}-leads-export-{}.csv", date.format("%Y-%m-%d"))
    }
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn row(lead: &Lead) -> [String; 10] {
    [
        lead.customer_name.clone(),
        lead.customer_phone.clone(),
        lead.address.clone(),
        lead.status.to_string(),
        lead.dispatch_type.to_string(),
        lead.closer_name().unwrap_or_default().to_string(),
        lead.setter_name().unwrap_or_default().to_string(),
        format_time(lead.created_at),
        format_time(lead.updated_at),
        format_time(lead.scheduled_appointment_time),
    ]
}

/// Writes exactly `leads`, one row each, and returns the row count.
pub fn write_leads<W: Write>(leads: &[Lead], writer: W) -> Result<usize> {
    let mut csv = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    csv.write_record(HEADER)?;
    for lead in leads {
        csv.write_record(row(lead))?;
    }
    csv.flush()?;
    Ok(leads.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorRef, DispatchType, LeadStatus};
    use uuid::Uuid;

    fn lead(name: &str) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            customer_name: name.to_string(),
            customer_phone: "555-0100".to_string(),
            address: "1 Main St, Apt \"B\"".to_string(),
            status: LeadStatus::NoSale,
            dispatch_type: DispatchType::Scheduled,
            assigned_closer: Some(ActorRef {
                id: "c-1".to_string(),
                name: "Alice Park".to_string(),
            }),
            setter: None,
            team_id: "north".to_string(),
            created_at: Some(Utc::now()),
            updated_at: None,
            scheduled_appointment_time: None,
            photo_urls: Vec::new(),
            disposition_notes: String::new(),
        }
    }

    #[test]
    fn every_field_is_quoted() {
        let mut out = Vec::new();
        write_leads(&[lead("Avery Lee")], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "\"Customer Name\",\"Phone\",\"Address\",\"Status\",\"Dispatch Type\",\"Assigned Closer\",\"Setter\",\"Created At\",\"Updated At\",\"Scheduled Time\""
        );
        let data = lines.next().unwrap();
        assert!(data.starts_with("\"Avery Lee\",\"555-0100\",\"1 Main St, Apt \"\"B\"\"\",\"no_sale\",\"scheduled\",\"Alice Park\",\"\","));
        assert!(data.ends_with(",\"\",\"\""));
    }

    #[test]
    fn dates_use_second_precision() {
        let at = Utc::now();
        let formatted = format_time(Some(at));
        assert_eq!(formatted.len(), "2026-02-02 10:00:00".len());
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[10..11], " ");
    }

    #[test]
    fn row_count_matches_input() {
        let leads: Vec<Lead> = (0..7).map(|i| lead(&format!("Lead {i}"))).collect();
        let mut out = Vec::new();
        let written = write_leads(&leads, &mut out).unwrap();
        assert_eq!(written, 7);

        let mut reader = csv::Reader::from_reader(out.as_slice());
        assert_eq!(reader.records().count(), 7);
    }

    #[test]
    fn file_names_follow_scope() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        assert_eq!(
            ExportScope::Filtered(StatusFilter::Recovery).file_name(date),
            "recovery-leads-export-2026-02-02.csv"
        );
        assert_eq!(
            ExportScope::Filtered(StatusFilter::All).file_name(date),
            "all-leads-export-2026-02-02.csv"
        );
        assert_eq!(
            ExportScope::Selected.file_name(date),
            "selected-leads-export-2026-02-02.csv"
        );
    }
}
