use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::filter::FilterCriteria;
use crate::leaderboard::{Board, Leaderboard, Metric};
use crate::models::{Lead, SaleRecord, StatusSummary};

pub fn summarize_by_status(leads: &[Lead]) -> Vec<StatusSummary> {
    let mut map: HashMap<String, (usize, &Lead)> = HashMap::new();

    for lead in leads {
        let entry = map.entry(lead.status.to_string()).or_insert((0, lead));
        entry.0 += 1;
    }

    let mut summaries: Vec<StatusSummary> = map
        .into_values()
        .map(|(count, lead)| StatusSummary {
            status: lead.status.clone(),
            count,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.status.as_str().cmp(b.status.as_str()))
    });
    summaries
}

fn write_board(output: &mut String, board: &Leaderboard, limit: usize) {
    let _ = writeln!(output, "## {}", board.board.title());

    if board.entries.is_empty() {
        let _ = writeln!(output, "No qualifying sales in this sheet.");
        return;
    }

    for (rank, stat) in board.top(limit).iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {}: {} deals, {:.1} kW",
            rank + 1,
            stat.name,
            stat.count,
            stat.total
        );
    }
}

pub fn build_report(
    team_id: &str,
    criteria: &FilterCriteria,
    generated_at: DateTime<Utc>,
    leads: &[Lead],
    sales: &[SaleRecord],
) -> String {
    let summaries = summarize_by_status(leads);

    let mut output = String::new();

    let _ = writeln!(output, "# LeadFlow Report");
    let _ = writeln!(
        output,
        "Generated for team {} at {} (status {}, {} leads)",
        team_id,
        generated_at.format("%Y-%m-%d %H:%M"),
        criteria.status,
        leads.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Pipeline");

    if summaries.is_empty() {
        let _ = writeln!(output, "No leads match this view.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(output, "- {}: {} leads", summary.status, summary.count);
        }
    }

    let _ = writeln!(output);
    write_board(
        &mut output,
        &Leaderboard::build(Board::Closers, Metric::Kilowatts, sales),
        10,
    );
    let _ = writeln!(output);
    write_board(
        &mut output,
        &Leaderboard::build(Board::Setters, Metric::Sales, sales),
        10,
    );

    let mut recent: Vec<&Lead> = leads.iter().collect();
    recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recently Updated");

    if recent.is_empty() {
        let _ = writeln!(output, "No leads match this view.");
    } else {
        for lead in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}) with {}: {}",
                lead.customer_name,
                lead.status,
                lead.closer_name().unwrap_or("unassigned"),
                if lead.disposition_notes.is_empty() {
                    "no notes"
                } else {
                    lead.disposition_notes.as_str()
                }
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DispatchType, LeadStatus};
    use uuid::Uuid;

    fn lead(name: &str, status: LeadStatus) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            customer_name: name.to_string(),
            customer_phone: String::new(),
            address: String::new(),
            status,
            dispatch_type: DispatchType::Immediate,
            assigned_closer: None,
            setter: None,
            team_id: "north".to_string(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            scheduled_appointment_time: None,
            photo_urls: Vec::new(),
            disposition_notes: String::new(),
        }
    }

    #[test]
    fn status_breakdown_orders_by_count() {
        let leads = vec![
            lead("a", LeadStatus::Sold),
            lead("b", LeadStatus::NoSale),
            lead("c", LeadStatus::Sold),
            lead("d", LeadStatus::Accepted),
        ];
        let summaries = summarize_by_status(&leads);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].status, LeadStatus::Sold);
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[1].status, LeadStatus::Accepted);
    }

    #[test]
    fn report_lists_sections() {
        let leads = vec![lead("Avery Lee", LeadStatus::Sold)];
        let sales = vec![SaleRecord {
            closer: "Alice".to_string(),
            setter: "Sam".to_string(),
            kilowatts: "5.5".to_string(),
            realization: "1".to_string(),
            ..SaleRecord::default()
        }];
        let report = build_report("north", &FilterCriteria::default(), Utc::now(), &leads, &sales);

        assert!(report.starts_with("# LeadFlow Report"));
        assert!(report.contains("- sold: 1 leads"));
        assert!(report.contains("1. Alice: 1 deals, 5.5 kW"));
        assert!(report.contains("## Top setters"));
        assert!(report.contains("- Avery Lee (sold) with unassigned: no notes"));
    }

    #[test]
    fn empty_inputs_render_placeholders() {
        let report = build_report("north", &FilterCriteria::default(), Utc::now(), &[], &[]);
        assert!(report.contains("No leads match this view."));
        assert!(report.contains("No qualifying sales in this sheet."));
    }
}
