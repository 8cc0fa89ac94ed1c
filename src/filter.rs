use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, Utc};

use crate::error::LeadFlowError;
use crate::models::{DispatchType, Lead, LeadStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    /// Canceled and no-sale leads, the re-engagement pool.
    Recovery,
    Only(LeadStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: &LeadStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Recovery => status.is_recovery_target(),
            StatusFilter::Only(wanted) => wanted == status,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Recovery => "recovery",
            StatusFilter::Only(status) => status.as_str(),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = LeadFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatusFilter::All),
            "recovery" => Ok(StatusFilter::Recovery),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchFilter {
    #[default]
    All,
    Only(DispatchType),
}

impl DispatchFilter {
    pub fn matches(&self, dispatch: DispatchType) -> bool {
        match self {
            DispatchFilter::All => true,
            DispatchFilter::Only(wanted) => *wanted == dispatch,
        }
    }
}

impl FromStr for DispatchFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(DispatchFilter::All),
            "immediate" => Ok(DispatchFilter::Only(DispatchType::Immediate)),
            "scheduled" => Ok(DispatchFilter::Only(DispatchType::Scheduled)),
            other => Err(format!("unknown dispatch filter: {other}")),
        }
    }
}

/// Creation-date bucket. `Week` and `Month` are trailing windows measured
/// back from now, not calendar weeks or months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateFilter {
    pub fn matches(&self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let window = match self {
            DateFilter::All => return true,
            DateFilter::Today => {
                return created_at.is_some_and(|at| {
                    at.with_timezone(&Local).date_naive() == now.with_timezone(&Local).date_naive()
                })
            }
            DateFilter::Week => Duration::days(7),
            DateFilter::Month => Duration::days(30),
        };
        created_at.is_some_and(|at| at >= now - window)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search_term: String,
    pub status: StatusFilter,
    pub dispatch: DispatchFilter,
    pub date: DateFilter,
}

impl FilterCriteria {
    pub fn matches(&self, lead: &Lead, now: DateTime<Utc>) -> bool {
        matches_search(lead, &self.search_term)
            && self.status.matches(&lead.status)
            && self.dispatch.matches(lead.dispatch_type)
            && self.date.matches(lead.created_at, now)
    }
}

fn matches_search(lead: &Lead, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    let contains = |field: &str| field.to_lowercase().contains(&needle);

    contains(&lead.customer_name)
        || lead.customer_phone.contains(term)
        || contains(&lead.address)
        || lead.closer_name().is_some_and(contains)
        || lead.setter_name().is_some_and(contains)
}

/// Returns the leads satisfying every active predicate, in input order.
pub fn filter_leads(records: &[Lead], criteria: &FilterCriteria, now: DateTime<Utc>) -> Vec<Lead> {
    records
        .iter()
        .filter(|lead| criteria.matches(lead, now))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActorRef;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn lead(
        name: &str,
        status: LeadStatus,
        dispatch: DispatchType,
        age: Duration,
        now: DateTime<Utc>,
    ) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            customer_name: name.to_string(),
            customer_phone: "(555) 010-2233".to_string(),
            address: "12 Harbor Rd".to_string(),
            status,
            dispatch_type: dispatch,
            assigned_closer: Some(ActorRef {
                id: "c-1".to_string(),
                name: "Alice Park".to_string(),
            }),
            setter: Some(ActorRef {
                id: "s-1".to_string(),
                name: "Sam Reed".to_string(),
            }),
            team_id: "north".to_string(),
            created_at: Some(now - age),
            updated_at: Some(now - age),
            scheduled_appointment_time: None,
            photo_urls: Vec::new(),
            disposition_notes: String::new(),
        }
    }

    /// Local noon, far from any midnight.
    fn fixed_now() -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 6, 15, 12, 0, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sample(now: DateTime<Utc>) -> Vec<Lead> {
        vec![
            lead("Avery Lee", LeadStatus::Sold, DispatchType::Immediate, Duration::zero(), now),
            lead("Jules Moreno", LeadStatus::Canceled, DispatchType::Scheduled, Duration::days(3), now),
            lead("Kiara Patel", LeadStatus::NoSale, DispatchType::Immediate, Duration::days(12), now),
            lead("Noor Haddad", LeadStatus::InProcess, DispatchType::Scheduled, Duration::days(45), now),
        ]
    }

    fn by_date(date: DateFilter) -> FilterCriteria {
        FilterCriteria {
            date,
            ..FilterCriteria::default()
        }
    }

    #[test]
    fn default_criteria_is_identity() {
        let now = fixed_now();
        let leads = sample(now);
        let filtered = filter_leads(&leads, &FilterCriteria::default(), now);
        assert_eq!(filtered, leads);
    }

    #[test]
    fn output_is_a_subset_of_input() {
        let now = fixed_now();
        let leads = sample(now);
        let criteria = FilterCriteria {
            search_term: "a".to_string(),
            status: StatusFilter::Recovery,
            dispatch: DispatchFilter::All,
            date: DateFilter::Month,
        };
        for kept in filter_leads(&leads, &criteria, now) {
            assert!(leads.contains(&kept));
        }
    }

    #[test]
    fn recovery_is_union_of_canceled_and_no_sale() {
        let now = fixed_now();
        let leads = sample(now);
        let by_status = |status: LeadStatus| FilterCriteria {
            status: StatusFilter::Only(status),
            ..FilterCriteria::default()
        };

        let recovery = filter_leads(
            &leads,
            &FilterCriteria {
                status: StatusFilter::Recovery,
                ..FilterCriteria::default()
            },
            now,
        );
        let canceled = filter_leads(&leads, &by_status(LeadStatus::Canceled), now);
        let no_sale = filter_leads(&leads, &by_status(LeadStatus::NoSale), now);

        assert_eq!(recovery.len(), canceled.len() + no_sale.len());
        for lead in canceled.iter().chain(no_sale.iter()) {
            assert!(recovery.contains(lead));
        }
    }

    #[test]
    fn search_is_case_insensitive_except_phone() {
        let now = fixed_now();
        let mut leads = sample(now);
        leads[1].address = "48 Cedar Ln".to_string();
        let search = |term: &str| FilterCriteria {
            search_term: term.to_string(),
            ..FilterCriteria::default()
        };

        assert_eq!(filter_leads(&leads, &search("kiara"), now).len(), 1);
        assert_eq!(filter_leads(&leads, &search("ALICE"), now).len(), 4);
        assert_eq!(filter_leads(&leads, &search("sam reed"), now).len(), 4);
        assert_eq!(filter_leads(&leads, &search("010-2233"), now).len(), 4);
        assert_eq!(filter_leads(&leads, &search("5550102233"), now).len(), 0);

        let by_address = filter_leads(&leads, &search("CEDAR"), now);
        assert_eq!(by_address.len(), 1);
        assert_eq!(by_address[0].customer_name, "Jules Moreno");
        assert_eq!(filter_leads(&leads, &search("harbor rd"), now).len(), 3);
    }

    #[test]
    fn date_windows_are_rolling() {
        let now = fixed_now();
        let leads = sample(now);

        assert_eq!(filter_leads(&leads, &by_date(DateFilter::Today), now).len(), 1);
        assert_eq!(filter_leads(&leads, &by_date(DateFilter::Week), now).len(), 2);
        assert_eq!(filter_leads(&leads, &by_date(DateFilter::Month), now).len(), 3);
    }

    #[test]
    fn today_starts_at_local_midnight() {
        let midnight = Local
            .with_ymd_and_hms(2026, 6, 15, 0, 0, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        let now = midnight + Duration::minutes(30);
        let late_yesterday = lead(
            "Rin Sato",
            LeadStatus::WaitingAssignment,
            DispatchType::Immediate,
            Duration::minutes(31),
            now,
        );
        let at_midnight = lead(
            "Tomas Reyes",
            LeadStatus::WaitingAssignment,
            DispatchType::Immediate,
            Duration::minutes(30),
            now,
        );
        let leads = vec![late_yesterday, at_midnight];

        let today = filter_leads(&leads, &by_date(DateFilter::Today), now);
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].customer_name, "Tomas Reyes");
        assert_eq!(filter_leads(&leads, &by_date(DateFilter::Week), now).len(), 2);
    }

    #[test]
    fn missing_created_at_fails_every_active_window() {
        let now = fixed_now();
        let mut undated = lead("Rin Sato", LeadStatus::Accepted, DispatchType::Immediate, Duration::zero(), now);
        undated.created_at = None;
        let leads = [undated];

        for date in [DateFilter::Today, DateFilter::Week, DateFilter::Month] {
            assert!(filter_leads(&leads, &by_date(date), now).is_empty(), "{date:?}");
        }
        assert_eq!(filter_leads(&leads, &by_date(DateFilter::All), now).len(), 1);
    }

    #[test]
    fn predicates_are_anded() {
        let now = fixed_now();
        let leads = sample(now);
        let criteria = FilterCriteria {
            search_term: String::new(),
            status: StatusFilter::Recovery,
            dispatch: DispatchFilter::Only(DispatchType::Immediate),
            date: DateFilter::All,
        };
        let filtered = filter_leads(&leads, &criteria, now);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].customer_name, "Kiara Patel");
    }

    #[test]
    fn scheduled_lead_without_appointment_passes_all_dates() {
        let now = fixed_now();
        let mut pending = lead("Rin Sato", LeadStatus::Scheduled, DispatchType::Scheduled, Duration::days(90), now);
        pending.scheduled_appointment_time = None;
        pending.created_at = None;

        let filtered = filter_leads(&[pending], &FilterCriteria::default(), now);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn parses_status_filters() {
        assert_eq!("recovery".parse::<StatusFilter>().unwrap(), StatusFilter::Recovery);
        assert_eq!(
            "no_sale".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(LeadStatus::NoSale)
        );
        assert!("lost".parse::<StatusFilter>().is_err());
    }
}
