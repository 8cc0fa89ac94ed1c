//! Team-scoped lead operations on top of a [`LeadStore`].
//!
//! The service owns no data. Every read goes to the store and every write is
//! a single store call. Concurrent edits are last-writer-wins.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LeadFlowError, Result};
use crate::export;
use crate::filter::{filter_leads, FilterCriteria};
use crate::models::{ActorRef, Closer, DispatchType, Lead, LeadPatch, LeadStatus, NewLead};
use crate::notifications::{self, Notification};
use crate::status;
use crate::store::LeadStore;
use crate::subscription::LeadView;

pub struct LeadService<S> {
    store: S,
    team_id: String,
}

impl<S: LeadStore> LeadService<S> {
    pub fn new(store: S, team_id: impl Into<String>) -> Self {
        LeadService {
            store,
            team_id: team_id.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub async fn create_lead(&self, new_lead: NewLead) -> Result<Lead> {
        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            customer_name: new_lead.customer_name,
            customer_phone: new_lead.customer_phone,
            address: new_lead.address,
            status: new_lead.dispatch_type.initial_status(),
            dispatch_type: new_lead.dispatch_type,
            assigned_closer: None,
            setter: Some(new_lead.setter),
            team_id: self.team_id.clone(),
            created_at: Some(now),
            updated_at: Some(now),
            scheduled_appointment_time: new_lead.scheduled_appointment_time,
            photo_urls: new_lead.photo_urls,
            disposition_notes: new_lead.disposition_notes,
        };

        self.store.insert_lead(&lead).await?;
        info!(lead_id = %lead.id, team_id = %self.team_id, dispatch = %lead.dispatch_type, "lead created");
        Ok(lead)
    }

    pub async fn leads(&self) -> Result<Vec<Lead>> {
        self.store.fetch_leads(&self.team_id).await
    }

    /// Fetches and filters the team's leads. A failed read yields no leads.
    pub async fn list(&self, criteria: &FilterCriteria) -> Vec<Lead> {
        match self.leads().await {
            Ok(leads) => filter_leads(&leads, criteria, Utc::now()),
            Err(err) => {
                warn!(team_id = %self.team_id, error = %err, "failed to load leads");
                Vec::new()
            }
        }
    }

    pub async fn watch(&self, criteria: FilterCriteria) -> Result<LeadView> {
        let subscription = self.store.subscribe(&self.team_id).await?;
        Ok(LeadView::new(subscription, criteria))
    }

    /// Active closers on the team, the only valid reassignment targets.
    pub async fn closers(&self) -> Result<Vec<Closer>> {
        let closers = self.store.fetch_closers(&self.team_id).await?;
        Ok(closers.into_iter().filter(|closer| closer.active).collect())
    }

    /// Reads a lead and hides it unless it belongs to this team.
    async fn team_lead(&self, id: Uuid) -> Result<Lead> {
        let lead = self.store.fetch_lead(id).await?;
        if lead.team_id != self.team_id {
            debug!(lead_id = %id, team_id = %self.team_id, owner = %lead.team_id, "lead belongs to another team");
            return Err(LeadFlowError::LeadNotFound(id));
        }
        Ok(lead)
    }

    async fn team_closer(&self, closer_id: &str) -> Result<ActorRef> {
        self.closers()
            .await?
            .into_iter()
            .find(|closer| closer.id == closer_id)
            .map(|closer| closer.to_actor())
            .ok_or_else(|| LeadFlowError::CloserNotFound(closer_id.to_string()))
    }

    pub async fn set_status(&self, id: Uuid, next: LeadStatus) -> Result<Lead> {
        let lead = self.team_lead(id).await?;
        status::validate_transition(&lead.status, &next)?;

        let now = Utc::now();
        self.store.update_status(id, &next, now).await?;
        info!(lead_id = %id, from = %lead.status, to = %next, "status updated");

        Ok(Lead {
            status: next,
            updated_at: Some(now),
            ..lead
        })
    }

    pub async fn update_details(&self, id: Uuid, patch: LeadPatch) -> Result<Lead> {
        let mut lead = self.team_lead(id).await?;
        if patch.is_empty() {
            return Ok(lead);
        }

        let now = Utc::now();
        self.store.update_details(id, &patch, now).await?;
        patch.apply(&mut lead);
        lead.updated_at = Some(now);
        info!(lead_id = %id, "lead details updated");
        Ok(lead)
    }

    pub async fn reassign(&self, id: Uuid, closer_id: &str) -> Result<Vec<Notification>> {
        self.bulk_reassign(&[id], closer_id).await
    }

    /// Hands every selected lead to one active closer of the team in a single
    /// atomic write and returns one notification per distinct lead.
    ///
    /// All reads happen before the write, so once the store accepts the
    /// reassignment the call succeeds.
    pub async fn bulk_reassign(&self, ids: &[Uuid], closer_id: &str) -> Result<Vec<Notification>> {
        let mut selected: Vec<Uuid> = Vec::with_capacity(ids.len());
        for id in ids {
            if !selected.contains(id) {
                selected.push(*id);
            }
        }
        if selected.is_empty() {
            return Err(LeadFlowError::EmptySelection);
        }

        let closer = self.team_closer(closer_id).await?;
        let mut leads = Vec::with_capacity(selected.len());
        for id in &selected {
            leads.push(self.team_lead(*id).await?);
        }

        let now = Utc::now();
        let updated = match self.store.reassign(&selected, &closer, now).await {
            Ok(updated) => updated,
            Err(err) => {
                warn!(closer_id, selected = selected.len(), error = %err, "bulk reassignment abandoned");
                return Err(err);
            }
        };
        info!(closer_id, updated, "leads reassigned");

        let sent = leads
            .iter()
            .map(|lead| notifications::lead_assigned(lead, &closer, now))
            .collect();
        Ok(notifications::displayable(sent))
    }

    /// Loads leads from a CSV export of another tool. Rows that do not
    /// deserialize are skipped and counted as such in the log.
    pub async fn import_csv<R: Read>(&self, reader: R) -> Result<usize> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            customer_name: String,
            #[serde(default)]
            customer_phone: String,
            #[serde(default)]
            address: String,
            #[serde(default)]
            status: Option<String>,
            #[serde(default)]
            dispatch_type: Option<String>,
            #[serde(default)]
            setter_id: Option<String>,
            #[serde(default)]
            setter_name: Option<String>,
            #[serde(default)]
            scheduled_at: Option<DateTime<Utc>>,
            #[serde(default)]
            notes: String,
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut inserted = 0usize;
        let mut skipped = 0usize;

        for result in reader.deserialize::<CsvRow>() {
            let row = match result {
                Ok(row) => row,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable lead row");
                    skipped += 1;
                    continue;
                }
            };

            let dispatch_type = row
                .dispatch_type
                .as_deref()
                .map(DispatchType::from_raw)
                .unwrap_or(DispatchType::Immediate);
            let status = row
                .status
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(LeadStatus::from_raw)
                .unwrap_or_else(|| dispatch_type.initial_status());
            let setter = match (row.setter_id, row.setter_name) {
                (None, None) => None,
                (id, name) => Some(ActorRef {
                    id: id.unwrap_or_default(),
                    name: name.unwrap_or_default(),
                }),
            };
            let now = Utc::now();

            let lead = Lead {
                id: Uuid::new_v4(),
                customer_name: row.customer_name,
                customer_phone: row.customer_phone,
                address: row.address,
                status,
                dispatch_type,
                assigned_closer: None,
                setter,
                team_id: self.team_id.clone(),
                created_at: Some(now),
                updated_at: Some(now),
                scheduled_appointment_time: row.scheduled_at,
                photo_urls: Vec::new(),
                disposition_notes: row.notes,
            };
            self.store.insert_lead(&lead).await?;
            inserted += 1;
        }

        if skipped > 0 {
            warn!(skipped, "some lead rows could not be imported");
        }
        Ok(inserted)
    }

    /// Writes exactly the given leads; the caller decides what is selected.
    pub fn export<W: Write>(&self, leads: &[Lead], writer: W) -> Result<usize> {
        let rows = export::write_leads(leads, writer)?;
        info!(rows, team_id = %self.team_id, "leads exported");
        Ok(rows)
    }
}
