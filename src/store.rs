//! The backend seam.
//!
//! Everything that reads or writes leads goes through [`LeadStore`]. The
//! Postgres implementation lives in `db`; [`MemoryStore`] backs the tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{LeadFlowError, Result};
use crate::models::{ActorRef, Closer, Lead, LeadPatch, LeadStatus};
use crate::subscription::Subscription;

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn fetch_leads(&self, team_id: &str) -> Result<Vec<Lead>>;

    async fn fetch_lead(&self, id: Uuid) -> Result<Lead>;

    async fn insert_lead(&self, lead: &Lead) -> Result<()>;

    async fn update_status(&self, id: Uuid, status: &LeadStatus, at: DateTime<Utc>) -> Result<()>;

    async fn update_details(&self, id: Uuid, patch: &LeadPatch, at: DateTime<Utc>) -> Result<()>;

    /// Points every lead in `ids` at `closer` and resets it to
    /// `waiting_assignment`. Either all leads are written or none are.
    /// Returns the number of distinct leads written.
    async fn reassign(&self, ids: &[Uuid], closer: &ActorRef, at: DateTime<Utc>) -> Result<usize>;

    async fn fetch_closers(&self, team_id: &str) -> Result<Vec<Closer>>;

    async fn upsert_closer(&self, closer: &Closer) -> Result<()>;

    async fn subscribe(&self, team_id: &str) -> Result<Subscription>;
}

#[derive(Default)]
struct MemoryState {
    leads: Vec<Lead>,
    closers: Vec<Closer>,
    channels: HashMap<String, watch::Sender<Vec<Lead>>>,
    failing: HashSet<Uuid>,
}

impl MemoryState {
    fn team_snapshot(&self, team_id: &str) -> Vec<Lead> {
        self.leads
            .iter()
            .filter(|lead| lead.team_id == team_id)
            .cloned()
            .collect()
    }

    fn publish(&self, team_id: &str) {
        if let Some(sender) = self.channels.get(team_id) {
            sender.send_replace(self.team_snapshot(team_id));
        }
    }

    fn check_writable(&self, id: Uuid) -> Result<usize> {
        if self.failing.contains(&id) {
            return Err(LeadFlowError::Backend(format!("write to lead {id} rejected")));
        }
        self.leads
            .iter()
            .position(|lead| lead.id == id)
            .ok_or(LeadFlowError::LeadNotFound(id))
    }
}

/// In-process store with the same write semantics as the database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        let store = Self::default();
        store.lock().leads = leads;
        store
    }

    /// Makes every later write touching `id` fail, as a dropped backend
    /// write would.
    pub fn fail_writes_for(&self, id: Uuid) {
        self.lock().failing.insert(id);
    }

    pub fn subscriber_count(&self, team_id: &str) -> usize {
        self.lock()
            .channels
            .get(team_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave a lead half-written,
        // so a poisoned guard is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn fetch_leads(&self, team_id: &str) -> Result<Vec<Lead>> {
        Ok(self.lock().team_snapshot(team_id))
    }

    async fn fetch_lead(&self, id: Uuid) -> Result<Lead> {
        self.lock()
            .leads
            .iter()
            .find(|lead| lead.id == id)
            .cloned()
            .ok_or(LeadFlowError::LeadNotFound(id))
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<()> {
        let mut state = self.lock();
        if state.failing.contains(&lead.id) {
            return Err(LeadFlowError::Backend(format!("write to lead {} rejected", lead.id)));
        }
        state.leads.retain(|existing| existing.id != lead.id);
        state.leads.push(lead.clone());
        state.publish(&lead.team_id);
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: &LeadStatus, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock();
        let index = state.check_writable(id)?;
        let lead = &mut state.leads[index];
        lead.status = status.clone();
        lead.updated_at = Some(at);
        let team_id = lead.team_id.clone();
        state.publish(&team_id);
        Ok(())
    }

    async fn update_details(&self, id: Uuid, patch: &LeadPatch, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock();
        let index = state.check_writable(id)?;
        let lead = &mut state.leads[index];
        patch.apply(lead);
        lead.updated_at = Some(at);
        let team_id = lead.team_id.clone();
        state.publish(&team_id);
        Ok(())
    }

    async fn reassign(&self, ids: &[Uuid], closer: &ActorRef, at: DateTime<Utc>) -> Result<usize> {
        let mut wanted: Vec<Uuid> = Vec::with_capacity(ids.len());
        for id in ids {
            if !wanted.contains(id) {
                wanted.push(*id);
            }
        }

        let mut state = self.lock();
        let indexes = wanted
            .iter()
            .map(|id| state.check_writable(*id))
            .collect::<Result<Vec<usize>>>()?;

        let mut teams = HashSet::new();
        for index in &indexes {
            let lead = &mut state.leads[*index];
            lead.assigned_closer = Some(closer.clone());
            lead.status = LeadStatus::WaitingAssignment;
            lead.updated_at = Some(at);
            teams.insert(lead.team_id.clone());
        }
        for team_id in teams {
            state.publish(&team_id);
        }
        Ok(indexes.len())
    }

    async fn fetch_closers(&self, team_id: &str) -> Result<Vec<Closer>> {
        Ok(self
            .lock()
            .closers
            .iter()
            .filter(|closer| closer.team_id == team_id)
            .cloned()
            .collect())
    }

    async fn upsert_closer(&self, closer: &Closer) -> Result<()> {
        let mut state = self.lock();
        state.closers.retain(|existing| existing.id != closer.id);
        state.closers.push(closer.clone());
        Ok(())
    }

    async fn subscribe(&self, team_id: &str) -> Result<Subscription> {
        let mut state = self.lock();
        let snapshot = state.team_snapshot(team_id);
        let receiver = state
            .channels
            .entry(team_id.to_string())
            .or_insert_with(|| watch::channel(snapshot).0)
            .subscribe();

        let store = self.clone();
        let team = team_id.to_string();
        Ok(Subscription::new(receiver).with_cleanup(move || {
            let mut state = store.lock();
            // The receiver is dropped after this runs, so one remaining
            // receiver means this was the last subscriber.
            if state
                .channels
                .get(&team)
                .is_some_and(|sender| sender.receiver_count() <= 1)
            {
                state.channels.remove(&team);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DispatchType;

    fn lead(team: &str) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            customer_name: "Avery Lee".to_string(),
            customer_phone: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            status: LeadStatus::InProcess,
            dispatch_type: DispatchType::Immediate,
            assigned_closer: None,
            setter: None,
            team_id: team.to_string(),
            created_at: Some(Utc::now()),
            updated_at: None,
            scheduled_appointment_time: None,
            photo_urls: Vec::new(),
            disposition_notes: String::new(),
        }
    }

    fn closer() -> ActorRef {
        ActorRef {
            id: "c-9".to_string(),
            name: "Bob Tran".to_string(),
        }
    }

    #[tokio::test]
    async fn reassign_is_all_or_nothing() {
        let leads = vec![lead("north"), lead("north"), lead("north")];
        let ids: Vec<Uuid> = leads.iter().map(|l| l.id).collect();
        let store = MemoryStore::with_leads(leads);
        store.fail_writes_for(ids[2]);

        let result = store.reassign(&ids, &closer(), Utc::now()).await;
        assert!(result.is_err());
        for lead in store.fetch_leads("north").await.unwrap() {
            assert!(lead.assigned_closer.is_none());
            assert_eq!(lead.status, LeadStatus::InProcess);
        }
    }

    #[tokio::test]
    async fn reassign_counts_each_lead_once() {
        let leads = vec![lead("north"), lead("north")];
        let ids = [leads[0].id, leads[1].id, leads[0].id];
        let store = MemoryStore::with_leads(leads);

        let updated = store.reassign(&ids, &closer(), Utc::now()).await.unwrap();
        assert_eq!(updated, 2);
    }

    #[tokio::test]
    async fn reassign_rejects_missing_leads() {
        let store = MemoryStore::with_leads(vec![lead("north")]);
        let missing = Uuid::new_v4();
        let err = store
            .reassign(&[missing], &closer(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadFlowError::LeadNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn subscribers_see_writes_for_their_team_only() {
        let north = lead("north");
        let south = lead("south");
        let store = MemoryStore::with_leads(vec![north.clone(), south.clone()]);

        let mut subscription = store.subscribe("north").await.unwrap();
        assert_eq!(subscription.current().len(), 1);

        store
            .update_status(north.id, &LeadStatus::Sold, Utc::now())
            .await
            .unwrap();
        let snapshot = subscription.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, LeadStatus::Sold);
    }

    #[tokio::test]
    async fn dropping_last_subscription_releases_channel() {
        let store = MemoryStore::with_leads(vec![lead("north")]);
        let first = store.subscribe("north").await.unwrap();
        let second = store.subscribe("north").await.unwrap();
        assert_eq!(store.subscriber_count("north"), 2);

        drop(first);
        assert_eq!(store.subscriber_count("north"), 1);
        second.unsubscribe();
        assert_eq!(store.subscriber_count("north"), 0);
    }
}
