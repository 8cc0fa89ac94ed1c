use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgListener, PgRow};
use serde_json::json;
use sqlx::{PgPool, Row};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LeadFlowError, Result};
use crate::models::{ActorRef, Closer, Lead, LeadPatch, LeadStatus};
use crate::normalize::{normalize_closer, normalize_lead, RawLeadDocument, RawTimestamp};
use crate::store::LeadStore;
use crate::subscription::Subscription;

/// Channel the `leads_changed` trigger notifies, with the team id as payload.
pub const CHANGE_CHANNEL: &str = "leads_changed";

const LEAD_COLUMNS: &str = "id, customer_name, customer_phone, address, status, dispatch_type, \
     assigned_closer_id, assigned_closer_name, setter_id, setter_name, team_id, \
     created_at, updated_at, scheduled_appointment_time, photo_urls, disposition_notes";

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Rows go through the normalizer like any other stored document, so a
/// column holding something unexpected degrades instead of failing the read.
fn row_to_lead(row: &PgRow) -> Lead {
    let text = |column: &str| row.try_get::<Option<String>, _>(column).ok().flatten();
    let time = |column: &str| {
        row.try_get::<Option<DateTime<Utc>>, _>(column)
            .ok()
            .flatten()
            .map(|at| RawTimestamp::Millis(at.timestamp_millis()))
    };

    normalize_lead(RawLeadDocument {
        id: row
            .try_get::<Uuid, _>("id")
            .ok()
            .map(|id| id.to_string()),
        customer_name: text("customer_name"),
        customer_phone: text("customer_phone"),
        address: text("address"),
        status: text("status"),
        dispatch_type: text("dispatch_type"),
        assigned_closer_id: text("assigned_closer_id"),
        assigned_closer_name: text("assigned_closer_name"),
        setter_id: text("setter_id"),
        setter_name: text("setter_name"),
        team_id: text("team_id"),
        created_at: time("created_at"),
        updated_at: time("updated_at"),
        scheduled_appointment_time: time("scheduled_appointment_time"),
        photo_urls: row.try_get::<Vec<String>, _>("photo_urls").ok(),
        disposition_notes: text("disposition_notes"),
    })
}

async fn fetch_team_leads(pool: &PgPool, team_id: &str) -> Result<Vec<Lead>> {
    let query = format!(
        "SELECT {LEAD_COLUMNS} FROM leadflow.leads WHERE team_id = $1 ORDER BY created_at DESC NULLS LAST"
    );
    let rows = sqlx::query(&query).bind(team_id).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_lead).collect())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LeadStore for PgStore {
    async fn fetch_leads(&self, team_id: &str) -> Result<Vec<Lead>> {
        fetch_team_leads(&self.pool, team_id).await
    }

    async fn fetch_lead(&self, id: Uuid) -> Result<Lead> {
        let query = format!("SELECT {LEAD_COLUMNS} FROM leadflow.leads WHERE id = $1");
        sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_lead(&row))
            .ok_or(LeadFlowError::LeadNotFound(id))
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leadflow.leads
            (id, customer_name, customer_phone, address, status, dispatch_type,
             assigned_closer_id, assigned_closer_name, setter_id, setter_name, team_id,
             created_at, updated_at, scheduled_appointment_time, photo_urls, disposition_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE
            SET customer_name = EXCLUDED.customer_name,
                customer_phone = EXCLUDED.customer_phone,
                address = EXCLUDED.address,
                status = EXCLUDED.status,
                dispatch_type = EXCLUDED.dispatch_type,
                assigned_closer_id = EXCLUDED.assigned_closer_id,
                assigned_closer_name = EXCLUDED.assigned_closer_name,
                setter_id = EXCLUDED.setter_id,
                setter_name = EXCLUDED.setter_name,
                team_id = EXCLUDED.team_id,
                updated_at = EXCLUDED.updated_at,
                scheduled_appointment_time = EXCLUDED.scheduled_appointment_time,
                photo_urls = EXCLUDED.photo_urls,
                disposition_notes = EXCLUDED.disposition_notes
            "#,
        )
        .bind(lead.id)
        .bind(&lead.customer_name)
        .bind(&lead.customer_phone)
        .bind(&lead.address)
        .bind(lead.status.as_str())
        .bind(lead.dispatch_type.as_str())
        .bind(lead.closer_id())
        .bind(lead.closer_name())
        .bind(lead.setter.as_ref().map(|s| s.id.as_str()))
        .bind(lead.setter_name())
        .bind(&lead.team_id)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .bind(lead.scheduled_appointment_time)
        .bind(&lead.photo_urls)
        .bind(&lead.disposition_notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: &LeadStatus, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE leadflow.leads SET status = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LeadFlowError::LeadNotFound(id));
        }
        Ok(())
    }

    async fn update_details(&self, id: Uuid, patch: &LeadPatch, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE leadflow.leads
            SET customer_name = COALESCE($1, customer_name),
                customer_phone = COALESCE($2, customer_phone),
                address = COALESCE($3, address),
                disposition_notes = COALESCE($4, disposition_notes),
                scheduled_appointment_time = COALESCE($5, scheduled_appointment_time),
                updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(patch.customer_name.as_deref())
        .bind(patch.customer_phone.as_deref())
        .bind(patch.address.as_deref())
        .bind(patch.disposition_notes.as_deref())
        .bind(patch.scheduled_appointment_time)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LeadFlowError::LeadNotFound(id));
        }
        Ok(())
    }

    async fn reassign(&self, ids: &[Uuid], closer: &ActorRef, at: DateTime<Utc>) -> Result<usize> {
        let wanted: Vec<Uuid> = ids
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let mut tx = self.pool.begin().await?;

        let found: HashSet<Uuid> = sqlx::query("SELECT id FROM leadflow.leads WHERE id = ANY($1) FOR UPDATE")
            .bind(&wanted)
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|row| row.get("id"))
            .collect();

        if let Some(missing) = ids.iter().find(|id| !found.contains(*id)) {
            tx.rollback().await?;
            return Err(LeadFlowError::LeadNotFound(*missing));
        }

        let result = sqlx::query(
            r#"
            UPDATE leadflow.leads
            SET assigned_closer_id = $1,
                assigned_closer_name = $2,
                status = $3,
                updated_at = $4
            WHERE id = ANY($5)
            "#,
        )
        .bind(&closer.id)
        .bind(&closer.name)
        .bind(LeadStatus::WaitingAssignment.as_str())
        .bind(at)
        .bind(&wanted)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() as usize != wanted.len() {
            tx.rollback().await?;
            return Err(LeadFlowError::Backend(format!(
                "reassignment touched {} of {} leads",
                result.rows_affected(),
                wanted.len()
            )));
        }

        tx.commit().await?;
        Ok(wanted.len())
    }

    async fn fetch_closers(&self, team_id: &str) -> Result<Vec<Closer>> {
        let rows = sqlx::query(
            "SELECT id, name, team_id, active FROM leadflow.closers WHERE team_id = $1 ORDER BY name",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_closer).collect())
    }

    async fn upsert_closer(&self, closer: &Closer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leadflow.closers (id, name, team_id, active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, team_id = EXCLUDED.team_id, active = EXCLUDED.active
            "#,
        )
        .bind(&closer.id)
        .bind(&closer.name)
        .bind(&closer.team_id)
        .bind(closer.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn subscribe(&self, team_id: &str) -> Result<Subscription> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let initial = fetch_team_leads(&self.pool, team_id).await?;
        let (sender, receiver) = watch::channel(initial);
        let pool = self.pool.clone();
        let team = team_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(err) => {
                        warn!(team_id = %team, error = %err, "lead listener stopped");
                        break;
                    }
                };
                if notification.payload() != team {
                    continue;
                }

                match fetch_team_leads(&pool, &team).await {
                    Ok(leads) => {
                        debug!(team_id = %team, leads = leads.len(), "lead snapshot refreshed");
                        if sender.send(leads).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(team_id = %team, error = %err, "failed to refresh leads"),
                }
            }
        });

        Ok(Subscription::new(receiver).with_cleanup(move || task.abort()))
    }
}

/// Closer rows share the document normalizer's defaults: a blank name
/// reads as "Unknown" and a missing flag as active.
fn row_to_closer(row: &PgRow) -> Closer {
    let id: Option<String> = row.try_get("id").ok();
    let name: Option<String> = row.try_get("name").ok();
    let team_id: Option<String> = row.try_get("team_id").ok();
    let active: Option<bool> = row.try_get("active").ok();

    normalize_closer(&json!({
        "id": id,
        "name": name,
        "teamId": team_id,
        "active": active,
    }))
}
