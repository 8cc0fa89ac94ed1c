//! Demo data for a fresh team. Ids are fixed so reseeding overwrites
//! instead of duplicating.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{LeadFlowError, Result};
use crate::models::{ActorRef, Closer, DispatchType, Lead, LeadStatus};
use crate::store::LeadStore;

pub async fn seed<S: LeadStore + ?Sized>(store: &S, team_id: &str) -> Result<usize> {
    let closers = [
        ("closer-alice", "Alice Park"),
        ("closer-bob", "Bob Tran"),
    ];
    for (id, name) in closers {
        store
            .upsert_closer(&Closer {
                id: id.to_string(),
                name: name.to_string(),
                team_id: team_id.to_string(),
                active: true,
            })
            .await?;
    }

    let setter = ActorRef {
        id: "setter-sam".to_string(),
        name: "Sam Reed".to_string(),
    };
    let alice = ActorRef {
        id: "closer-alice".to_string(),
        name: "Alice Park".to_string(),
    };

    let leads = [
        (
            "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            "Avery Lee",
            "555-0100",
            "12 Harbor Rd",
            LeadStatus::WaitingAssignment,
            DispatchType::Immediate,
            None,
            0,
        ),
        (
            "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
            "Jules Moreno",
            "555-0101",
            "48 Cedar Ln",
            LeadStatus::Scheduled,
            DispatchType::Scheduled,
            Some(alice.clone()),
            2,
        ),
        (
            "d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2",
            "Kiara Patel",
            "555-0102",
            "7 Summit Ave",
            LeadStatus::NoSale,
            DispatchType::Immediate,
            Some(alice),
            9,
        ),
    ];

    let now = Utc::now();
    let mut written = 0usize;
    for (id, name, phone, address, status, dispatch_type, closer, days_ago) in leads {
        let id = Uuid::parse_str(id).map_err(|err| LeadFlowError::Backend(err.to_string()))?;
        let created = now - Duration::days(days_ago);
        let scheduled = match dispatch_type {
            DispatchType::Scheduled => Some(now + Duration::days(1)),
            DispatchType::Immediate => None,
        };

        store
            .insert_lead(&Lead {
                id,
                customer_name: name.to_string(),
                customer_phone: phone.to_string(),
                address: address.to_string(),
                status,
                dispatch_type,
                assigned_closer: closer,
                setter: Some(setter.clone()),
                team_id: team_id.to_string(),
                created_at: Some(created),
                updated_at: Some(created),
                scheduled_appointment_time: scheduled,
                photo_urls: Vec::new(),
                disposition_notes: String::new(),
            })
            .await?;
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn reseeding_is_idempotent() {
        let store = MemoryStore::new();
        seed(&store, "north").await.unwrap();
        seed(&store, "north").await.unwrap();

        assert_eq!(store.fetch_leads("north").await.unwrap().len(), 3);
        assert_eq!(store.fetch_closers("north").await.unwrap().len(), 2);
    }
}
