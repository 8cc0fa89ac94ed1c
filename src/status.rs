//! Legal status edits.
//!
//! Reassignment is not a status edit: it always resets a lead to
//! `waiting_assignment` and is how terminal leads re-enter the pipeline.

use crate::error::{LeadFlowError, Result};
use crate::models::LeadStatus;

const TRANSITIONS: &[(LeadStatus, &[LeadStatus])] = &[
    (
        LeadStatus::WaitingAssignment,
        &[LeadStatus::Accepted, LeadStatus::Canceled],
    ),
    (
        LeadStatus::Accepted,
        &[LeadStatus::InProcess, LeadStatus::Canceled],
    ),
    (
        LeadStatus::Scheduled,
        &[
            LeadStatus::InProcess,
            LeadStatus::Rescheduled,
            LeadStatus::Canceled,
        ],
    ),
    (
        LeadStatus::InProcess,
        &[
            LeadStatus::Sold,
            LeadStatus::NoSale,
            LeadStatus::Canceled,
            LeadStatus::Rescheduled,
        ],
    ),
    (
        LeadStatus::Rescheduled,
        &[LeadStatus::Scheduled, LeadStatus::Canceled],
    ),
];

pub fn allowed_transitions(from: &LeadStatus) -> &'static [LeadStatus] {
    TRANSITIONS
        .iter()
        .find(|(status, _)| status == from)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

pub fn can_transition(from: &LeadStatus, to: &LeadStatus) -> bool {
    allowed_transitions(from).contains(to)
}

pub fn validate_transition(from: &LeadStatus, to: &LeadStatus) -> Result<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(LeadFlowError::IllegalTransition {
            from: from.clone(),
            to: to.clone(),
        })
    }
}
