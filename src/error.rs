//! Error type shared by the library modules.
//!
//! The binary wraps these in `anyhow` at the edge; inside the crate every
//! fallible operation returns `LeadFlowError` so callers can match on the
//! cases they care about (a rejected status edit, a missing lead).

use thiserror::Error;
use uuid::Uuid;

use crate::models::LeadStatus;

#[derive(Debug, Error)]
pub enum LeadFlowError {
    #[error("lead {0} not found")]
    LeadNotFound(Uuid),

    #[error("closer {0} not found")]
    CloserNotFound(String),

    #[error("illegal status transition from {from} to {to}")]
    IllegalTransition { from: LeadStatus, to: LeadStatus },

    #[error("unknown lead status: {0}")]
    UnknownStatus(String),

    #[error("no leads selected")]
    EmptySelection,

    #[error("{0} must be set")]
    MissingSetting(&'static str),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for LeadFlowError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => LeadFlowError::Backend("row not found".to_string()),
            other => LeadFlowError::Backend(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for LeadFlowError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        LeadFlowError::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LeadFlowError>;
