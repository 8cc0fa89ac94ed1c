//! Lead tracking for sales teams: lead pipeline, closer and setter
//! leaderboards, CSV export, and live team views over a Postgres store.

pub mod analytics;
pub mod assistant;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod leaderboard;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod notifications;
pub mod report;
pub mod seed;
pub mod service;
pub mod status;
pub mod store;
pub mod subscription;

pub use error::{LeadFlowError, Result};
pub use service::LeadService;
pub use store::{LeadStore, MemoryStore};
