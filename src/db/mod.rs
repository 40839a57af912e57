//! Database module: query view models and SQL repositories.
//!
//! - `model`: aggregate rows returned by the digest queries.
//! - `repo`: SQL-only functions over the alert store and the key/value config table.
//!
//! Callers import from `civic_alert_bot::db`; the repository API is re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{SentimentCounts, SeverityCounts, TrendingTopic};
