//! Rolling log of broadcast attempts.
//!
//! The whole log lives as one JSON array under [`LOG_CONFIG_KEY`] in
//! `bot_config`, newest entry first and never longer than [`MAX_LOG_ENTRIES`].
//!
//! Writes are read-modify-write without locking: two concurrent broadcasts can
//! each read the same list and the later upsert wins, dropping the other's
//! entries. The log is advisory operator history, so this race is accepted.
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db;
use crate::error::BotError;
use crate::model::{BroadcastLogEntry, BroadcastResult, MessageType};

pub const LOG_CONFIG_KEY: &str = "alert_bot_logs";
pub const MAX_LOG_ENTRIES: usize = 100;

/// One entry per channel result, in result order.
pub fn entries_for(
    alert_id: Option<&str>,
    message_type: MessageType,
    results: &[BroadcastResult],
    now: DateTime<Utc>,
) -> Vec<BroadcastLogEntry> {
    results
        .iter()
        .map(|r| BroadcastLogEntry {
            id: Uuid::new_v4(),
            platform: r.platform,
            message_type,
            recipient_count: r.recipient_count,
            success_count: r.success_count,
            failure_count: r.failure_count,
            created_at: now,
            alert_id: alert_id.map(str::to_string),
        })
        .collect()
}

/// Prepend `new_entries` to `existing` and keep the newest [`MAX_LOG_ENTRIES`].
pub fn merge(
    new_entries: Vec<BroadcastLogEntry>,
    existing: Vec<BroadcastLogEntry>,
) -> Vec<BroadcastLogEntry> {
    let mut merged = new_entries;
    merged.extend(existing);
    merged.truncate(MAX_LOG_ENTRIES);
    merged
}

/// Current log, newest first. A missing or unreadable blob reads as empty.
#[instrument(skip_all)]
pub async fn read(pool: &db::Pool) -> Result<Vec<BroadcastLogEntry>, BotError> {
    let Some(raw) = db::get_config_value(pool, LOG_CONFIG_KEY).await? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => Ok(entries),
        Err(err) => {
            warn!(?err, "broadcast log is not a valid entry list; starting over");
            Ok(Vec::new())
        }
    }
}

pub async fn recent(pool: &db::Pool, limit: usize) -> Result<Vec<BroadcastLogEntry>, BotError> {
    let mut entries = read(pool).await?;
    entries.truncate(limit);
    Ok(entries)
}

#[instrument(skip(pool, results))]
pub async fn log(
    pool: &db::Pool,
    alert_id: Option<&str>,
    message_type: MessageType,
    results: &[BroadcastResult],
) -> Result<(), BotError> {
    if results.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    let new_entries = entries_for(alert_id, message_type, results, now);
    let added = new_entries.len();
    let merged = merge(new_entries, read(pool).await?);
    let value = serde_json::to_string(&merged)?;
    db::upsert_config_value(pool, LOG_CONFIG_KEY, &value, now).await?;
    info!(added, total = merged.len(), "broadcast log updated");
    Ok(())
}
