//! Daily digest: same-day aggregates rendered as a fixed text report and sent
//! through the broadcast fan-out.
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::{info, instrument};

use crate::broadcast::fan_out;
use crate::broadcast_log;
use crate::channels::ChannelConnector;
use crate::db::{self, SentimentCounts, SeverityCounts, TrendingTopic};
use crate::error::BotError;
use crate::formatter::escape_html;
use crate::model::{AlertBotConfig, BroadcastSummary, MessageType};

pub const TOP_TOPICS: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DigestStats {
    pub date: NaiveDate,
    pub sentiment: SentimentCounts,
    pub alerts: SeverityCounts,
    pub trending: Vec<TrendingTopic>,
}

/// Share of `part` in `total` as a percentage; 0 when there is nothing to share.
pub fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = part as f64 * 100.0 / total as f64;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// UTC day containing `now`, as a half-open `[start, end)` range.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[instrument(skip(pool))]
pub async fn collect_stats(pool: &db::Pool, now: DateTime<Utc>) -> Result<DigestStats, BotError> {
    let (start, end) = day_bounds(now);
    Ok(DigestStats {
        date: start.date_naive(),
        sentiment: db::sentiment_counts_between(pool, start, end).await?,
        alerts: db::alert_counts_between(pool, start, end).await?,
        trending: db::top_trending_between(pool, start, end, TOP_TOPICS).await?,
    })
}

/// Plain-text report for one day. Telegram gets it escaped, see [`send_digest`].
pub fn render(stats: &DigestStats, now: DateTime<Utc>) -> String {
    let s = &stats.sentiment;
    let total = s.total();
    let a = &stats.alerts;

    let mut out = String::new();
    out.push_str("📊 CAMERPULSE DAILY DIGEST\n");
    out.push_str(&format!("{}\n\n", stats.date.format("%A, %d %B %Y")));

    out.push_str(&format!("Public sentiment ({} entries)\n", total));
    out.push_str(&format!("😊 Positive: {} ({:.1}%)\n", s.positive, percentage(s.positive, total)));
    out.push_str(&format!("😟 Negative: {} ({:.1}%)\n", s.negative, percentage(s.negative, total)));
    out.push_str(&format!("😐 Neutral: {} ({:.1}%)\n\n", s.neutral, percentage(s.neutral, total)));

    out.push_str(&format!("Alerts today ({})\n", a.total()));
    out.push_str(&format!("🔴 Critical: {}\n", a.critical));
    out.push_str(&format!("🟠 High: {}\n", a.high));
    out.push_str(&format!("🟡 Medium: {}\n", a.medium));
    out.push_str(&format!("🟢 Low: {}\n\n", a.low));

    out.push_str("Trending topics\n");
    if stats.trending.is_empty() {
        out.push_str("No trending topics today.\n");
    }
    for (i, topic) in stats.trending.iter().enumerate() {
        out.push_str(&format!("{}. {} ({} mentions)\n", i + 1, topic.topic, topic.volume));
    }

    out.push_str(&format!("\nGenerated {}", now.format("%Y-%m-%d %H:%M UTC")));
    out
}

#[instrument(skip(pool, connector, config))]
pub async fn send_digest(
    pool: &db::Pool,
    connector: &dyn ChannelConnector,
    config: &AlertBotConfig,
    now: DateTime<Utc>,
) -> Result<BroadcastSummary, BotError> {
    let stats = collect_stats(pool, now).await?;
    let message = escape_html(&render(&stats, now));
    let results = fan_out(connector, config, &message).await;
    broadcast_log::log(pool, None, MessageType::DailyDigest, &results).await?;

    let summary = BroadcastSummary::from(results);
    info!(
        recipients = summary.recipient_count,
        delivered = summary.success_count,
        "daily digest sent"
    );
    Ok(summary)
}
