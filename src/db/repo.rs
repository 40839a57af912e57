use super::model::{SentimentCounts, SeverityCounts, TrendingTopic};
use crate::model::Alert;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{instrument, warn};

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {}", normalized))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/`, make sure the parent
/// directory exists and ask SQLite to create the file. In-memory and non-sqlite
/// URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{}&mode=rwc", q),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{}?{}", path, query)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Stored as a JSON array; older rows may hold a plain comma-separated list.
fn parse_regions(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(regions) => regions,
        Err(_) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert> {
    let regions: String = row.try_get("affected_regions")?;
    Ok(Alert {
        id: row.try_get("id")?,
        alert_type: row.try_get("alert_type")?,
        severity: row.try_get("severity")?,
        affected_regions: parse_regions(&regions),
        emotional_tone: row.try_get("emotional_tone")?,
        title: row.try_get("title")?,
        created_at: row.try_get("created_at")?,
        acknowledged: row.try_get("acknowledged")?,
        acknowledged_at: row.try_get("acknowledged_at")?,
        acknowledged_by: row.try_get("acknowledged_by")?,
    })
}

#[instrument(skip(pool))]
pub async fn fetch_alert(pool: &Pool, alert_id: &str) -> Result<Option<Alert>> {
    let row = sqlx::query(
        "SELECT id, alert_type, severity, affected_regions, emotional_tone, title, created_at, \
                acknowledged, acknowledged_at, acknowledged_by \
         FROM alerts WHERE id = ?",
    )
    .bind(alert_id)
    .fetch_optional(pool)
    .await
    .context("failed to load alert")?;

    row.as_ref().map(alert_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn insert_alert(pool: &Pool, alert: &Alert) -> Result<()> {
    let regions = serde_json::to_string(&alert.affected_regions)?;
    sqlx::query(
        "INSERT INTO alerts (id, alert_type, severity, affected_regions, emotional_tone, title, created_at, \
                             acknowledged, acknowledged_at, acknowledged_by) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&alert.id)
    .bind(&alert.alert_type)
    .bind(&alert.severity)
    .bind(regions)
    .bind(&alert.emotional_tone)
    .bind(&alert.title)
    .bind(alert.created_at)
    .bind(alert.acknowledged)
    .bind(alert.acknowledged_at)
    .bind(&alert.acknowledged_by)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip(pool, at))]
pub async fn acknowledge_alert(
    pool: &Pool,
    alert_id: &str,
    acknowledged_by: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    let res = sqlx::query(
        "UPDATE alerts SET acknowledged = 1, acknowledged_at = ?, acknowledged_by = ? WHERE id = ?",
    )
    .bind(at)
    .bind(acknowledged_by)
    .bind(alert_id)
    .execute(pool)
    .await
    .context("failed to acknowledge alert")?;
    if res.rows_affected() == 0 {
        warn!(alert_id, "acknowledge matched no alert row");
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_sentiment_entry(
    pool: &Pool,
    polarity: &str,
    region: Option<&str>,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO sentiment_entries (polarity, region, created_at) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(polarity)
    .bind(region)
    .bind(created_at)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn insert_trending_topic(
    pool: &Pool,
    topic: &str,
    volume: i64,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO trending_topics (topic, volume, created_at) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(topic)
    .bind(volume)
    .bind(created_at)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn sentiment_counts_between(
    pool: &Pool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<SentimentCounts> {
    let rows = sqlx::query(
        "SELECT LOWER(polarity) AS polarity, COUNT(*) AS n FROM sentiment_entries \
         WHERE datetime(created_at) >= datetime(?) AND datetime(created_at) < datetime(?) \
         GROUP BY LOWER(polarity)",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .context("failed to count sentiment entries")?;

    let mut counts = SentimentCounts::default();
    for row in rows {
        let polarity: String = row.get("polarity");
        let n: i64 = row.get("n");
        match polarity.as_str() {
            "positive" => counts.positive += n,
            "negative" => counts.negative += n,
            "neutral" => counts.neutral += n,
            _ => {}
        }
    }
    Ok(counts)
}

#[instrument(skip_all)]
pub async fn alert_counts_between(
    pool: &Pool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<SeverityCounts> {
    let rows = sqlx::query(
        "SELECT LOWER(severity) AS severity, COUNT(*) AS n FROM alerts \
         WHERE datetime(created_at) >= datetime(?) AND datetime(created_at) < datetime(?) \
         GROUP BY LOWER(severity)",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .context("failed to count alerts")?;

    let mut counts = SeverityCounts::default();
    for row in rows {
        let severity: String = row.get("severity");
        let n: i64 = row.get("n");
        match severity.as_str() {
            "critical" => counts.critical += n,
            "high" => counts.high += n,
            "medium" => counts.medium += n,
            "low" => counts.low += n,
            _ => {}
        }
    }
    Ok(counts)
}

#[instrument(skip_all)]
pub async fn top_trending_between(
    pool: &Pool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<TrendingTopic>> {
    let rows = sqlx::query(
        "SELECT topic, SUM(volume) AS volume FROM trending_topics \
         WHERE datetime(created_at) >= datetime(?) AND datetime(created_at) < datetime(?) \
         GROUP BY topic ORDER BY volume DESC, topic ASC LIMIT ?",
    )
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to load trending topics")?;

    Ok(rows
        .into_iter()
        .map(|row| TrendingTopic {
            topic: row.get("topic"),
            volume: row.get("volume"),
        })
        .collect())
}

#[instrument(skip(pool))]
pub async fn get_config_value(pool: &Pool, key: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM bot_config WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

#[instrument(skip(pool, value, now))]
pub async fn upsert_config_value(
    pool: &Pool,
    key: &str,
    value: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO bot_config (key, value, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(now)
    .execute(pool)
    .await
    .context("failed to upsert config value")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> Pool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn sample_alert(id: &str, severity: &str, created_at: DateTime<Utc>) -> Alert {
        Alert {
            id: id.into(),
            alert_type: "danger".into(),
            severity: severity.into(),
            affected_regions: vec!["Adamawa".into()],
            emotional_tone: None,
            title: Some("Flooding".into()),
            created_at,
            acknowledged: false,
            acknowledged_at: None,
            acknowledged_by: None,
        }
    }

    #[test]
    fn sqlite_url_normalization() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://x"), "postgres://x");
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("nested").join("bot.db");
        let url = prepare_sqlite_url(&format!("sqlite://{}", db.display()));
        assert_eq!(url, format!("sqlite://{}?mode=rwc", db.display()));
        assert!(db.parent().unwrap().exists());
    }

    #[test]
    fn regions_accept_json_or_csv() {
        assert_eq!(parse_regions(r#"["North","South"]"#), vec!["North", "South"]);
        assert_eq!(parse_regions("North, South,"), vec!["North", "South"]);
        assert!(parse_regions("").is_empty());
    }

    #[tokio::test]
    async fn alert_roundtrip_and_acknowledge() {
        let pool = setup_pool().await;
        let created = Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap();
        insert_alert(&pool, &sample_alert("a1", "high", created))
            .await
            .unwrap();

        let alert = fetch_alert(&pool, "a1").await.unwrap().unwrap();
        assert_eq!(alert.affected_regions, vec!["Adamawa".to_string()]);
        assert_eq!(alert.created_at, created);
        assert!(!alert.acknowledged);

        let at = created + Duration::hours(1);
        acknowledge_alert(&pool, "a1", "civic_alert_bot", at)
            .await
            .unwrap();
        let alert = fetch_alert(&pool, "a1").await.unwrap().unwrap();
        assert!(alert.acknowledged);
        assert_eq!(alert.acknowledged_at, Some(at));
        assert_eq!(alert.acknowledged_by.as_deref(), Some("civic_alert_bot"));

        assert!(fetch_alert(&pool, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn aggregates_are_limited_to_the_window() {
        let pool = setup_pool().await;
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let end = start + Duration::days(1);
        let inside = start + Duration::hours(10);
        let before = start - Duration::minutes(1);

        for p in ["positive", "positive", "Negative", "neutral", "other"] {
            insert_sentiment_entry(&pool, p, Some("Centre"), inside)
                .await
                .unwrap();
        }
        insert_sentiment_entry(&pool, "positive", None, before)
            .await
            .unwrap();

        insert_alert(&pool, &sample_alert("c1", "critical", inside))
            .await
            .unwrap();
        insert_alert(&pool, &sample_alert("l1", "low", inside))
            .await
            .unwrap();
        insert_alert(&pool, &sample_alert("old", "critical", before))
            .await
            .unwrap();

        let s = sentiment_counts_between(&pool, start, end).await.unwrap();
        assert_eq!(
            s,
            SentimentCounts {
                positive: 2,
                negative: 1,
                neutral: 1
            }
        );

        let a = alert_counts_between(&pool, start, end).await.unwrap();
        assert_eq!(a.critical, 1);
        assert_eq!(a.low, 1);
        assert_eq!(a.total(), 2);

        for (topic, volume) in [("fuel", 40), ("roads", 10), ("fuel", 5), ("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            insert_trending_topic(&pool, topic, volume, inside)
                .await
                .unwrap();
        }
        let top = top_trending_between(&pool, start, end, 5).await.unwrap();
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].topic, "fuel");
        assert_eq!(top[0].volume, 45);
        assert_eq!(top[1].topic, "roads");
    }

    #[tokio::test]
    async fn config_value_upsert_overwrites() {
        let pool = setup_pool().await;
        assert!(get_config_value(&pool, "k").await.unwrap().is_none());
        upsert_config_value(&pool, "k", "[1]", Utc::now()).await.unwrap();
        upsert_config_value(&pool, "k", "[2]", Utc::now()).await.unwrap();
        assert_eq!(get_config_value(&pool, "k").await.unwrap().as_deref(), Some("[2]"));
    }
}
