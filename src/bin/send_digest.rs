use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use civic_alert_bot::channels::HttpConnector;
use civic_alert_bot::config;
use civic_alert_bot::db;
use civic_alert_bot::digest;
use civic_alert_bot::model::AlertBotConfig;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Send today's digest once and exit (for cron)"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// JSON file holding the bot settings (same shape as the `config` request field)
    #[arg(long)]
    bot_config: PathBuf,

    /// Render the digest and print it without sending
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;
    let raw = tokio::fs::read_to_string(&args.bot_config)
        .await
        .with_context(|| format!("failed to read {}", args.bot_config.display()))?;
    let bot_config: AlertBotConfig =
        serde_json::from_str(&raw).context("invalid bot config JSON")?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.default_database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let now = Utc::now();
    if args.dry_run {
        let stats = digest::collect_stats(&pool, now).await?;
        println!("{}", digest::render(&stats, now));
        return Ok(());
    }

    let connector = HttpConnector::from_config(&cfg)?;
    let summary = digest::send_digest(&pool, &connector, &bot_config, now).await?;
    info!(
        recipients = summary.recipient_count,
        delivered = summary.success_count,
        "digest run finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
