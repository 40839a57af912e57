use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use civic_alert_bot::broadcast_log;
use civic_alert_bot::config;
use civic_alert_bot::db;

#[derive(Debug, Parser)]
#[command(author, version, about = "Print the rolling broadcast log, newest first")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Number of entries to show
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Print raw JSON instead of one line per entry
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.default_database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let entries = broadcast_log::recent(&pool, args.limit).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No broadcasts logged yet.");
        return Ok(());
    }
    for e in entries {
        println!(
            "{} {:<8} {:<15} sent {}/{} failed {} alert={}",
            e.created_at.format("%Y-%m-%d %H:%M:%S"),
            e.platform.as_str(),
            e.message_type.as_str(),
            e.success_count,
            e.recipient_count,
            e.failure_count,
            e.alert_id.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
