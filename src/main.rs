use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use civic_alert_bot::channels::HttpConnector;
use civic_alert_bot::config;
use civic_alert_bot::db;
use civic_alert_bot::http::{self, AppState};
use civic_alert_bot::model::{TelegramCredentials, WhatsAppCredentials};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.default_database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let state = AppState {
        pool,
        connector: Arc::new(HttpConnector::from_config(&cfg)?),
        telegram: TelegramCredentials {
            bot_token: cfg.telegram.bot_token.clone(),
        },
        whatsapp: WhatsAppCredentials {
            access_token: cfg.whatsapp.access_token.clone(),
            phone_number_id: cfg.whatsapp.phone_number_id.clone(),
        },
    };

    let addr = cfg.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "civic alert bot listening");
    axum::serve(listener, http::router(state)).await?;

    Ok(())
}
