//! Alert broadcast orchestration.
//!
//! One call loads the alert, renders its message once, fans it out over every
//! enabled channel, records the outcome in the rolling log and finally marks
//! the alert acknowledged. Acknowledgment happens even when some recipients
//! failed; only a pipeline error (unknown alert, store failure) prevents it.
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument};

use crate::broadcast_log;
use crate::channels::{ChannelConnector, MessagingChannel};
use crate::db;
use crate::error::BotError;
use crate::formatter;
use crate::model::{AlertBotConfig, BroadcastResult, BroadcastSummary, MessageType};

/// Recorded as `acknowledged_by` on alerts this service has delivered.
pub const ACKNOWLEDGED_BY: &str = "civic_alert_bot";

#[instrument(skip(pool, connector, config))]
pub async fn broadcast_alert(
    pool: &db::Pool,
    connector: &dyn ChannelConnector,
    config: &AlertBotConfig,
    alert_id: &str,
) -> Result<BroadcastSummary, BotError> {
    let alert = db::fetch_alert(pool, alert_id)
        .await?
        .ok_or_else(|| BotError::AlertNotFound(alert_id.to_string()))?;

    let template = config.message_templates.for_alert_type(&alert.alert_type);
    let message = formatter::format_message(template, &alert, Utc::now());

    let results = fan_out(connector, config, &message).await;

    if config.voice_alerts_enabled && config.whatsapp_enabled {
        for recipient in &config.whatsapp_recipients {
            match synthesize_voice(&message, recipient).await {
                Some(voice) => debug!(recipient = %recipient, bytes = voice.len(), "voice alert ready"),
                None => debug!(recipient = %recipient, "no voice message"),
            }
        }
    }

    broadcast_log::log(pool, Some(alert_id), MessageType::AlertBroadcast, &results).await?;
    db::acknowledge_alert(pool, alert_id, ACKNOWLEDGED_BY, Utc::now()).await?;

    let summary = BroadcastSummary::from(results);
    info!(
        alert_id,
        recipients = summary.recipient_count,
        delivered = summary.success_count,
        "alert broadcast complete"
    );
    Ok(summary)
}

/// Send `message` over every enabled channel that has recipients. Channels
/// come back in a fixed order: Telegram, then WhatsApp.
pub async fn fan_out(
    connector: &dyn ChannelConnector,
    config: &AlertBotConfig,
    message: &str,
) -> Vec<BroadcastResult> {
    let concurrency = config.max_concurrent_sends.max(1);
    let mut results = Vec::new();

    if config.telegram_enabled && !config.telegram_chat_ids.is_empty() {
        let channel = connector.telegram(&config.telegram_credentials());
        results.push(deliver(channel.as_ref(), &config.telegram_chat_ids, message, concurrency).await);
    }

    if config.whatsapp_enabled && !config.whatsapp_recipients.is_empty() {
        let channel = connector.whatsapp(&config.whatsapp_credentials());
        results.push(deliver(channel.as_ref(), &config.whatsapp_recipients, message, concurrency).await);
    }

    results
}

/// Deliver to each recipient. `buffered` keeps outcomes in recipient order
/// whatever the concurrency.
async fn deliver(
    channel: &dyn MessagingChannel,
    recipients: &[String],
    message: &str,
    concurrency: usize,
) -> BroadcastResult {
    // Built up front so the caller's future stays `Send` for any lifetime.
    let sends: Vec<_> = recipients
        .iter()
        .map(|recipient| channel.send(recipient, message))
        .collect();
    let outcomes: Vec<bool> = stream::iter(sends)
        .buffered(concurrency)
        .collect()
        .await;

    BroadcastResult::tally(
        channel.platform(),
        recipients.iter().map(String::as_str).zip(outcomes),
    )
}

/// Voice rendition of an alert for one WhatsApp recipient. No synthesis
/// backend is wired in, so this always yields nothing.
async fn synthesize_voice(_message: &str, _recipient: &str) -> Option<Vec<u8>> {
    None
}
