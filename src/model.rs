use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    WhatsApp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::WhatsApp => "whatsapp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Some(Platform::Telegram),
            "whatsapp" => Some(Platform::WhatsApp),
            _ => None,
        }
    }

    /// Error string recorded for a recipient the provider did not accept.
    pub fn failure_message(&self, destination: &str) -> String {
        match self {
            Platform::Telegram => format!("Failed to send to chat {}", destination),
            Platform::WhatsApp => format!("Failed to send to {}", destination),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    AlertBroadcast,
    DailyDigest,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::AlertBroadcast => "alert_broadcast",
            MessageType::DailyDigest => "daily_digest",
        }
    }
}

/// A civic-intelligence alert row. Only `acknowledged*` is ever written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub alert_type: String,
    pub severity: String,
    pub affected_regions: Vec<String>,
    pub emotional_tone: Option<String>,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
}

/// Per-request bot settings. Every field is optional in the request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertBotConfig {
    pub telegram_enabled: bool,
    pub telegram_bot_token: String,
    pub telegram_chat_ids: Vec<String>,
    pub whatsapp_enabled: bool,
    pub whatsapp_access_token: String,
    pub whatsapp_phone_number_id: String,
    pub whatsapp_recipients: Vec<String>,
    pub voice_alerts_enabled: bool,
    /// Score above which the upstream detector raises danger alerts. Carried
    /// for callers that share this config; delivery does not read it.
    pub danger_threshold: f64,
    pub message_templates: MessageTemplates,
    /// Recipients in flight per channel; 1 keeps sends strictly sequential.
    pub max_concurrent_sends: usize,
}

impl Default for AlertBotConfig {
    fn default() -> Self {
        Self {
            telegram_enabled: false,
            telegram_bot_token: String::new(),
            telegram_chat_ids: Vec::new(),
            whatsapp_enabled: false,
            whatsapp_access_token: String::new(),
            whatsapp_phone_number_id: String::new(),
            whatsapp_recipients: Vec::new(),
            voice_alerts_enabled: false,
            danger_threshold: 70.0,
            message_templates: MessageTemplates::default(),
            max_concurrent_sends: 1,
        }
    }
}

impl AlertBotConfig {
    pub fn telegram_credentials(&self) -> TelegramCredentials {
        TelegramCredentials {
            bot_token: self.telegram_bot_token.clone(),
        }
    }

    pub fn whatsapp_credentials(&self) -> WhatsAppCredentials {
        WhatsAppCredentials {
            access_token: self.whatsapp_access_token.clone(),
            phone_number_id: self.whatsapp_phone_number_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhatsAppCredentials {
    pub access_token: String,
    pub phone_number_id: String,
}

impl WhatsAppCredentials {
    pub fn is_configured(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.phone_number_id.trim().is_empty()
    }
}

/// Message templates keyed by alert category. Telegram renders them as HTML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MessageTemplates {
    pub danger_alert: String,
    pub mood_shift: String,
    pub disinformation: String,
    pub unrest_prediction: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            danger_alert: "🚨 <b>CIVIC DANGER ALERT</b>\n\n\
                <b>Type:</b> {alert_type}\n\
                <b>Severity:</b> {severity}\n\
                <b>Regions:</b> {regions}\n\
                <b>Public mood:</b> {emotional_tone}\n\n\
                {title}\n\n\
                <i>Detected {timestamp}</i>"
                .to_string(),
            mood_shift: "📉 <b>MOOD SHIFT DETECTED</b>\n\n\
                <b>Region:</b> {region}\n\
                <b>Sentiment score:</b> {sentiment_score}\n\
                <b>Tone:</b> {emotional_tone}\n\n\
                {title}\n\n\
                <i>{timestamp}</i>"
                .to_string(),
            disinformation: "⚠️ <b>DISINFORMATION WARNING</b>\n\n\
                {title}\n\n\
                <b>Regions:</b> {regions}\n\
                <b>Severity:</b> {severity}\n\n\
                <i>Verify before sharing. {timestamp}</i>"
                .to_string(),
            unrest_prediction: "🔮 <b>UNREST PREDICTION</b>\n\n\
                <b>Regions:</b> {regions}\n\
                <b>Threat level:</b> {severity}\n\
                <b>Tone:</b> {emotional_tone}\n\n\
                {title}\n\n\
                <i>{timestamp}</i>"
                .to_string(),
        }
    }
}

impl MessageTemplates {
    /// Pick a template by substring of the alert category; danger is the fallback.
    pub fn for_alert_type(&self, alert_type: &str) -> &str {
        let category = alert_type.to_ascii_lowercase();
        if category.contains("mood") {
            self.mood_shift.as_str()
        } else if category.contains("disinformation") {
            self.disinformation.as_str()
        } else if category.contains("unrest") {
            self.unrest_prediction.as_str()
        } else {
            self.danger_alert.as_str()
        }
    }
}

/// Outcome of one channel's fan-out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastResult {
    pub platform: Platform,
    pub recipient_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<String>,
}

impl BroadcastResult {
    /// Build a result from per-recipient outcomes, keeping recipient order.
    pub fn tally<'a, I>(platform: Platform, outcomes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut recipient_count = 0;
        let mut success_count = 0;
        let mut errors = Vec::new();
        for (destination, delivered) in outcomes {
            recipient_count += 1;
            if delivered {
                success_count += 1;
            } else {
                errors.push(platform.failure_message(destination));
            }
        }
        Self {
            platform,
            recipient_count,
            success_count,
            failure_count: recipient_count - success_count,
            errors,
        }
    }
}

/// Response body of `broadcast_alert` and `send_digest`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub success: bool,
    pub recipient_count: usize,
    pub success_count: usize,
    pub results: Vec<BroadcastResult>,
}

impl From<Vec<BroadcastResult>> for BroadcastSummary {
    fn from(results: Vec<BroadcastResult>) -> Self {
        Self {
            success: true,
            recipient_count: results.iter().map(|r| r.recipient_count).sum(),
            success_count: results.iter().map(|r| r.success_count).sum(),
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastLogEntry {
    pub id: Uuid,
    pub platform: Platform,
    pub message_type: MessageType,
    pub recipient_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
}

/// Result of a credential check against a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ConnectionInfo>,
}

impl ConnectionTest {
    pub fn ok(info: ConnectionInfo) -> Self {
        Self {
            success: true,
            error: None,
            info: Some(info),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            info: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ConnectionInfo {
    Telegram {
        username: String,
        first_name: String,
    },
    WhatsApp {
        display_phone_number: String,
        #[serde(default)]
        verified_name: Option<String>,
    },
}

/// Response body of the `status` action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReport {
    pub telegram: TelegramStatus,
    pub whatsapp: WhatsAppStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramStatus {
    pub connected: bool,
    pub bot_username: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhatsAppStatus {
    pub connected: bool,
    pub phone_number: Option<String>,
    pub error: Option<String>,
}

impl From<ConnectionTest> for TelegramStatus {
    fn from(test: ConnectionTest) -> Self {
        let bot_username = match test.info {
            Some(ConnectionInfo::Telegram { username, .. }) => Some(username),
            _ => None,
        };
        Self {
            connected: test.success,
            bot_username,
            error: test.error,
        }
    }
}

impl From<ConnectionTest> for WhatsAppStatus {
    fn from(test: ConnectionTest) -> Self {
        let phone_number = match test.info {
            Some(ConnectionInfo::WhatsApp {
                display_phone_number,
                ..
            }) => Some(display_phone_number),
            _ => None,
        };
        Self {
            connected: test.success,
            phone_number,
            error: test.error,
        }
    }
}
