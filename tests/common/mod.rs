#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use civic_alert_bot::channels::{ChannelConnector, MessagingChannel};
use civic_alert_bot::db;
use civic_alert_bot::model::{
    Alert, ConnectionInfo, ConnectionTest, Platform, TelegramCredentials, WhatsAppCredentials,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub async fn setup_pool() -> db::Pool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn alert(id: &str, alert_type: &str, severity: &str, created_at: DateTime<Utc>) -> Alert {
    Alert {
        id: id.to_string(),
        alert_type: alert_type.to_string(),
        severity: severity.to_string(),
        affected_regions: vec!["Littoral".into(), "Centre".into()],
        emotional_tone: Some("anger".into()),
        title: Some("Protest planned near the port".into()),
        created_at,
        acknowledged: false,
        acknowledged_at: None,
        acknowledged_by: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub platform: Platform,
    pub destination: String,
    pub text: String,
}

/// Connector whose channels record every call. Destinations listed in
/// `failing` are refused; `delays` slows individual destinations down.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    failing: Arc<Mutex<Vec<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    connection_tests: Arc<Mutex<Vec<Platform>>>,
    telegram_tokens: Arc<std::sync::Mutex<Vec<String>>>,
}

impl RecordingConnector {
    pub fn failing(destinations: &[&str]) -> Self {
        Self {
            failing: Arc::new(Mutex::new(
                destinations.iter().map(|d| d.to_string()).collect(),
            )),
            ..Default::default()
        }
    }

    pub async fn delay(&self, destination: &str, delay: Duration) {
        self.delays
            .lock()
            .await
            .insert(destination.to_string(), delay);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn connection_tests(&self) -> Vec<Platform> {
        self.connection_tests.lock().await.clone()
    }

    /// Bot tokens the channels were built with, in build order.
    pub fn telegram_tokens(&self) -> Vec<String> {
        self.telegram_tokens.lock().unwrap().clone()
    }

    fn channel(&self, platform: Platform) -> Box<dyn MessagingChannel> {
        Box::new(RecordingChannel {
            platform,
            connector: self.clone(),
        })
    }
}

impl ChannelConnector for RecordingConnector {
    fn telegram(&self, credentials: &TelegramCredentials) -> Box<dyn MessagingChannel> {
        self.telegram_tokens
            .lock()
            .unwrap()
            .push(credentials.bot_token.clone());
        self.channel(Platform::Telegram)
    }

    fn whatsapp(&self, _credentials: &WhatsAppCredentials) -> Box<dyn MessagingChannel> {
        self.channel(Platform::WhatsApp)
    }
}

struct RecordingChannel {
    platform: Platform,
    connector: RecordingConnector,
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn send(&self, destination: &str, text: &str) -> bool {
        let delay = self.connector.delays.lock().await.get(destination).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.connector.sent.lock().await.push(SentMessage {
            platform: self.platform,
            destination: destination.to_string(),
            text: text.to_string(),
        });
        !self
            .connector
            .failing
            .lock()
            .await
            .iter()
            .any(|d| d == destination)
    }

    async fn test_connection(&self) -> ConnectionTest {
        self.connector
            .connection_tests
            .lock()
            .await
            .push(self.platform);
        match self.platform {
            Platform::Telegram => ConnectionTest::ok(ConnectionInfo::Telegram {
                username: "civic_pulse_bot".into(),
                first_name: "CivicPulse".into(),
            }),
            Platform::WhatsApp => ConnectionTest::failed("Invalid WhatsApp credentials"),
        }
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: axum::Router) -> reqwest::Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    reqwest::Url::parse(&format!("http://{}/", addr)).unwrap()
}

#[derive(Debug, Clone)]
pub struct ProviderHit {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

/// Stand-in for the Graph API and the Telegram Bot API. Every request is
/// recorded and answered from a small script keyed on the path.
#[derive(Clone, Default)]
pub struct FakeProvider {
    hits: Arc<Mutex<Vec<ProviderHit>>>,
}

impl FakeProvider {
    pub async fn hits(&self) -> Vec<ProviderHit> {
        self.hits.lock().await.clone()
    }

    pub async fn start(&self) -> reqwest::Url {
        let router = axum::Router::new()
            .fallback(fake_provider_handler)
            .with_state(self.clone());
        serve(router).await
    }
}

async fn fake_provider_handler(
    axum::extract::State(fake): axum::extract::State<FakeProvider>,
    method: axum::http::Method,
    uri: axum::http::Uri,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> (axum::http::StatusCode, axum::Json<serde_json::Value>) {
    use axum::http::StatusCode;
    use serde_json::json;

    let path = uri.path().to_string();
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    fake.hits.lock().await.push(ProviderHit {
        method: method.to_string(),
        path: path.clone(),
        authorization: authorization.clone(),
        body: body.clone(),
    });

    let lower = path.to_ascii_lowercase();
    if lower.starts_with("/bot") {
        // Telegram Bot API: `/bot<token>/<method>`.
        if lower.starts_with("/botbad") {
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"ok": false, "error_code": 401, "description": "Unauthorized"})),
            );
        }
        if lower.ends_with("/getme") {
            return (
                StatusCode::OK,
                axum::Json(json!({
                    "ok": true,
                    "result": {
                        "id": 4242,
                        "is_bot": true,
                        "first_name": "CivicPulse",
                        "username": "civic_pulse_bot",
                        "can_join_groups": true,
                        "can_read_all_group_messages": false,
                        "supports_inline_queries": false
                    }
                })),
            );
        }
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"})),
        );
    }

    // Graph API: `/<version>/<phone_id>` and `/<version>/<phone_id>/messages`.
    if authorization.as_deref() != Some("Bearer good-token") {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"error": {"message": "Invalid OAuth access token.", "code": 190}})),
        );
    }
    if path.ends_with("/messages") {
        if body["to"] == "+237699" {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({"error": {"message": "Recipient not on WhatsApp"}})),
            );
        }
        return (
            StatusCode::OK,
            axum::Json(json!({"messages": [{"id": "wamid.1"}]})),
        );
    }
    (
        StatusCode::OK,
        axum::Json(json!({
            "display_phone_number": "+237 6 00 00 00 00",
            "verified_name": "CivicPulse Alerts",
            "id": "555"
        })),
    )
}
