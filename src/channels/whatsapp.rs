use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::MessagingChannel;
use crate::formatter::to_plain_text;
use crate::model::{ConnectionInfo, ConnectionTest, Platform, WhatsAppCredentials};

/// WhatsApp Business channel over the Graph API.
pub struct WhatsAppChannel {
    http: Client,
    base_url: Url,
    api_version: String,
    credentials: WhatsAppCredentials,
}

#[derive(Debug, Deserialize)]
struct PhoneNumberResponse {
    display_phone_number: String,
    #[serde(default)]
    verified_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

impl WhatsAppChannel {
    pub fn new(
        credentials: WhatsAppCredentials,
        http: Client,
        mut base_url: Url,
        api_version: String,
    ) -> Self {
        // `Url::join` drops the last path segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            api_version,
            credentials,
        }
    }

    fn endpoint(&self, suffix: &str) -> Result<Url> {
        let path = format!(
            "{}/{}{}",
            self.api_version.trim_matches('/'),
            self.credentials.phone_number_id.trim(),
            suffix
        );
        self.base_url
            .join(&path)
            .with_context(|| format!("invalid Graph API path {}", path))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.credentials.access_token.trim())
    }
}

#[async_trait]
impl MessagingChannel for WhatsAppChannel {
    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    async fn send(&self, destination: &str, text: &str) -> bool {
        if !self.credentials.is_configured() {
            warn!(to = destination, "whatsapp credentials not configured");
            return false;
        }
        let url = match self.endpoint("/messages") {
            Ok(url) => url,
            Err(err) => {
                warn!(?err, "invalid whatsapp endpoint");
                return false;
            }
        };
        let body = json!({
            "messaging_product": "whatsapp",
            "to": destination,
            "type": "text",
            "text": { "body": to_plain_text(text) },
        });
        match self
            .http
            .post(url)
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await
        {
            Ok(res) if res.status().is_success() => {
                debug!(to = destination, "whatsapp message sent");
                true
            }
            Ok(res) => {
                let status = res.status();
                let body = res.text().await.unwrap_or_default();
                warn!(%status, body = %body, to = destination, "whatsapp send rejected");
                false
            }
            Err(err) => {
                warn!(?err, to = destination, "whatsapp send failed");
                false
            }
        }
    }

    async fn test_connection(&self) -> ConnectionTest {
        if !self.credentials.is_configured() {
            return ConnectionTest::failed("WhatsApp credentials not configured");
        }
        let url = match self.endpoint("") {
            Ok(url) => url,
            Err(err) => return ConnectionTest::failed(format!("Connection failed: {}", err)),
        };
        let res = match self
            .http
            .get(url)
            .header("Authorization", self.bearer())
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => {
                warn!(?err, "whatsapp phone lookup failed");
                return ConnectionTest::failed(format!("Connection failed: {}", err));
            }
        };

        let status = res.status();
        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => return ConnectionTest::failed(format!("Connection failed: {}", err)),
        };
        if !status.is_success() {
            let message = serde_json::from_str::<GraphErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "Invalid WhatsApp credentials".to_string());
            return ConnectionTest::failed(message);
        }
        match serde_json::from_str::<PhoneNumberResponse>(&body) {
            Ok(phone) => ConnectionTest::ok(ConnectionInfo::WhatsApp {
                display_phone_number: phone.display_phone_number,
                verified_name: phone.verified_name,
            }),
            Err(err) => ConnectionTest::failed(format!("Connection failed: {}", err)),
        }
    }
}
