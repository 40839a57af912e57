//! Outbound messaging channels.
//!
//! Each provider is reached through a [`MessagingChannel`] built per request
//! from the credentials that came with that request. A [`ChannelConnector`]
//! does the building so the orchestrator can be driven by fakes in tests.
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

use crate::config::Config;
use crate::model::{ConnectionTest, Platform, TelegramCredentials, WhatsAppCredentials};

pub mod telegram;
pub mod whatsapp;

pub use telegram::TelegramChannel;
pub use whatsapp::WhatsAppChannel;

#[async_trait]
pub trait MessagingChannel: Send + Sync {
    fn platform(&self) -> Platform;

    /// Deliver `text`, Telegram-flavoured HTML, to one destination. Channels
    /// without markup send it as plain text. Failures are logged and reported
    /// as `false`; this never errors.
    async fn send(&self, destination: &str, text: &str) -> bool;

    /// Check the stored credentials with a lightweight identity call.
    async fn test_connection(&self) -> ConnectionTest;
}

pub trait ChannelConnector: Send + Sync {
    fn telegram(&self, credentials: &TelegramCredentials) -> Box<dyn MessagingChannel>;

    fn whatsapp(&self, credentials: &WhatsAppCredentials) -> Box<dyn MessagingChannel>;

    fn connect(
        &self,
        platform: Platform,
        telegram: &TelegramCredentials,
        whatsapp: &WhatsAppCredentials,
    ) -> Box<dyn MessagingChannel> {
        match platform {
            Platform::Telegram => self.telegram(telegram),
            Platform::WhatsApp => self.whatsapp(whatsapp),
        }
    }
}

/// Connector talking to the real provider APIs.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: Client,
    telegram_api: Url,
    graph_api: Url,
    graph_version: String,
}

impl HttpConnector {
    pub fn new(telegram_api: Url, graph_api: Url, graph_version: String) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("civic-alert-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            telegram_api,
            graph_api,
            graph_version,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.telegram_api_url()?,
            cfg.graph_api_url()?,
            cfg.whatsapp.api_version.clone(),
        )
    }
}

impl ChannelConnector for HttpConnector {
    fn telegram(&self, credentials: &TelegramCredentials) -> Box<dyn MessagingChannel> {
        Box::new(TelegramChannel::new(
            &credentials.bot_token,
            self.http.clone(),
            self.telegram_api.clone(),
        ))
    }

    fn whatsapp(&self, credentials: &WhatsAppCredentials) -> Box<dyn MessagingChannel> {
        Box::new(WhatsAppChannel::new(
            credentials.clone(),
            self.http.clone(),
            self.graph_api.clone(),
            self.graph_version.clone(),
        ))
    }
}
