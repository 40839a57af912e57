use async_trait::async_trait;
use reqwest::{Client, Url};
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, Recipient};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

use super::MessagingChannel;
use crate::model::{ConnectionInfo, ConnectionTest, Platform};

/// Telegram Bot API channel. Messages go out as HTML with link previews off.
pub struct TelegramChannel {
    bot: Option<Bot>,
}

impl TelegramChannel {
    /// A blank token yields a channel that fails every call without touching
    /// the network.
    pub fn new(bot_token: &str, http: Client, api_url: Url) -> Self {
        let token = bot_token.trim();
        let bot = (!token.is_empty()).then(|| Bot::with_client(token, http).set_api_url(api_url));
        Self { bot }
    }
}

/// Numeric ids address chats directly; anything else is treated as `@channel`.
pub fn recipient(chat_id: &str) -> Recipient {
    let chat_id = chat_id.trim();
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.to_string()),
    }
}

fn describe_error(err: RequestError) -> String {
    match err {
        // Telegram answers a bad token with 401 "Unauthorized", which teloxide
        // names `NotFound`.
        RequestError::Api(ApiError::NotFound) => "Invalid bot token".to_string(),
        RequestError::Api(api) => api.to_string(),
        RequestError::Network(e) => format!("Connection failed: {}", e),
        RequestError::Io(e) => format!("Connection failed: {}", e),
        other => other.to_string(),
    }
}

#[async_trait]
impl MessagingChannel for TelegramChannel {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn send(&self, destination: &str, text: &str) -> bool {
        let Some(bot) = &self.bot else {
            warn!(chat_id = destination, "telegram bot token not configured");
            return false;
        };
        match bot
            .send_message(recipient(destination), text)
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await
        {
            Ok(msg) => {
                debug!(chat_id = destination, message_id = msg.id.0, "telegram message sent");
                true
            }
            Err(err) => {
                warn!(?err, chat_id = destination, "telegram send failed");
                false
            }
        }
    }

    async fn test_connection(&self) -> ConnectionTest {
        let Some(bot) = &self.bot else {
            return ConnectionTest::failed("Telegram bot token not configured");
        };
        match bot.get_me().await {
            Ok(me) => ConnectionTest::ok(ConnectionInfo::Telegram {
                username: me.user.username.clone().unwrap_or_default(),
                first_name: me.user.first_name.clone(),
            }),
            Err(err) => {
                warn!(?err, "telegram getMe failed");
                ConnectionTest::failed(describe_error(err))
            }
        }
    }
}
