//! Chat delivery through the Telegram Bot API.
//!
//! The bot token is part of the request URL, so transport errors are
//! stripped of their URL before they reach logs or responses.

use async_trait::async_trait;
use lesson_orchestrator::config::CHAT_TOKEN_VAR;
use lesson_orchestrator::{Channel, ChatSender, Config, LessonError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error_message, redacted};

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Envelope of every Bot API reply.
#[derive(Debug, Deserialize)]
struct BotReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Posts lesson messages as a bot.
#[derive(Clone)]
pub struct TelegramChatSender {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for TelegramChatSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChatSender")
            .field("base_url", &self.base_url)
            .field("token", &redacted(self.token.as_ref()))
            .finish_non_exhaustive()
    }
}

impl TelegramChatSender {
    /// Creates a sender for the bot identified by `token`.
    #[must_use]
    pub fn new(client: Client, config: &Config, token: Option<String>) -> Self {
        Self {
            client,
            base_url: config.endpoints.chat.clone(),
            token,
        }
    }

    fn send_message_url(&self, token: &str) -> String {
        format!(
            "{}/bot{token}/sendMessage",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatSender for TelegramChatSender {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let fail = |message: String| LessonError::notification(Channel::Chat, message);

        let token = self
            .token
            .as_deref()
            .ok_or_else(|| fail(format!("{CHAT_TOKEN_VAR} is not set")))?;

        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.send_message_url(token))
            .json(&body)
            .send()
            .await
            .map_err(|e| fail(e.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| fail(e.without_url().to_string()))?;

        check_reply(status.is_success(), &text).map_err(fail)?;
        debug!(chat_id, "Chat message accepted");
        Ok(())
    }
}

/// Accepts a reply only if the HTTP status succeeded and `ok` is true.
fn check_reply(status_ok: bool, body: &str) -> std::result::Result<(), String> {
    match serde_json::from_str::<BotReply>(body) {
        Ok(reply) if status_ok && reply.ok => Ok(()),
        Ok(reply) => Err(reply
            .description
            .unwrap_or_else(|| "bot API reported failure".to_string())),
        Err(_) if status_ok => Err(format!("unexpected bot API reply: {}", body.trim())),
        Err(_) => Err(error_message(body)),
    }
}
