//! Telegram Bot API transport for operational notifications.

use crate::config::Config;
use crate::notifier::NotificationSink;
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Telegram rejects messages longer than this many characters
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

/// Plain-text sender bound to a single chat
pub struct TelegramSink {
    client: reqwest::Client,
    api_url: String,
    token: String,
    chat_id: i64,
}

impl TelegramSink {
    /// Validate the token with `getMe` and return a ready sink
    pub async fn connect(api_url: &str, token: &str, chat_id: i64) -> Result<Self> {
        let sink = Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id,
        };

        let bot = sink.get_me().await?;
        info!(
            "Telegram bot initialized (@{}, id {})",
            bot.username.as_deref().unwrap_or("unknown"),
            bot.id
        );

        Ok(sink)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn get_me(&self) -> Result<BotUser> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .context("Failed to send request to Telegram API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error ({}): {}", status, body);
        }

        let parsed: ApiResponse<BotUser> = response
            .json()
            .await
            .context("Failed to parse Telegram getMe response")?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(bot),
                ..
            } => Ok(bot),
            ApiResponse { description, .. } => anyhow::bail!(
                "Telegram getMe rejected: {}",
                description.unwrap_or_else(|| "no description".to_string())
            ),
        }
    }

    async fn send_chunk(&self, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: self.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Telegram API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error ({}): {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    /// Deliver `text`, split into as many messages as the length limit needs.
    /// Any failed chunk fails the whole send.
    async fn send(&self, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }
}

/// Build the notification sink from config.
///
/// Returns `None` when no token is configured or the bot cannot be reached;
/// the service keeps running without notifications in that case.
pub async fn connect_sink(config: &Config) -> Option<Arc<dyn NotificationSink>> {
    let Some(token) = config.telegram_bot_token.as_deref() else {
        warn!("TG_TOKEN not set, telegram notifications disabled");
        return None;
    };

    info!("Initializing telegram bot...");
    let api_url = config.telegram_api_url.as_str();
    let chat_id = config.telegram_chat_id;
    match with_retry(&RetryConfig::startup_probe(), "Telegram getMe", || {
        TelegramSink::connect(api_url, token, chat_id)
    })
    .await
    {
        Ok(sink) => Some(Arc::new(sink)),
        Err(e) => {
            warn!("Failed to initialize telegram notifications: {:#}", e);
            None
        }
    }
}

/// Split text into chunks of at most `limit` characters, breaking on newlines
/// where possible and hard-splitting lines that are longer than `limit`.
/// Whitespace-only chunks are dropped.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut started = false;

    for mut line in text.split('\n') {
        loop {
            let line_len = line.chars().count();
            let needed = if started {
                current_len + 1 + line_len
            } else {
                line_len
            };

            if needed <= limit {
                if started {
                    current.push('\n');
                }
                current.push_str(line);
                current_len = needed;
                started = true;
                break;
            }

            if started {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
                started = false;
                continue;
            }

            let split_at = line
                .char_indices()
                .nth(limit)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            chunks.push(line[..split_at].to_string());
            line = &line[split_at..];
        }
    }
    if started {
        chunks.push(current);
    }

    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}
