use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::TELEGRAM_API_URL;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    Html,
}

/// Outbound messaging capability. The alert loops only ever talk to this
/// trait; the Telegram client below is one implementation.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, format: MessageFormat) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Telegram implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// Sends messages through the Telegram Bot API `sendMessage` endpoint.
pub struct TelegramSender {
    http: reqwest::Client,
    api_url: String,
    bot_token: String,
}

impl TelegramSender {
    pub fn new(http: reqwest::Client, bot_token: String) -> Self {
        Self {
            http,
            api_url: TELEGRAM_API_URL.to_string(),
            bot_token,
        }
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send_text(&self, chat_id: i64, text: &str, format: MessageFormat) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: match format {
                MessageFormat::Plain => None,
                MessageFormat::Html => Some("HTML"),
            },
        };

        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!(
                "sendMessage to {chat_id} returned {status}: {detail}"
            )));
        }
        debug!(chat_id, "message delivered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AlertDispatcher
// ---------------------------------------------------------------------------

/// Formats nothing and retries nothing: one delivery attempt per trigger
/// event. A failing recipient is logged and skipped so the rest of the batch
/// still goes out.
#[derive(Clone)]
pub struct AlertDispatcher {
    sender: Arc<dyn MessageSender>,
}

impl AlertDispatcher {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }

    /// Single-recipient send. Failure is logged, never propagated upward —
    /// a dead chat must not poison the tick that triggered it.
    pub async fn send(&self, user_id: i64, text: &str) {
        if let Err(e) = self
            .sender
            .send_text(user_id, text, MessageFormat::Plain)
            .await
        {
            warn!(user_id, "alert delivery failed: {e}");
        }
    }

    /// Deliver the same alert to every listed user, isolating failures.
    pub async fn broadcast(&self, user_ids: &[i64], text: &str) {
        for &user_id in user_ids {
            self.send(user_id, text).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records deliveries; chat ids listed in `fail_for` error instead.
    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<(i64, String)>>,
        pub fail_for: Vec<i64>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_text(&self, chat_id: i64, text: &str, _format: MessageFormat) -> Result<()> {
            if self.fail_for.contains(&chat_id) {
                return Err(AppError::Delivery(format!("chat {chat_id} unreachable")));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }
}
