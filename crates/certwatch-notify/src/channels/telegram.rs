use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{NotifyError, Result};
use crate::NotificationChannel;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API channel (`sendMessage`).
pub struct TelegramChannel {
    client: Client,
    bot_token: String,
    chat_id: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(client: Client, bot_token: &str, chat_id: &str) -> Result<Self> {
        if bot_token.is_empty() || chat_id.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "telegram enabled but bot_token or chat_id is empty".to_string(),
            ));
        }
        Ok(Self {
            client,
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            api_base: API_BASE.to_string(),
        })
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, body: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": body,
        });
        let resp = self.client.post(&url).json(&payload).send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::ApiError {
                service: "telegram".to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        // Telegram reports logical failures inside a 200 response
        if let Ok(parsed) = serde_json::from_str::<TelegramResponse>(&text) {
            if !parsed.ok {
                return Err(NotifyError::ApiError {
                    service: "telegram".to_string(),
                    status: status.as_u16(),
                    body: parsed.description.unwrap_or_else(|| "unknown error".to_string()),
                });
            }
        }
        Ok(())
    }
}
