use async_trait::async_trait;
use reqwest::Client;

use crate::error::{NotifyError, Result};
use crate::NotificationChannel;

/// Generic HTTP webhook. Posts the rendered message as a JSON object so the
/// receiver (Slack-compatible hooks, custom collectors) gets a stable shape.
pub struct WebhookChannel {
    client: Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(client: Client, url: &str) -> Result<Self> {
        if url.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "webhook enabled but webhook_url is empty".to_string(),
            ));
        }
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, body: &str) -> Result<()> {
        let payload = serde_json::json!({ "text": body });
        let resp = self.client.post(&self.url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::ApiError {
                service: "webhook".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
