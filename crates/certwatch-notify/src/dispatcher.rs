use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use certwatch_common::types::{EventKind, NotificationEvent, NotificationSettings};
use reqwest::Client;

use crate::channels::{TelegramChannel, WebhookChannel};
use crate::error::{NotifyError, Result};
use crate::template;
use crate::NotificationChannel;

const MAX_ATTEMPTS: u32 = 3;

/// Fans a [`NotificationEvent`] out to every enabled channel.
///
/// Channels are rebuilt from the settings on each dispatch so edits through
/// the settings API take effect immediately. Status alerts are de-duplicated
/// per domain: a domain that keeps reporting the same status only alerts on
/// the first transition.
pub struct Dispatcher {
    client: Client,
    last_alert: Mutex<HashMap<String, String>>,
    failures: AtomicU64,
    retry_base: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            last_alert: Mutex::new(HashMap::new()),
            failures: AtomicU64::new(0),
            retry_base: Duration::from_secs(2),
        }
    }

    /// Shorten the retry backoff. Test hook.
    #[cfg(test)]
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Total channel deliveries that exhausted all retries.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn build_channels(
        &self,
        settings: &NotificationSettings,
    ) -> Vec<(Box<dyn NotificationChannel>, String)> {
        let mut channels: Vec<(Box<dyn NotificationChannel>, String)> = Vec::new();
        if settings.webhook_enabled {
            match WebhookChannel::new(self.client.clone(), &settings.webhook_url) {
                Ok(ch) => channels.push((Box::new(ch), settings.webhook_template.clone())),
                Err(e) => tracing::warn!(error = %e, "skipping webhook channel"),
            }
        }
        if settings.telegram_enabled {
            match TelegramChannel::new(
                self.client.clone(),
                &settings.telegram_bot_token,
                &settings.telegram_chat_id,
            ) {
                Ok(ch) => channels.push((Box::new(ch), settings.telegram_template.clone())),
                Err(e) => tracing::warn!(error = %e, "skipping telegram channel"),
            }
        }
        channels
    }

    /// Template precedence: channel override, then per-event template, then
    /// the built-in default.
    pub(crate) fn resolve_template<'a>(
        channel_template: &'a str,
        event_template: &'a str,
        kind: EventKind,
    ) -> &'a str {
        if !channel_template.is_empty() {
            channel_template
        } else if !event_template.is_empty() {
            event_template
        } else {
            template::default_template(kind)
        }
    }

    async fn send_with_retry(&self, channel: &dyn NotificationChannel, body: &str) -> Result<()> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(self.retry_base * 2u32.pow(attempt - 1)).await;
            }
            match channel.send(body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        channel = channel.name(),
                        attempt = attempt + 1,
                        error = %e,
                        "notification delivery failed"
                    );
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| NotifyError::Other("no attempt made".to_string())))
    }

    /// Deliver `event` to every enabled channel. Returns the number of
    /// channels that accepted the message; delivery failures are logged and
    /// counted, never propagated.
    pub async fn dispatch(
        &self,
        settings: &NotificationSettings,
        event: &NotificationEvent,
    ) -> usize {
        let event_setting = settings.events.for_kind(event.kind);
        if !event_setting.enabled {
            tracing::debug!(kind = event.kind.as_str(), domain = %event.domain, "event kind disabled");
            return 0;
        }

        if event.kind == EventKind::StatusAlert {
            let new_status = event.vars.get("NewStatus").cloned().unwrap_or_default();
            let mut last = match self.last_alert.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if last.get(&event.domain) == Some(&new_status) {
                tracing::debug!(domain = %event.domain, status = %new_status, "suppressing repeat alert");
                return 0;
            }
            last.insert(event.domain.clone(), new_status);
        }

        let mut delivered = 0;
        for (channel, channel_template) in self.build_channels(settings) {
            let tpl =
                Self::resolve_template(&channel_template, &event_setting.template, event.kind);
            let body = template::render(tpl, &event.vars);
            match self.send_with_retry(channel.as_ref(), &body).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::info!(
                        channel = channel.name(),
                        kind = event.kind.as_str(),
                        domain = %event.domain,
                        "notification delivered"
                    );
                }
                Err(e) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        channel = channel.name(),
                        kind = event.kind.as_str(),
                        domain = %event.domain,
                        error = %e,
                        "notification dropped after retries"
                    );
                }
            }
        }
        delivered
    }

    /// Send a test message through candidate settings without persisting
    /// them or touching the de-dup state. Errors surface to the caller so
    /// the settings UI can show what is broken.
    pub async fn send_test(&self, settings: &NotificationSettings) -> Result<usize> {
        let event = NotificationEvent::new(EventKind::StatusAlert, "test.example.com")
            .with_var("OldStatus", "active")
            .with_var("NewStatus", "warning")
            .with_var("DaysRemaining", "14")
            .with_var("ExpiryDate", "2099-01-01");

        let channels = self.build_channels(settings);
        if channels.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "no notification channel is enabled".to_string(),
            ));
        }
        let event_setting = settings.events.for_kind(event.kind);
        let mut delivered = 0;
        for (channel, channel_template) in channels {
            let tpl =
                Self::resolve_template(&channel_template, &event_setting.template, event.kind);
            let body = template::render(tpl, &event.vars);
            channel.send(&body).await?;
            delivered += 1;
        }
        Ok(delivered)
    }
}
