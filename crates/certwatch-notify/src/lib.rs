//! Notification channels, templating and event dispatch.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod template;


use async_trait::async_trait;
use certwatch_common::types::NotificationEvent;

pub use dispatcher::Dispatcher;
pub use error::{NotifyError, Result};

/// One delivery target. Implementations hold their own transport config;
/// the dispatcher hands them a fully rendered message body.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, body: &str) -> Result<()>;
}

/// Seam between the scan/reconcile pipeline and notification delivery.
/// Producers submit events fire-and-forget; the sink decides how (and
/// whether) they reach a channel.
pub trait EventSink: Send + Sync {
    fn submit(&self, event: NotificationEvent);
}

/// Sink that drops every event. Useful when notifications are not wired up.
pub struct NullSink;

impl EventSink for NullSink {
    fn submit(&self, _event: NotificationEvent) {}
}
