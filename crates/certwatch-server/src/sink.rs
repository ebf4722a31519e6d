use std::sync::Arc;

use certwatch_common::types::NotificationEvent;
use certwatch_notify::{Dispatcher, EventSink};
use certwatch_storage::DomainStore;

/// Bridges the scan pipeline to the dispatcher. Settings are loaded fresh
/// for every event so channel edits apply without a restart; delivery runs
/// detached so probing never waits on webhooks.
pub struct DispatchSink {
    store: Arc<DomainStore>,
    dispatcher: Arc<Dispatcher>,
}

impl DispatchSink {
    pub fn new(store: Arc<DomainStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { store, dispatcher }
    }
}

impl EventSink for DispatchSink {
    fn submit(&self, event: NotificationEvent) {
        let store = self.store.clone();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            match store.get_settings().await {
                Ok(settings) => {
                    dispatcher.dispatch(&settings, &event).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to load notification settings, event dropped");
                }
            }
        });
    }
}
