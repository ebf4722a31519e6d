use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use certwatch_common::types::{
    Measurement, NotificationEvent, ProviderDomain, TlsFacts,
};
use certwatch_notify::{Dispatcher, EventSink};
use certwatch_server::app::build_http_app;
use certwatch_server::config::ServerConfig;
use certwatch_server::probe::Prober;
use certwatch_server::provider::DomainProvider;
use certwatch_server::renew::CommandRenewer;
use certwatch_server::scan::Reconciler;
use certwatch_server::state::AppState;
use certwatch_storage::DomainStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Prober with canned measurements per domain. Domains without a script
/// probe as unresolvable.
#[derive(Default)]
pub struct FakeProber {
    measurements: Mutex<HashMap<String, Measurement>>,
}

impl FakeProber {
    pub fn set(&self, domain: &str, m: Measurement) {
        self.measurements
            .lock()
            .unwrap()
            .insert(domain.to_string(), m);
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, domain: &str) -> Measurement {
        self.measurements
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .unwrap_or_else(|| Measurement {
                dns_resolved: false,
                dns_error: Some("NXDOMAIN".to_string()),
                ..Default::default()
            })
    }
}

/// Provider backed by an in-memory inventory.
#[derive(Default)]
pub struct StaticProvider {
    domains: Mutex<Vec<ProviderDomain>>,
}

impl StaticProvider {
    pub fn set(&self, domains: Vec<ProviderDomain>) {
        *self.domains.lock().unwrap() = domains;
    }
}

#[async_trait]
impl DomainProvider for StaticProvider {
    async fn list_domains(&self) -> Result<Vec<ProviderDomain>> {
        Ok(self.domains.lock().unwrap().clone())
    }
}

/// Sink that records every submitted event.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn submit(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct TestContext {
    pub state: AppState,
    pub store: Arc<DomainStore>,
    pub prober: Arc<FakeProber>,
    pub provider: Arc<StaticProvider>,
    pub sink: Arc<CollectingSink>,
    pub reconciler: Arc<Reconciler>,
    _tmp: tempfile::TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        // Pooled in-memory SQLite hands each connection its own database,
        // so every context gets a throwaway on-disk file instead.
        let tmp = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/test.db?mode=rwc", tmp.path().display());
        let store = Arc::new(DomainStore::new(&url).await.unwrap());
        let dispatcher = Arc::new(Dispatcher::new());
        let sink = Arc::new(CollectingSink::default());
        let reconciler = Arc::new(Reconciler::new(store.clone(), sink.clone()));
        let prober = Arc::new(FakeProber::default());
        let provider = Arc::new(StaticProvider::default());
        let renewer = Arc::new(CommandRenewer::new("echo renewed $CERTWATCH_DOMAIN"));
        let config: ServerConfig = toml::from_str("").unwrap();

        let state = AppState {
            store: store.clone(),
            dispatcher,
            sink: sink.clone(),
            reconciler: reconciler.clone(),
            prober: prober.clone(),
            provider: provider.clone(),
            renewer,
            config: Arc::new(config),
            start_time: Utc::now(),
        };

        Self {
            state,
            store,
            prober,
            provider,
            sink,
            reconciler,
            _tmp: tmp,
        }
    }

    pub fn app(&self) -> Router {
        build_http_app(self.state.clone())
    }
}

pub fn provider_domain(name: &str, zone: &str) -> ProviderDomain {
    ProviderDomain {
        name: name.to_string(),
        zone_id: format!("zone-{zone}"),
        zone_name: zone.to_string(),
        record_id: format!("rec-{name}"),
        proxied: false,
    }
}

pub fn healthy_measurement(not_after: DateTime<Utc>) -> Measurement {
    Measurement {
        dns_resolved: true,
        resolved_ips: vec!["192.0.2.1".to_string()],
        tls: Some(TlsFacts {
            issuer: "Example CA".to_string(),
            not_before: Utc::now() - ChronoDuration::days(10),
            not_after,
            sans: vec!["example.com".to_string()],
            protocol: "TLSv1.3".to_string(),
        }),
        http_status: Some(200),
        latency_ms: Some(25),
        ..Default::default()
    }
}

/// Give detached tasks a moment to settle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}
