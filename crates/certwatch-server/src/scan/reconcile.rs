use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use certwatch_common::types::{DomainRecord, EventKind, NotificationEvent, Status};
use certwatch_notify::EventSink;
use certwatch_storage::DomainStore;
use chrono::Utc;
use serde::Serialize;

use crate::probe::Prober;
use crate::provider::DomainProvider;
use crate::scan::classify::classify;

/// Outcome of one provider sync.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Keeps the store consistent with the provider inventory and with probe
/// results, emitting notification events for every observable change.
pub struct Reconciler {
    store: Arc<DomainStore>,
    sink: Arc<dyn EventSink>,
    // serializes classify-then-persist per domain id
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Reconciler {
    pub fn new(store: Arc<DomainStore>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            sink,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Pull the provider inventory and converge the store onto it: new
    /// domains are inserted as `pending`, existing ones get their provider
    /// linkage refreshed, and provider-managed records that vanished from
    /// the inventory are deleted. Running twice in a row changes nothing.
    pub async fn sync(&self, provider: &dyn DomainProvider) -> Result<SyncReport> {
        let inventory = provider.list_domains().await?;
        let existing = self.store.list_all().await?;
        let listed: HashSet<&str> = inventory.iter().map(|d| d.name.as_str()).collect();

        let mut report = SyncReport::default();

        for d in &inventory {
            match existing.iter().find(|r| r.domain_name == d.name) {
                None => {
                    let rec = self.store.insert_from_provider(d).await?;
                    report.added += 1;
                    tracing::info!(domain = %rec.domain_name, zone = %rec.zone_name, "domain added from provider");
                    self.sink.submit(
                        NotificationEvent::new(EventKind::DomainAdded, &rec.domain_name)
                            .with_var("Zone", &rec.zone_name),
                    );
                }
                Some(r) => {
                    let changed = r.zone_name != d.zone_name
                        || r.cf_zone_id != d.zone_id
                        || r.cf_record_id != d.record_id
                        || r.is_proxied != d.proxied;
                    if changed {
                        self.store.update_provider_fields(&r.id, d).await?;
                        report.updated += 1;
                    }
                }
            }
        }

        // only provider-managed records are subject to removal
        for r in &existing {
            if !r.cf_record_id.is_empty() && !listed.contains(r.domain_name.as_str()) {
                if self.store.delete_by_id(&r.id).await? {
                    self.locks
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .remove(&r.id);
                    report.removed += 1;
                    tracing::info!(domain = %r.domain_name, "domain removed, no longer in provider");
                    self.sink.submit(
                        NotificationEvent::new(EventKind::DomainRemoved, &r.domain_name)
                            .with_var("Zone", &r.zone_name),
                    );
                }
            }
        }

        tracing::info!(
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            "provider sync finished"
        );
        Ok(report)
    }

    /// Probe one record, persist the result, and alert if the status moved.
    /// The first probe of a fresh record never alerts. Writes for the same
    /// domain are serialized so two overlapping scans cannot interleave; the
    /// prior status is re-read under the lock.
    pub async fn scan_domain(
        &self,
        prober: &dyn Prober,
        record: &DomainRecord,
        warning_days: i64,
    ) -> Result<()> {
        let lock = self.lock_for(&record.id);
        let _guard = lock.lock().await;

        // deleted or ignored since the cycle was listed
        let Some(record) = self.store.get_by_id(&record.id).await? else {
            return Ok(());
        };
        if record.is_ignored {
            return Ok(());
        }

        let now = Utc::now();
        let m = prober.probe(&record.domain_name).await;
        let c = classify(&m, warning_days, now);

        self.store.apply_probe(&record.id, &m, &c, now).await?;

        if c.status != record.status && record.status != Status::Pending {
            let expiry = m
                .tls
                .as_ref()
                .map(|t| t.not_after.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            let days = c
                .days_remaining
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            let issuer = m.tls.as_ref().map(|t| t.issuer.clone()).unwrap_or_default();
            let tls_version = m.tls.as_ref().map(|t| t.protocol.clone()).unwrap_or_default();
            let http_code = m.http_status.map(|s| s.to_string()).unwrap_or_default();
            self.sink.submit(
                NotificationEvent::new(EventKind::StatusAlert, &record.domain_name)
                    .with_var("OldStatus", record.status.as_str())
                    .with_var("NewStatus", c.status.as_str())
                    .with_var("DaysRemaining", days)
                    .with_var("ExpiryDate", expiry)
                    .with_var("Issuer", issuer)
                    .with_var("Ip", m.resolved_ips.join(", "))
                    .with_var("TlsVersion", tls_version)
                    .with_var("HttpStatus", http_code)
                    .with_var("Error", c.error_msg.clone().unwrap_or_default()),
            );
        }

        tracing::info!(
            domain = %record.domain_name,
            status = c.status.as_str(),
            days_left = ?c.days_remaining,
            "domain scanned"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certwatch_common::types::ProviderDomain;
    use certwatch_notify::NullSink;

    struct FixedProvider(Vec<ProviderDomain>);

    #[async_trait::async_trait]
    impl DomainProvider for FixedProvider {
        async fn list_domains(&self) -> Result<Vec<ProviderDomain>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn removal_drops_the_domain_lock_entry() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/test.db?mode=rwc", dir.path().display());
        let store = Arc::new(DomainStore::new(&url).await.unwrap());
        let reconciler = Reconciler::new(store.clone(), Arc::new(NullSink));

        let d = ProviderDomain {
            name: "a.example.com".to_string(),
            zone_id: "zone-1".to_string(),
            zone_name: "example.com".to_string(),
            record_id: "rec-1".to_string(),
            proxied: false,
        };
        reconciler.sync(&FixedProvider(vec![d])).await.unwrap();
        let rec = store.get_by_name("a.example.com").await.unwrap().unwrap();
        reconciler.lock_for(&rec.id);
        assert_eq!(reconciler.locks.lock().unwrap().len(), 1);

        reconciler.sync(&FixedProvider(vec![])).await.unwrap();
        assert!(store.get_by_name("a.example.com").await.unwrap().is_none());
        assert!(reconciler.locks.lock().unwrap().is_empty());
    }
}
