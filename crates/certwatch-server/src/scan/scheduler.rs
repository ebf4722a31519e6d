use std::sync::Arc;

use anyhow::Result;
use certwatch_storage::DomainStore;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};

use crate::probe::Prober;
use crate::scan::reconcile::Reconciler;

/// Runs the probe cycle on a fixed interval with a bounded worker pool.
pub struct ScanScheduler {
    store: Arc<DomainStore>,
    reconciler: Arc<Reconciler>,
    prober: Arc<dyn Prober>,
    interval_secs: u64,
    max_concurrent: usize,
    warning_days: i64,
}

impl ScanScheduler {
    pub fn new(
        store: Arc<DomainStore>,
        reconciler: Arc<Reconciler>,
        prober: Arc<dyn Prober>,
        interval_secs: u64,
        max_concurrent: usize,
        warning_days: i64,
    ) -> Self {
        Self {
            store,
            reconciler,
            prober,
            interval_secs,
            max_concurrent,
            warning_days,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval_secs,
            max_concurrent = self.max_concurrent,
            warning_days = self.warning_days,
            "scan scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.interval_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.scan_all().await {
                tracing::error!(error = %e, "scan cycle failed");
            }
        }
    }

    /// One full pass over every scannable domain.
    pub async fn scan_all(&self) -> Result<usize> {
        let domains = self.store.list_scannable().await?;
        if domains.is_empty() {
            return Ok(0);
        }

        tracing::info!(count = domains.len(), "scanning domains");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(domains.len());

        let scanned = domains.len();
        for record in domains {
            let permit = semaphore.clone().acquire_owned().await?;
            let reconciler = self.reconciler.clone();
            let prober = self.prober.clone();
            let warning_days = self.warning_days;

            handles.push(tokio::spawn(async move {
                if let Err(e) = reconciler
                    .scan_domain(prober.as_ref(), &record, warning_days)
                    .await
                {
                    tracing::error!(domain = %record.domain_name, error = %e, "domain scan failed");
                }
                drop(permit);
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "scan task panicked");
            }
        }

        Ok(scanned)
    }
}
