use std::sync::Arc;

use certwatch_notify::{Dispatcher, EventSink};
use certwatch_storage::DomainStore;
use chrono::{DateTime, Utc};

use crate::config::ServerConfig;
use crate::probe::Prober;
use crate::provider::DomainProvider;
use crate::renew::Renewer;
use crate::scan::Reconciler;

/// Shared handles for the HTTP layer. Cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DomainStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub sink: Arc<dyn EventSink>,
    pub reconciler: Arc<Reconciler>,
    pub prober: Arc<dyn Prober>,
    pub provider: Arc<dyn DomainProvider>,
    pub renewer: Arc<dyn Renewer>,
    pub config: Arc<ServerConfig>,
    pub start_time: DateTime<Utc>,
}
