pub mod network;
pub mod registry;

use async_trait::async_trait;
use certwatch_common::types::Measurement;

pub use network::NetworkProber;

/// Collects raw facts about one domain. Probing never fails as a whole;
/// partial failures (DNS, TLS, HTTP, registry) land in the measurement and
/// the classifier decides what they mean.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, domain: &str) -> Measurement;
}
