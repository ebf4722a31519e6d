pub mod cloudflare;

use anyhow::Result;
use async_trait::async_trait;
use certwatch_common::types::ProviderDomain;

pub use cloudflare::CloudflareProvider;

/// Source of truth for which domains the fleet contains. Sync pulls the
/// full inventory and reconciles it against the store.
#[async_trait]
pub trait DomainProvider: Send + Sync {
    async fn list_domains(&self) -> Result<Vec<ProviderDomain>>;
}
