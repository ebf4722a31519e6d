use anyhow::{anyhow, Result};
use async_trait::async_trait;
use certwatch_common::types::ProviderDomain;
use serde::Deserialize;

use super::DomainProvider;

const PER_PAGE: u32 = 100;

/// Cloudflare DNS inventory. A "domain" is any A/AAAA/CNAME record across
/// all zones the API token can read.
pub struct CloudflareProvider {
    http: reqwest::Client,
    api_base: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct CfEnvelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CfError>,
    result: Option<T>,
    result_info: Option<CfResultInfo>,
}

#[derive(Debug, Deserialize)]
struct CfError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CfResultInfo {
    page: u32,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct CfZone {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CfDnsRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    proxied: bool,
}

impl CloudflareProvider {
    pub fn new(api_base: &str, api_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_token.is_empty()
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        page: u32,
    ) -> Result<(T, bool)> {
        let url = format!("{}{}?page={}&per_page={}", self.api_base, path, page, PER_PAGE);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Cloudflare API returned {status}: {body}"));
        }
        let envelope: CfEnvelope<T> = resp.json().await?;
        if !envelope.success {
            let detail = envelope
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(anyhow!("Cloudflare API error: {detail}"));
        }
        let result = envelope
            .result
            .ok_or_else(|| anyhow!("Cloudflare API response missing result"))?;
        let has_more = envelope
            .result_info
            .map(|info| info.page < info.total_pages)
            .unwrap_or(false);
        Ok((result, has_more))
    }

    async fn get_all<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut page = 1;
        loop {
            let (mut batch, has_more): (Vec<T>, bool) = self.get_page(path, page).await?;
            out.append(&mut batch);
            if !has_more {
                return Ok(out);
            }
            page += 1;
        }
    }

    async fn zones(&self) -> Result<Vec<CfZone>> {
        self.get_all("/zones").await
    }
}

#[async_trait]
impl DomainProvider for CloudflareProvider {
    async fn list_domains(&self) -> Result<Vec<ProviderDomain>> {
        if !self.is_configured() {
            return Err(anyhow!("Cloudflare api_token is not configured"));
        }

        let mut domains = Vec::new();
        for zone in self.zones().await? {
            let records: Vec<CfDnsRecord> = self
                .get_all(&format!("/zones/{}/dns_records", zone.id))
                .await?;
            for record in records {
                if !matches!(record.record_type.as_str(), "A" | "AAAA" | "CNAME") {
                    continue;
                }
                domains.push(ProviderDomain {
                    name: record.name,
                    zone_id: zone.id.clone(),
                    zone_name: zone.name.clone(),
                    record_id: record.id,
                    proxied: record.proxied,
                });
            }
            tracing::debug!(zone = %zone.name, "zone inventory fetched");
        }
        // the same hostname can appear as both A and AAAA
        domains.sort_by(|a, b| a.name.cmp(&b.name));
        domains.dedup_by(|a, b| a.name == b.name);
        Ok(domains)
    }
}
