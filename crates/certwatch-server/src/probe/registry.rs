//! Registry (RDAP) expiry lookup.

use chrono::{DateTime, Utc};
use serde::Deserialize;

const RDAP_BASE: &str = "https://rdap.org";

/// Looks up the registration expiry date of a domain through the RDAP
/// bootstrap service. Lookups are best-effort; any failure yields `None`.
pub struct RegistryClient {
    http: reqwest::Client,
    base: String,
}

#[derive(Debug, Deserialize)]
struct RdapResponse {
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    event_action: String,
    #[serde(rename = "eventDate")]
    event_date: String,
}

impl RegistryClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base: RDAP_BASE.to_string(),
        }
    }

    /// RDAP records live at the registrable apex, not at subdomains.
    fn registrable(domain: &str) -> String {
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() <= 2 {
            domain.to_string()
        } else {
            labels[labels.len() - 2..].join(".")
        }
    }

    pub async fn expiry(&self, domain: &str) -> Option<DateTime<Utc>> {
        let apex = Self::registrable(domain);
        let url = format!("{}/domain/{}", self.base, apex);
        let resp = match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::debug!(domain = %apex, status = resp.status().as_u16(), "RDAP lookup rejected");
                return None;
            }
            Err(e) => {
                tracing::debug!(domain = %apex, error = %e, "RDAP lookup failed");
                return None;
            }
        };
        let body: RdapResponse = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(domain = %apex, error = %e, "RDAP response unparsable");
                return None;
            }
        };
        body.events
            .iter()
            .find(|e| e.event_action == "expiration")
            .and_then(|e| DateTime::parse_from_rfc3339(&e.event_date).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}
