use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use certwatch_common::types::{Measurement, TlsFacts};
use chrono::{DateTime, Utc};
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

use super::registry::RegistryClient;
use super::Prober;

const TLS_PORT: u16 = 443;

/// Live prober: DNS via the system resolver, TLS handshake with full chain
/// verification, an HTTPS GET for reachability, and an RDAP lookup for the
/// registry expiry date.
pub struct NetworkProber {
    connector: TlsConnector,
    http: reqwest::Client,
    registry: RegistryClient,
    connect_timeout: Duration,
}

impl NetworkProber {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let http = reqwest::Client::builder()
            .timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            connector: TlsConnector::from(Arc::new(config)),
            http: http.clone(),
            registry: RegistryClient::new(http),
            connect_timeout,
        }
    }

    async fn resolve(&self, domain: &str) -> Result<Vec<String>> {
        let addr = format!("{domain}:{TLS_PORT}");
        let addrs = tokio::time::timeout(self.connect_timeout, tokio::net::lookup_host(&addr))
            .await
            .map_err(|_| {
                anyhow::anyhow!("DNS lookup timed out after {}s", self.connect_timeout.as_secs())
            })??;
        let ips: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
        if ips.is_empty() {
            anyhow::bail!("no addresses resolved");
        }
        Ok(ips)
    }

    async fn handshake(&self, domain: &str) -> Result<TlsFacts> {
        let addr = format!("{domain}:{TLS_PORT}");
        let server_name = rustls::pki_types::ServerName::try_from(domain.to_string())
            .map_err(|e| anyhow::anyhow!("invalid server name: {e}"))?;

        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                anyhow::anyhow!("connection timed out after {}s", self.connect_timeout.as_secs())
            })?
            .map_err(|e| anyhow::anyhow!("TCP connection failed: {e}"))?;

        let tls_stream =
            tokio::time::timeout(self.connect_timeout, self.connector.connect(server_name, tcp))
                .await
                .map_err(|_| anyhow::anyhow!("TLS handshake timed out"))?
                .map_err(|e| anyhow::anyhow!("TLS handshake failed: {e}"))?;

        let (_io, conn) = tls_stream.into_inner();
        let protocol = match conn.protocol_version() {
            Some(rustls::ProtocolVersion::TLSv1_3) => "TLSv1.3".to_string(),
            Some(rustls::ProtocolVersion::TLSv1_2) => "TLSv1.2".to_string(),
            Some(other) => format!("{other:?}"),
            None => String::new(),
        };
        let certs = conn
            .peer_certificates()
            .ok_or_else(|| anyhow::anyhow!("no peer certificates"))?;
        let leaf = certs
            .first()
            .ok_or_else(|| anyhow::anyhow!("empty certificate chain"))?;

        parse_leaf(leaf.as_ref(), protocol)
    }

    async fn http_get(&self, domain: &str) -> Option<(u16, i64)> {
        let url = format!("https://{domain}/");
        let started = Instant::now();
        match self.http.get(&url).send().await {
            Ok(resp) => {
                let latency = started.elapsed().as_millis() as i64;
                Some((resp.status().as_u16(), latency))
            }
            Err(e) => {
                tracing::debug!(domain, error = %e, "HTTP reachability check failed");
                None
            }
        }
    }
}

fn parse_leaf(der: &[u8], protocol: String) -> Result<TlsFacts> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| anyhow::anyhow!("failed to parse X.509 certificate: {e}"))?;

    let not_before = DateTime::from_timestamp(
        cert.validity().not_before.to_datetime().unix_timestamp(),
        0,
    )
    .unwrap_or_else(Utc::now);
    let not_after = DateTime::from_timestamp(
        cert.validity().not_after.to_datetime().unix_timestamp(),
        0,
    )
    .unwrap_or_else(Utc::now);

    let sans: Vec<String> = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|san| {
            san.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(TlsFacts {
        issuer: cert.issuer().to_string(),
        not_before,
        not_after,
        sans,
        protocol,
    })
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, domain: &str) -> Measurement {
        let mut m = Measurement::default();

        match self.resolve(domain).await {
            Ok(ips) => {
                m.dns_resolved = true;
                m.resolved_ips = ips;
            }
            Err(e) => {
                tracing::debug!(domain, error = %e, "DNS resolution failed");
                m.dns_error = Some(e.to_string());
                // registry data is independent of DNS health
                m.registry_expiry = self.registry.expiry(domain).await;
                return m;
            }
        }

        match self.handshake(domain).await {
            Ok(facts) => m.tls = Some(facts),
            Err(e) => {
                tracing::debug!(domain, error = %e, "TLS probe failed");
                m.tls_error = Some(e.to_string());
            }
        }

        if m.tls.is_some() {
            if let Some((status, latency)) = self.http_get(domain).await {
                m.http_status = Some(status);
                m.latency_ms = Some(latency);
            }
        }

        m.registry_expiry = self.registry.expiry(domain).await;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dns_lookup_honors_the_probe_timeout() {
        let prober = NetworkProber::new(Duration::ZERO);
        let err = prober.resolve("localhost").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
