use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Health status of a monitored domain.
///
/// Severity is a total order: `Unresolvable` > `Expired` > `Warning` >
/// `Active`. `Pending` is the initial state of a record that has never been
/// probed; the classifier never produces it for a completed measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Active,
    Warning,
    Expired,
    Unresolvable,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Active => "active",
            Status::Warning => "warning",
            Status::Expired => "expired",
            Status::Unresolvable => "unresolvable",
        }
    }

    /// Statuses without a meaningful expiry countdown.
    pub fn days_remaining_is_meaningless(&self) -> bool {
        matches!(self, Status::Pending | Status::Unresolvable)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "active" => Ok(Status::Active),
            "warning" => Ok(Status::Warning),
            "expired" => Ok(Status::Expired),
            "unresolvable" => Ok(Status::Unresolvable),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// One monitored domain with its latest certificate and reachability facts.
///
/// `status`, `days_remaining` and `error_msg` are derived by the classifier
/// from the other fields; they are never set independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: String,
    pub domain_name: String,
    pub zone_name: String,
    pub cf_zone_id: String,
    pub cf_record_id: String,
    pub is_proxied: bool,
    pub is_ignored: bool,
    pub auto_renew: bool,
    pub issuer: String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub sans: Vec<String>,
    pub tls_version: String,
    pub http_status_code: i32,
    #[serde(rename = "latency")]
    pub latency_ms: i64,
    pub domain_expiry_date: Option<DateTime<Utc>>,
    pub domain_days_left: Option<i64>,
    pub status: Status,
    pub days_remaining: Option<i64>,
    pub error_msg: Option<String>,
    pub last_check_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Certificate facts observed during a successful TLS handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsFacts {
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub sans: Vec<String>,
    pub protocol: String,
}

/// Raw probe result for one domain.
///
/// The four facets (DNS, TLS, HTTP, registration expiry) fail independently;
/// a domain can resolve but fail the handshake, or serve HTTP with an invalid
/// certificate. Probe failures are data, never errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub dns_resolved: bool,
    pub dns_error: Option<String>,
    pub resolved_ips: Vec<String>,
    pub tls: Option<TlsFacts>,
    pub tls_error: Option<String>,
    pub http_status: Option<u16>,
    pub latency_ms: Option<i64>,
    pub registry_expiry: Option<DateTime<Utc>>,
}

/// Classifier output: the derived slice of a [`DomainRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: Status,
    pub days_remaining: Option<i64>,
    pub error_msg: Option<String>,
}

/// Kind of operational event that can trigger a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusAlert,
    DomainAdded,
    DomainRemoved,
    RenewResult,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StatusAlert => "status_alert",
            EventKind::DomainAdded => "domain_added",
            EventKind::DomainRemoved => "domain_removed",
            EventKind::RenewResult => "renew_result",
        }
    }
}

/// Ephemeral notification payload, produced by the reconciler and consumed
/// once by the dispatcher. Not persisted beyond delivery attempts.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub domain: String,
    pub vars: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(kind: EventKind, domain: &str) -> Self {
        let mut vars = HashMap::new();
        vars.insert("Domain".to_string(), domain.to_string());
        vars.insert("Timestamp".to_string(), Utc::now().to_rfc3339());
        Self {
            kind,
            domain: domain.to_string(),
            vars,
            created_at: Utc::now(),
        }
    }

    pub fn with_var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }
}

/// Per-event-kind notification toggle and template override.
///
/// An empty template means "use the built-in default at render time"; empty
/// strings are legal in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSetting {
    pub enabled: bool,
    #[serde(default)]
    pub template: String,
}

impl Default for EventSetting {
    fn default() -> Self {
        Self {
            enabled: true,
            template: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default)]
    pub status_alert: EventSetting,
    #[serde(default)]
    pub domain_added: EventSetting,
    #[serde(default)]
    pub domain_removed: EventSetting,
    #[serde(default)]
    pub renew_result: EventSetting,
}

impl EventSettings {
    pub fn for_kind(&self, kind: EventKind) -> &EventSetting {
        match kind {
            EventKind::StatusAlert => &self.status_alert,
            EventKind::DomainAdded => &self.domain_added,
            EventKind::DomainRemoved => &self.domain_removed,
            EventKind::RenewResult => &self.renew_result,
        }
    }
}

/// Process-wide notification configuration, stored as a single keyed row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub webhook_enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    /// Channel-specific template; overrides the per-event template when set.
    #[serde(default)]
    pub webhook_template: String,
    #[serde(default)]
    pub telegram_enabled: bool,
    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default)]
    pub telegram_chat_id: String,
    #[serde(default)]
    pub telegram_template: String,
    #[serde(default)]
    pub events: EventSettings,
    /// Gates the renewal capability; the ACME workflow itself is external.
    #[serde(default)]
    pub acme_email: String,
}

/// One domain as reported by the authoritative DNS provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDomain {
    pub name: String,
    pub zone_id: String,
    pub zone_name: String,
    pub record_id: String,
    pub proxied: bool,
}

/// Aggregate counters for the dashboard, computed over non-ignored records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_domains: u64,
    pub status_counts: HashMap<String, u64>,
    pub expiry_counts: HashMap<String, u64>,
    pub issuer_counts: HashMap<String, u64>,
}

/// Outcome of a batch ignore mutation. Partial failure is reported, never
/// collapsed into a uniform success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub updated: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let s = serde_json::to_string(&Status::Unresolvable).unwrap();
        assert_eq!(s, "\"unresolvable\"");
        let back: Status = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(back, Status::Warning);
    }

    #[test]
    fn status_round_trips_from_str() {
        for s in ["pending", "active", "warning", "expired", "unresolvable"] {
            assert_eq!(s.parse::<Status>().unwrap().as_str(), s);
        }
        assert!("bogus".parse::<Status>().is_err());
    }

    #[test]
    fn record_serializes_latency_under_its_wire_name() {
        let rec = DomainRecord {
            id: "1".to_string(),
            domain_name: "example.com".to_string(),
            zone_name: "example.com".to_string(),
            cf_zone_id: String::new(),
            cf_record_id: String::new(),
            is_proxied: false,
            is_ignored: false,
            auto_renew: false,
            issuer: String::new(),
            not_before: None,
            not_after: None,
            sans: vec![],
            tls_version: String::new(),
            http_status_code: 200,
            latency_ms: 42,
            domain_expiry_date: None,
            domain_days_left: None,
            status: Status::Active,
            days_remaining: Some(10),
            error_msg: None,
            last_check_time: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["latency"], 42);
        assert!(json.get("latency_ms").is_none());
    }

    #[test]
    fn event_setting_defaults_to_enabled_with_builtin_template() {
        let s = EventSetting::default();
        assert!(s.enabled);
        assert!(s.template.is_empty());
    }

    #[test]
    fn settings_deserialize_with_missing_fields() {
        let s: NotificationSettings =
            serde_json::from_str(r#"{"webhook_enabled":true,"webhook_url":"https://x"}"#).unwrap();
        assert!(s.webhook_enabled);
        assert!(!s.telegram_enabled);
        assert!(s.events.status_alert.enabled);
    }
}
