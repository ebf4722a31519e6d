use certwatch_common::types::{Classification, Measurement, Status};
use chrono::{DateTime, Utc};

/// Derive a status from raw probe facts. Pure so the stored status is always
/// reproducible from the stored measurement.
///
/// Precedence: unreachable (no DNS or no certificate) beats everything, then
/// expiry, then the warning window.
pub fn classify(m: &Measurement, warning_days: i64, now: DateTime<Utc>) -> Classification {
    if !m.dns_resolved {
        let msg = m
            .dns_error
            .clone()
            .unwrap_or_else(|| "DNS resolution failed".to_string());
        return Classification {
            status: Status::Unresolvable,
            days_remaining: None,
            error_msg: Some(msg),
        };
    }

    let Some(tls) = &m.tls else {
        let msg = m
            .tls_error
            .clone()
            .unwrap_or_else(|| "no TLS certificate presented".to_string());
        return Classification {
            status: Status::Unresolvable,
            days_remaining: None,
            error_msg: Some(msg),
        };
    };

    // floor, not truncation: 3.5 days overdue is -4 days remaining
    let days = (tls.not_after - now).num_seconds().div_euclid(86_400);
    if tls.not_after < now {
        Classification {
            status: Status::Expired,
            days_remaining: Some(days),
            error_msg: None,
        }
    } else if days <= warning_days {
        Classification {
            status: Status::Warning,
            days_remaining: Some(days),
            error_msg: None,
        }
    } else {
        Classification {
            status: Status::Active,
            days_remaining: Some(days),
            error_msg: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certwatch_common::types::TlsFacts;
    use chrono::Duration;

    fn measurement(not_after_days: i64, now: DateTime<Utc>) -> Measurement {
        Measurement {
            dns_resolved: true,
            resolved_ips: vec!["192.0.2.1".to_string()],
            tls: Some(TlsFacts {
                issuer: "CA".to_string(),
                not_before: now - Duration::days(30),
                not_after: now + Duration::days(not_after_days),
                sans: vec![],
                protocol: "TLSv1.3".to_string(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn healthy_certificate_is_active() {
        let now = Utc::now();
        let c = classify(&measurement(90, now), 30, now);
        assert_eq!(c.status, Status::Active);
        assert_eq!(c.days_remaining, Some(90));
        assert!(c.error_msg.is_none());
    }

    #[test]
    fn warning_window_boundary() {
        let now = Utc::now();
        assert_eq!(classify(&measurement(30, now), 30, now).status, Status::Warning);
        assert_eq!(classify(&measurement(31, now), 30, now).status, Status::Active);
        assert_eq!(classify(&measurement(1, now), 30, now).status, Status::Warning);
    }

    #[test]
    fn expired_certificate_reports_negative_days() {
        let now = Utc::now();
        let c = classify(&measurement(-3, now), 30, now);
        assert_eq!(c.status, Status::Expired);
        assert_eq!(c.days_remaining, Some(-3));
    }

    #[test]
    fn overdue_days_round_down() {
        let now = Utc::now();
        // 3.5 days past expiry floors to -4, not -3
        let c = classify(&measurement_hours(-84, now), 30, now);
        assert_eq!(c.status, Status::Expired);
        assert_eq!(c.days_remaining, Some(-4));

        // a partial day still ahead counts as zero full days
        let c = classify(&measurement_hours(12, now), 30, now);
        assert_eq!(c.days_remaining, Some(0));
    }

    fn measurement_hours(not_after_hours: i64, now: DateTime<Utc>) -> Measurement {
        let mut m = measurement(0, now);
        if let Some(tls) = m.tls.as_mut() {
            tls.not_after = now + Duration::hours(not_after_hours);
        }
        m
    }

    #[test]
    fn dns_failure_is_unresolvable() {
        let now = Utc::now();
        let m = Measurement {
            dns_resolved: false,
            dns_error: Some("NXDOMAIN".to_string()),
            ..Default::default()
        };
        let c = classify(&m, 30, now);
        assert_eq!(c.status, Status::Unresolvable);
        assert!(c.days_remaining.is_none());
        assert_eq!(c.error_msg.as_deref(), Some("NXDOMAIN"));
    }

    #[test]
    fn tls_failure_is_unresolvable_with_message() {
        let now = Utc::now();
        let m = Measurement {
            dns_resolved: true,
            resolved_ips: vec!["192.0.2.1".to_string()],
            tls: None,
            tls_error: Some("handshake failed".to_string()),
            ..Default::default()
        };
        let c = classify(&m, 30, now);
        assert_eq!(c.status, Status::Unresolvable);
        assert_eq!(c.error_msg.as_deref(), Some("handshake failed"));
    }

    #[test]
    fn tls_failure_without_detail_still_has_message() {
        let now = Utc::now();
        let m = Measurement {
            dns_resolved: true,
            ..Default::default()
        };
        let c = classify(&m, 30, now);
        assert_eq!(c.status, Status::Unresolvable);
        assert!(c.error_msg.is_some());
    }
}
