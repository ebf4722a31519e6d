use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use certwatch_common::types::{
    BatchFailure, BatchOutcome, Classification, DashboardStats, DomainRecord, Measurement,
    ProviderDomain, Status,
};
use sea_orm::sea_query::NullOrdering;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseBackend,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};

use crate::entities::domain_record::{self, Column, Entity};
use crate::store::DomainStore;

/// Sort key accepted by [`DomainStore::query`]. Parsed from the REST `sort`
/// parameter; a `-` prefix flips the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    DaysRemaining,
    DomainName,
    NotAfter,
    LastCheckTime,
}

impl SortKey {
    fn column(self) -> Column {
        match self {
            SortKey::DaysRemaining => Column::DaysRemaining,
            SortKey::DomainName => Column::DomainName,
            SortKey::NotAfter => Column::NotAfter,
            SortKey::LastCheckTime => Column::LastCheckTime,
        }
    }

    /// Columns that are NULL for pending/unresolvable records sort nulls-last.
    fn nullable(self) -> bool {
        matches!(
            self,
            SortKey::DaysRemaining | SortKey::NotAfter | SortKey::LastCheckTime
        )
    }
}

/// Filter and pagination parameters for the domain listing.
///
/// String filters use the REST convention: empty string means no constraint,
/// `"true"`/`"false"` constrain boolean columns. `page` is 1-indexed; pages
/// past the end return an empty list with the correct total.
#[derive(Debug, Clone)]
pub struct DomainQuery {
    pub page: u64,
    pub limit: u64,
    pub sort: String,
    pub status: String,
    pub proxied: String,
    pub ignored: String,
    pub zone: String,
}

impl Default for DomainQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort: String::new(),
            status: String::new(),
            proxied: String::new(),
            ignored: String::new(),
            zone: String::new(),
        }
    }
}

fn parse_bool_filter(value: &str, field: &str) -> Result<Option<bool>> {
    match value {
        "" => Ok(None),
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        other => Err(anyhow!("invalid {field} filter '{other}'")),
    }
}

fn parse_sort(sort: &str) -> (SortKey, Order) {
    let (name, order) = match sort.strip_prefix('-') {
        Some(rest) => (rest, Order::Desc),
        None => (sort, Order::Asc),
    };
    let key = match name {
        "" | "days_remaining" => SortKey::DaysRemaining,
        "domain_name" => SortKey::DomainName,
        "not_after" => SortKey::NotAfter,
        "last_check_time" => SortKey::LastCheckTime,
        _ => SortKey::DaysRemaining,
    };
    (key, order)
}

fn model_to_record(m: domain_record::Model) -> DomainRecord {
    let sans: Vec<String> = m
        .sans
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    let status = m.status.parse().unwrap_or(Status::Pending);
    DomainRecord {
        id: m.id,
        domain_name: m.domain_name,
        zone_name: m.zone_name,
        cf_zone_id: m.cf_zone_id,
        cf_record_id: m.cf_record_id,
        is_proxied: m.is_proxied,
        is_ignored: m.is_ignored,
        auto_renew: m.auto_renew,
        issuer: m.issuer,
        not_before: m.not_before.map(|t| t.with_timezone(&Utc)),
        not_after: m.not_after.map(|t| t.with_timezone(&Utc)),
        sans,
        tls_version: m.tls_version,
        http_status_code: m.http_status_code,
        latency_ms: m.latency_ms,
        domain_expiry_date: m.domain_expiry_date.map(|t| t.with_timezone(&Utc)),
        domain_days_left: m.domain_days_left,
        status,
        days_remaining: m.days_remaining,
        error_msg: m.error_msg,
        last_check_time: m.last_check_time.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl DomainStore {
    // ---- record CRUD ----

    pub async fn get_by_id(&self, id: &str) -> Result<Option<DomainRecord>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(model_to_record))
    }

    pub async fn get_by_name(&self, domain: &str) -> Result<Option<DomainRecord>> {
        let model = Entity::find()
            .filter(Column::DomainName.eq(domain))
            .one(self.db())
            .await?;
        Ok(model.map(model_to_record))
    }

    /// Create a fresh `pending` record for a domain discovered via provider
    /// sync. Facts stay empty until the first probe completes.
    pub async fn insert_from_provider(&self, d: &ProviderDomain) -> Result<DomainRecord> {
        let id = certwatch_common::id::next_id();
        let now = Utc::now().fixed_offset();
        let am = domain_record::ActiveModel {
            id: Set(id.clone()),
            domain_name: Set(d.name.clone()),
            zone_name: Set(d.zone_name.clone()),
            cf_zone_id: Set(d.zone_id.clone()),
            cf_record_id: Set(d.record_id.clone()),
            is_proxied: Set(d.proxied),
            is_ignored: Set(false),
            auto_renew: Set(false),
            issuer: Set(String::new()),
            not_before: Set(None),
            not_after: Set(None),
            sans: Set(None),
            tls_version: Set(String::new()),
            http_status_code: Set(0),
            latency_ms: Set(0),
            domain_expiry_date: Set(None),
            domain_days_left: Set(None),
            status: Set(Status::Pending.as_str().to_string()),
            days_remaining: Set(None),
            error_msg: Set(None),
            last_check_time: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        am.insert(self.db()).await?;
        self.get_by_id(&id)
            .await?
            .ok_or_else(|| anyhow!("failed to read inserted record for '{}'", d.name))
    }

    /// Insert a fully materialized record. Used by tests and imports.
    pub async fn insert_record(&self, rec: &DomainRecord) -> Result<()> {
        let sans_json = if rec.sans.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&rec.sans)?)
        };
        let am = domain_record::ActiveModel {
            id: Set(rec.id.clone()),
            domain_name: Set(rec.domain_name.clone()),
            zone_name: Set(rec.zone_name.clone()),
            cf_zone_id: Set(rec.cf_zone_id.clone()),
            cf_record_id: Set(rec.cf_record_id.clone()),
            is_proxied: Set(rec.is_proxied),
            is_ignored: Set(rec.is_ignored),
            auto_renew: Set(rec.auto_renew),
            issuer: Set(rec.issuer.clone()),
            not_before: Set(rec.not_before.map(|t| t.fixed_offset())),
            not_after: Set(rec.not_after.map(|t| t.fixed_offset())),
            sans: Set(sans_json),
            tls_version: Set(rec.tls_version.clone()),
            http_status_code: Set(rec.http_status_code),
            latency_ms: Set(rec.latency_ms),
            domain_expiry_date: Set(rec.domain_expiry_date.map(|t| t.fixed_offset())),
            domain_days_left: Set(rec.domain_days_left),
            status: Set(rec.status.as_str().to_string()),
            days_remaining: Set(rec.days_remaining),
            error_msg: Set(rec.error_msg.clone()),
            last_check_time: Set(rec.last_check_time.map(|t| t.fixed_offset())),
            created_at: Set(rec.created_at.fixed_offset()),
            updated_at: Set(rec.updated_at.fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    /// Refresh provider linkage (zone, record id, proxied flag) on an
    /// existing record without touching probe facts or status.
    pub async fn update_provider_fields(&self, id: &str, d: &ProviderDomain) -> Result<()> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        if let Some(m) = model {
            let mut am: domain_record::ActiveModel = m.into();
            am.zone_name = Set(d.zone_name.clone());
            am.cf_zone_id = Set(d.zone_id.clone());
            am.cf_record_id = Set(d.record_id.clone());
            am.is_proxied = Set(d.proxied);
            am.updated_at = Set(Utc::now().fixed_offset());
            am.update(self.db()).await?;
        }
        Ok(())
    }

    /// Persist a probe outcome: raw facts from the measurement plus the
    /// derived fields from the classifier. The stored status is only ever
    /// written through this method, keeping it a pure function of the facts.
    pub async fn apply_probe(
        &self,
        id: &str,
        m: &Measurement,
        c: &Classification,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let model = Entity::find_by_id(id)
            .one(self.db())
            .await?
            .ok_or_else(|| anyhow!("record '{id}' not found"))?;
        let mut am: domain_record::ActiveModel = model.into();

        match &m.tls {
            Some(t) => {
                am.issuer = Set(t.issuer.clone());
                am.not_before = Set(Some(t.not_before.fixed_offset()));
                am.not_after = Set(Some(t.not_after.fixed_offset()));
                am.sans = Set(if t.sans.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&t.sans)?)
                });
                am.tls_version = Set(t.protocol.clone());
            }
            None => {
                am.issuer = Set(String::new());
                am.not_before = Set(None);
                am.not_after = Set(None);
                am.sans = Set(None);
                am.tls_version = Set(String::new());
            }
        }

        am.http_status_code = Set(m.http_status.map(i32::from).unwrap_or(0));
        am.latency_ms = Set(m.latency_ms.unwrap_or(0));
        am.domain_expiry_date = Set(m.registry_expiry.map(|t| t.fixed_offset()));
        am.domain_days_left = Set(m.registry_expiry.map(|t| (t - now).num_days()));

        am.status = Set(c.status.as_str().to_string());
        am.days_remaining = Set(c.days_remaining);
        am.error_msg = Set(c.error_msg.clone());
        am.last_check_time = Set(Some(now.fixed_offset()));
        am.updated_at = Set(now.fixed_offset());

        am.update(self.db()).await?;
        Ok(())
    }

    pub async fn set_ignored(&self, id: &str, value: bool) -> Result<bool> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        match model {
            Some(m) => {
                let mut am: domain_record::ActiveModel = m.into();
                am.is_ignored = Set(value);
                am.updated_at = Set(Utc::now().fixed_offset());
                am.update(self.db()).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply the ignore flag to many records. Ids that fail (missing row,
    /// database error) are enumerated in the outcome; the rest still succeed.
    pub async fn batch_set_ignored(&self, ids: &[String], value: bool) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for id in ids {
            match self.set_ignored(id, value).await {
                Ok(true) => outcome.updated.push(id.clone()),
                Ok(false) => outcome.failed.push(BatchFailure {
                    id: id.clone(),
                    reason: "record not found".to_string(),
                }),
                Err(e) => outcome.failed.push(BatchFailure {
                    id: id.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn list_all(&self) -> Result<Vec<DomainRecord>> {
        let rows = Entity::find()
            .order_by(Column::DomainName, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(model_to_record).collect())
    }

    /// Records eligible for the scan cycle: ignored domains keep their frozen
    /// facts and are skipped.
    pub async fn list_scannable(&self) -> Result<Vec<DomainRecord>> {
        let rows = Entity::find()
            .filter(Column::IsIgnored.eq(false))
            .order_by(Column::DomainName, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(model_to_record).collect())
    }

    // ---- filtered listing ----

    pub async fn query(&self, q: &DomainQuery) -> Result<(Vec<DomainRecord>, u64)> {
        let mut find = Entity::find();

        match q.status.as_str() {
            "" => {}
            // "active_only": anything reachable and not ignored
            "active_only" => {
                find = find
                    .filter(Column::Status.ne(Status::Unresolvable.as_str()))
                    .filter(Column::IsIgnored.eq(false));
            }
            other => {
                let status: Status = other.parse().map_err(|e: String| anyhow!(e))?;
                find = find.filter(Column::Status.eq(status.as_str()));
            }
        }
        if let Some(proxied) = parse_bool_filter(&q.proxied, "proxied")? {
            find = find.filter(Column::IsProxied.eq(proxied));
        }
        if let Some(ignored) = parse_bool_filter(&q.ignored, "ignored")? {
            find = find.filter(Column::IsIgnored.eq(ignored));
        }
        if !q.zone.is_empty() {
            find = find.filter(Column::ZoneName.eq(q.zone.as_str()));
        }

        let total = find.clone().count(self.db()).await?;

        let (key, order) = parse_sort(&q.sort);
        find = if key.nullable() {
            find.order_by_with_nulls(key.column(), order, NullOrdering::Last)
        } else {
            find.order_by(key.column(), order)
        };
        // Stable tiebreak so pagination never duplicates rows
        find = find.order_by(Column::DomainName, Order::Asc);

        let limit = q.limit.max(1);
        let page = q.page.max(1);
        let rows = find
            .limit(limit)
            .offset((page - 1) * limit)
            .all(self.db())
            .await?;

        Ok((rows.into_iter().map(model_to_record).collect(), total))
    }

    pub async fn distinct_zones(&self) -> Result<Vec<String>> {
        let rows = self
            .db()
            .query_all(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT DISTINCT zone_name FROM domain_records \
                 WHERE zone_name != '' ORDER BY zone_name ASC"
                    .to_string(),
            ))
            .await?;
        let mut zones = Vec::with_capacity(rows.len());
        for row in rows {
            zones.push(row.try_get::<String>("", "zone_name")?);
        }
        Ok(zones)
    }

    // ---- dashboard aggregates ----

    /// Counters over non-ignored records only: totals, per-status counts,
    /// expiry buckets (≤7d / ≤30d) and per-issuer counts.
    pub async fn stats(&self) -> Result<DashboardStats> {
        let mut stats = DashboardStats::default();

        let rows = self
            .db()
            .query_all(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT status, COUNT(*) AS cnt FROM domain_records \
                 WHERE is_ignored = 0 GROUP BY status"
                    .to_string(),
            ))
            .await?;
        for row in rows {
            let status: String = row.try_get("", "status")?;
            let cnt: i64 = row.try_get("", "cnt")?;
            stats.total_domains += cnt as u64;
            stats.status_counts.insert(status, cnt as u64);
        }

        let rows = self
            .db()
            .query_all(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT
                    COALESCE(SUM(CASE WHEN days_remaining IS NOT NULL
                        AND days_remaining >= 0 AND days_remaining <= 7
                        THEN 1 ELSE 0 END), 0) AS within_7d,
                    COALESCE(SUM(CASE WHEN days_remaining IS NOT NULL
                        AND days_remaining >= 0 AND days_remaining <= 30
                        THEN 1 ELSE 0 END), 0) AS within_30d
                 FROM domain_records WHERE is_ignored = 0"
                    .to_string(),
            ))
            .await?;
        if let Some(row) = rows.into_iter().next() {
            let d7: i64 = row.try_get("", "within_7d")?;
            let d30: i64 = row.try_get("", "within_30d")?;
            stats.expiry_counts.insert("7d".to_string(), d7 as u64);
            stats.expiry_counts.insert("30d".to_string(), d30 as u64);
        }

        let rows = self
            .db()
            .query_all(Statement::from_string(
                DatabaseBackend::Sqlite,
                "SELECT issuer, COUNT(*) AS cnt FROM domain_records \
                 WHERE is_ignored = 0 AND issuer != '' GROUP BY issuer"
                    .to_string(),
            ))
            .await?;
        for row in rows {
            let issuer: String = row.try_get("", "issuer")?;
            let cnt: i64 = row.try_get("", "cnt")?;
            stats.issuer_counts.insert(issuer, cnt as u64);
        }

        Ok(stats)
    }
}
