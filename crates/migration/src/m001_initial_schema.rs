use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS domain_records (
    id TEXT PRIMARY KEY NOT NULL,
    domain_name TEXT NOT NULL UNIQUE,
    zone_name TEXT NOT NULL DEFAULT '',
    cf_zone_id TEXT NOT NULL DEFAULT '',
    cf_record_id TEXT NOT NULL DEFAULT '',
    is_proxied INTEGER NOT NULL DEFAULT 0,
    is_ignored INTEGER NOT NULL DEFAULT 0,
    auto_renew INTEGER NOT NULL DEFAULT 0,
    issuer TEXT NOT NULL DEFAULT '',
    not_before TEXT,
    not_after TEXT,
    sans TEXT,
    tls_version TEXT NOT NULL DEFAULT '',
    http_status_code INTEGER NOT NULL DEFAULT 0,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    domain_expiry_date TEXT,
    domain_days_left INTEGER,
    status TEXT NOT NULL DEFAULT 'pending',
    days_remaining INTEGER,
    error_msg TEXT,
    last_check_time TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_domain_records_domain ON domain_records(domain_name);
CREATE INDEX IF NOT EXISTS idx_domain_records_status ON domain_records(status);
CREATE INDEX IF NOT EXISTS idx_domain_records_zone ON domain_records(zone_name);
CREATE INDEX IF NOT EXISTS idx_domain_records_ignored ON domain_records(is_ignored);

CREATE TABLE IF NOT EXISTS notification_settings (
    id TEXT PRIMARY KEY NOT NULL,
    config_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS notification_settings;
DROP TABLE IF EXISTS domain_records;
";
