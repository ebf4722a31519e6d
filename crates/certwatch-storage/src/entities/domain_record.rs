use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "domain_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub domain_name: String,
    pub zone_name: String,
    pub cf_zone_id: String,
    pub cf_record_id: String,
    pub is_proxied: bool,
    pub is_ignored: bool,
    pub auto_renew: bool,
    pub issuer: String,
    pub not_before: Option<DateTimeWithTimeZone>,
    pub not_after: Option<DateTimeWithTimeZone>,
    pub sans: Option<String>,
    pub tls_version: String,
    pub http_status_code: i32,
    pub latency_ms: i64,
    pub domain_expiry_date: Option<DateTimeWithTimeZone>,
    pub domain_days_left: Option<i64>,
    pub status: String,
    pub days_remaining: Option<i64>,
    pub error_msg: Option<String>,
    pub last_check_time: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
