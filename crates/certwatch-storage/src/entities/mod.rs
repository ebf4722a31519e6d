pub mod domain_record;
pub mod notification_setting;
