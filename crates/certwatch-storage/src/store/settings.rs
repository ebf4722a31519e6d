use anyhow::Result;
use certwatch_common::types::NotificationSettings;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};

use crate::entities::notification_setting::{self, Entity};
use crate::store::DomainStore;

// Single-row settings table, keyed by a fixed id.
const SETTINGS_ROW_ID: &str = "default";

impl DomainStore {
    /// Load the notification settings, falling back to defaults when the row
    /// is missing or its payload no longer parses.
    pub async fn get_settings(&self) -> Result<NotificationSettings> {
        let model = Entity::find_by_id(SETTINGS_ROW_ID).one(self.db()).await?;
        let Some(m) = model else {
            return Ok(NotificationSettings::default());
        };
        match serde_json::from_str(&m.config_json) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(error = %e, "stored notification settings are unreadable, using defaults");
                Ok(NotificationSettings::default())
            }
        }
    }

    pub async fn save_settings(&self, settings: &NotificationSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        let now = Utc::now().fixed_offset();
        let existing = Entity::find_by_id(SETTINGS_ROW_ID).one(self.db()).await?;
        match existing {
            Some(m) => {
                let mut am: notification_setting::ActiveModel = m.into();
                am.config_json = Set(json);
                am.updated_at = Set(now);
                am.update(self.db()).await?;
            }
            None => {
                let am = notification_setting::ActiveModel {
                    id: Set(SETTINGS_ROW_ID.to_string()),
                    config_json: Set(json),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                am.insert(self.db()).await?;
            }
        }
        Ok(())
    }

    pub async fn set_acme_email(&self, email: &str) -> Result<NotificationSettings> {
        let mut settings = self.get_settings().await?;
        settings.acme_email = email.to_string();
        self.save_settings(&settings).await?;
        Ok(settings)
    }
}
