use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::{
    models::preferences::{NotificationPreferences, PreferencesUpdate},
    services::store::PreferencesStore,
};

const PREF_COLUMNS: &str = "user_id, email_enabled, meal_reminders_enabled, lead_minutes, \
    weekly_summary_enabled, weekly_summary_day, weekly_summary_time, \
    breakfast_time, lunch_time, dinner_time, snack_time, timezone, created_at, updated_at";

#[async_trait]
impl PreferencesStore for PgStore {
    async fn get_or_create(&self, user_id: Uuid) -> anyhow::Result<NotificationPreferences> {
        // Column defaults match NotificationPreferences::defaults
        sqlx::query("INSERT INTO notification_preferences (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to create notification preferences")?;

        sqlx::query_as::<_, NotificationPreferences>(&format!(
            "SELECT {PREF_COLUMNS} FROM notification_preferences WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to load notification preferences")
    }

    async fn update(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> anyhow::Result<NotificationPreferences> {
        let mut prefs = self.get_or_create(user_id).await?;
        prefs.apply(update)?;

        sqlx::query_as::<_, NotificationPreferences>(&format!(
            "UPDATE notification_preferences SET
                 email_enabled = $2,
                 meal_reminders_enabled = $3,
                 lead_minutes = $4,
                 weekly_summary_enabled = $5,
                 weekly_summary_day = $6,
                 weekly_summary_time = $7,
                 breakfast_time = $8,
                 lunch_time = $9,
                 dinner_time = $10,
                 snack_time = $11,
                 timezone = $12,
                 updated_at = NOW()
             WHERE user_id = $1
             RETURNING {PREF_COLUMNS}"
        ))
        .bind(user_id)
        .bind(prefs.email_enabled)
        .bind(prefs.meal_reminders_enabled)
        .bind(prefs.lead_minutes)
        .bind(prefs.weekly_summary_enabled)
        .bind(&prefs.weekly_summary_day)
        .bind(&prefs.weekly_summary_time)
        .bind(&prefs.breakfast_time)
        .bind(&prefs.lunch_time)
        .bind(&prefs.dinner_time)
        .bind(&prefs.snack_time)
        .bind(&prefs.timezone)
        .fetch_one(&self.pool)
        .await
        .context("Failed to update notification preferences")
    }
}
