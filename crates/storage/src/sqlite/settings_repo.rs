use sqlx::sqlite::SqliteArguments;

use recall_core::model::{UserId, UserSettings};

use super::{SqliteRepository, mapping};
use crate::repository::{SettingsRepository, StorageError};

const UPSERT_SETTINGS_SQL: &str = r"
    INSERT INTO user_settings (
        user_id, daily_new_limit, daily_review_limit,
        new_completed_today, reviews_completed_today,
        rollover_hour, last_reset_date, preferred_mode
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(user_id) DO UPDATE SET
        daily_new_limit = excluded.daily_new_limit,
        daily_review_limit = excluded.daily_review_limit,
        new_completed_today = excluded.new_completed_today,
        reviews_completed_today = excluded.reviews_completed_today,
        rollover_hour = excluded.rollover_hour,
        last_reset_date = excluded.last_reset_date,
        preferred_mode = excluded.preferred_mode
";

pub(crate) fn bind_settings_upsert(
    settings: &UserSettings,
) -> Result<sqlx::query::Query<'static, sqlx::Sqlite, SqliteArguments<'static>>, StorageError> {
    Ok(sqlx::query(UPSERT_SETTINGS_SQL)
        .bind(mapping::id_to_i64("user_id", settings.user_id().value())?)
        .bind(i64::from(settings.daily_new_limit()))
        .bind(i64::from(settings.daily_review_limit()))
        .bind(i64::from(settings.new_completed_today()))
        .bind(i64::from(settings.reviews_completed_today()))
        .bind(i64::from(settings.rollover_hour().value()))
        .bind(settings.last_reset_date())
        .bind(settings.preferred_mode().as_str()))
}

#[async_trait::async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_settings(&self, user_id: UserId) -> Result<Option<UserSettings>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, daily_new_limit, daily_review_limit,
                   new_completed_today, reviews_completed_today,
                   rollover_hour, last_reset_date, preferred_mode
            FROM user_settings
            WHERE user_id = ?1
            ",
        )
        .bind(mapping::id_to_i64("user_id", user_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(mapping::map_settings_row).transpose()
    }

    async fn save_settings(&self, settings: &UserSettings) -> Result<(), StorageError> {
        bind_settings_upsert(settings)?
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
