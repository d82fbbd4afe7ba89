use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use recall_core::Clock;
use recall_core::model::{RolloverHour, StudyMode, UserId, UserSettings};
use storage::repository::SettingsRepository;

use crate::error::SettingsServiceError;

//
// ─── UPDATE & VIEW TYPES ───────────────────────────────────────────────────────
//

/// Caller-supplied settings change; counters are never written directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub daily_new_limit: u32,
    pub daily_review_limit: u32,
    /// Raw hour, validated against 0..=23 before anything is persisted.
    pub rollover_hour: u8,
    pub preferred_mode: StudyMode,
}

/// Wire-facing settings shape, including the live daily counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsView {
    pub user_id: UserId,
    pub daily_new_limit: u32,
    pub daily_review_limit: u32,
    pub new_completed_today: u32,
    pub reviews_completed_today: u32,
    pub rollover_hour: u8,
    pub last_reset_date: NaiveDate,
    pub preferred_mode: String,
}

impl From<&UserSettings> for SettingsView {
    fn from(settings: &UserSettings) -> Self {
        Self {
            user_id: settings.user_id(),
            daily_new_limit: settings.daily_new_limit(),
            daily_review_limit: settings.daily_review_limit(),
            new_completed_today: settings.new_completed_today(),
            reviews_completed_today: settings.reviews_completed_today(),
            rollover_hour: settings.rollover_hour().value(),
            last_reset_date: settings.last_reset_date(),
            preferred_mode: settings.preferred_mode().as_str().to_owned(),
        }
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Loads, lazily rolls over, and updates per-user settings.
#[derive(Clone)]
pub struct SettingsService {
    clock: Clock,
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn SettingsRepository>) -> Self {
        Self { clock, repo }
    }

    /// Load the user's settings with the daily counters rolled over.
    ///
    /// A user seen for the first time gets defaults. When the rollover
    /// boundary has passed since the last reset the zeroed counters are
    /// persisted, so repeated reads within one study day are stable.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` on storage failures.
    pub async fn current(&self, user_id: UserId) -> Result<UserSettings, SettingsServiceError> {
        let now = self.clock.now();
        self.load_rolled(user_id, now, true).await
    }

    /// Validate and apply a settings update, preserving today's counters.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError::Invalid` for an out-of-range rollover
    /// hour (rejected before any mutation), or storage failures.
    pub async fn update(
        &self,
        user_id: UserId,
        update: SettingsUpdate,
    ) -> Result<UserSettings, SettingsServiceError> {
        let rollover_hour = RolloverHour::new(update.rollover_hour)?;

        let current = self.current(user_id).await?;
        let updated = current.reconfigured(
            update.daily_new_limit,
            update.daily_review_limit,
            rollover_hour,
            update.preferred_mode,
        );
        self.repo.save_settings(&updated).await?;

        tracing::info!(
            user_id = user_id.value(),
            daily_new_limit = updated.daily_new_limit(),
            daily_review_limit = updated.daily_review_limit(),
            "updated user settings"
        );
        Ok(updated)
    }

    /// Rolled-over settings without persisting the reset.
    ///
    /// Used by read paths that must stay side-effect free, like due-card
    /// selection.
    pub(crate) async fn peek(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<UserSettings, SettingsServiceError> {
        self.load_rolled(user_id, now, false).await
    }

    async fn load_rolled(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        persist: bool,
    ) -> Result<UserSettings, SettingsServiceError> {
        let stored = self.repo.get_settings(user_id).await?;
        let missing = stored.is_none();
        let settings = stored.unwrap_or_else(|| UserSettings::default_for(user_id, now));
        let rolled = settings.clone().checked_rollover(now);

        if persist && (missing || rolled != settings) {
            self.repo.save_settings(&rolled).await?;
            if !missing {
                tracing::debug!(
                    user_id = user_id.value(),
                    reset_date = %rolled.last_reset_date(),
                    "daily counters rolled over"
                );
            }
        }

        Ok(rolled)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use recall_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service_at(now: DateTime<Utc>, repo: &InMemoryRepository) -> SettingsService {
        SettingsService::new(Clock::fixed(now), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn first_access_creates_defaults() {
        let repo = InMemoryRepository::new();
        let service = service_at(fixed_now(), &repo);
        let user = UserId::new(1);

        let settings = service.current(user).await.unwrap();
        assert_eq!(settings.daily_new_limit(), 10);
        assert_eq!(settings.new_completed_today(), 0);

        // Defaults were persisted on first access.
        assert!(repo.get_settings(user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rollover_is_persisted_on_read() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let start = fixed_now();

        let mut settings = UserSettings::default_for(user, start);
        settings.record_completion(true);
        settings.record_completion(false);
        repo.save_settings(&settings).await.unwrap();

        // Two days later the counters must read as zero and stay that way.
        let later = start + Duration::days(2);
        let service = service_at(later, &repo);
        let rolled = service.current(user).await.unwrap();
        assert_eq!(rolled.new_completed_today(), 0);
        assert_eq!(rolled.reviews_completed_today(), 0);

        let stored = repo.get_settings(user).await.unwrap().unwrap();
        assert_eq!(stored, rolled);

        // Reading again within the same day changes nothing.
        let again = service.current(user).await.unwrap();
        assert_eq!(again, rolled);
    }

    #[tokio::test]
    async fn update_rejects_bad_rollover_hour_before_writing() {
        let repo = InMemoryRepository::new();
        let service = service_at(fixed_now(), &repo);
        let user = UserId::new(1);

        let err = service
            .update(
                user,
                SettingsUpdate {
                    daily_new_limit: 5,
                    daily_review_limit: 50,
                    rollover_hour: 24,
                    preferred_mode: StudyMode::Learn,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsServiceError::Invalid(_)));

        // Nothing was written.
        assert!(repo.get_settings(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_preserves_counters() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let now = fixed_now();

        let mut settings = UserSettings::default_for(user, now);
        settings.record_completion(true);
        repo.save_settings(&settings).await.unwrap();

        let service = service_at(now, &repo);
        let updated = service
            .update(
                user,
                SettingsUpdate {
                    daily_new_limit: 20,
                    daily_review_limit: 200,
                    rollover_hour: 0,
                    preferred_mode: StudyMode::Cram,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.daily_new_limit(), 20);
        assert_eq!(updated.new_completed_today(), 1);
        assert_eq!(updated.preferred_mode(), StudyMode::Cram);
    }

    #[tokio::test]
    async fn peek_does_not_persist() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let service = service_at(fixed_now(), &repo);

        let peeked = service.peek(user, fixed_now()).await.unwrap();
        assert_eq!(peeked.daily_new_limit(), 10);
        assert!(repo.get_settings(user).await.unwrap().is_none());
    }

    #[test]
    fn view_exposes_live_counters() {
        let mut settings = UserSettings::default_for(UserId::new(3), fixed_now());
        settings.record_completion(false);

        let view = SettingsView::from(&settings);
        assert_eq!(view.reviews_completed_today, 1);
        assert_eq!(view.preferred_mode, "learn");
        assert_eq!(view.rollover_hour, 4);
    }
}
