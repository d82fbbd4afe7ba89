use chrono::{DateTime, NaiveDate, Timelike, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::UserId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("rollover hour must be between 0 and 23, got {0}")]
    InvalidRolloverHour(u8),

    #[error("unknown study mode: {0}")]
    InvalidMode(String),
}

//
// ─── ROLLOVER HOUR ─────────────────────────────────────────────────────────────
//

/// UTC hour at which a user's study day begins.
///
/// Counters of new cards and reviews completed "today" reset when the
/// current time crosses this hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloverHour(u8);

impl RolloverHour {
    /// Validates an hour value.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidRolloverHour` if the hour is not in 0..=23.
    pub fn new(hour: u8) -> Result<Self, SettingsError> {
        if hour > 23 {
            return Err(SettingsError::InvalidRolloverHour(hour));
        }
        Ok(Self(hour))
    }

    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for RolloverHour {
    /// 04:00 UTC, so late-evening study counts toward the same day.
    fn default() -> Self {
        Self(4)
    }
}

//
// ─── STUDY MODE ────────────────────────────────────────────────────────────────
//

/// How a study queue is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyMode {
    /// New cards only, capped at the remaining daily new-card budget.
    Learn,
    /// Due cards only, capped at the remaining daily review budget.
    Review,
    /// Every card in the deck; due dates and daily limits are ignored.
    Cram,
}

impl StudyMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::Learn => "learn",
            StudyMode::Review => "review",
            StudyMode::Cram => "cram",
        }
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "learn" => Ok(StudyMode::Learn),
            "review" => Ok(StudyMode::Review),
            "cram" => Ok(StudyMode::Cram),
            other => Err(SettingsError::InvalidMode(other.to_owned())),
        }
    }
}

//
// ─── USER SETTINGS ─────────────────────────────────────────────────────────────
//

/// Per-user study limits and live daily counters.
///
/// The daily counters roll over lazily: every read path calls
/// [`UserSettings::checked_rollover`] instead of relying on a background
/// job, so counter state is consistent regardless of request timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    user_id: UserId,
    daily_new_limit: u32,
    daily_review_limit: u32,
    new_completed_today: u32,
    reviews_completed_today: u32,
    rollover_hour: RolloverHour,
    last_reset_date: NaiveDate,
    preferred_mode: StudyMode,
}

impl UserSettings {
    /// Default limits for a user seen for the first time.
    #[must_use]
    pub fn default_for(user_id: UserId, now: DateTime<Utc>) -> Self {
        let rollover_hour = RolloverHour::default();
        Self {
            user_id,
            daily_new_limit: 10,
            daily_review_limit: 100,
            new_completed_today: 0,
            reviews_completed_today: 0,
            rollover_hour,
            last_reset_date: rollover_date(now, rollover_hour),
            preferred_mode: StudyMode::Learn,
        }
    }

    /// Rehydrate settings from persisted storage.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        daily_new_limit: u32,
        daily_review_limit: u32,
        new_completed_today: u32,
        reviews_completed_today: u32,
        rollover_hour: RolloverHour,
        last_reset_date: NaiveDate,
        preferred_mode: StudyMode,
    ) -> Self {
        Self {
            user_id,
            daily_new_limit,
            daily_review_limit,
            new_completed_today,
            reviews_completed_today,
            rollover_hour,
            last_reset_date,
            preferred_mode,
        }
    }

    // Accessors
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn daily_new_limit(&self) -> u32 {
        self.daily_new_limit
    }

    #[must_use]
    pub fn daily_review_limit(&self) -> u32 {
        self.daily_review_limit
    }

    #[must_use]
    pub fn new_completed_today(&self) -> u32 {
        self.new_completed_today
    }

    #[must_use]
    pub fn reviews_completed_today(&self) -> u32 {
        self.reviews_completed_today
    }

    #[must_use]
    pub fn rollover_hour(&self) -> RolloverHour {
        self.rollover_hour
    }

    #[must_use]
    pub fn last_reset_date(&self) -> NaiveDate {
        self.last_reset_date
    }

    #[must_use]
    pub fn preferred_mode(&self) -> StudyMode {
        self.preferred_mode
    }

    /// Reset the daily counters if `now` has crossed the rollover boundary
    /// since the last reset.
    ///
    /// Idempotent: calling this twice within the same study day returns the
    /// same settings both times.
    #[must_use]
    pub fn checked_rollover(mut self, now: DateTime<Utc>) -> Self {
        let boundary = rollover_date(now, self.rollover_hour);
        if boundary > self.last_reset_date {
            self.new_completed_today = 0;
            self.reviews_completed_today = 0;
            self.last_reset_date = boundary;
        }
        self
    }

    /// New cards this user may still start today.
    #[must_use]
    pub fn remaining_new_budget(&self) -> u32 {
        self.daily_new_limit.saturating_sub(self.new_completed_today)
    }

    /// Reviews this user may still do today.
    #[must_use]
    pub fn remaining_review_budget(&self) -> u32 {
        self.daily_review_limit
            .saturating_sub(self.reviews_completed_today)
    }

    /// Count one completed review toward today's totals.
    ///
    /// The limits are advisory for selection; recording never caps.
    pub fn record_completion(&mut self, was_new_card: bool) {
        if was_new_card {
            self.new_completed_today = self.new_completed_today.saturating_add(1);
        } else {
            self.reviews_completed_today = self.reviews_completed_today.saturating_add(1);
        }
    }

    /// Apply a settings update, preserving today's counters and reset date.
    #[must_use]
    pub fn reconfigured(
        mut self,
        daily_new_limit: u32,
        daily_review_limit: u32,
        rollover_hour: RolloverHour,
        preferred_mode: StudyMode,
    ) -> Self {
        self.daily_new_limit = daily_new_limit;
        self.daily_review_limit = daily_review_limit;
        self.rollover_hour = rollover_hour;
        self.preferred_mode = preferred_mode;
        self
    }
}

/// The study-day date that `now` belongs to.
///
/// Before the rollover hour the time still counts toward the previous day.
fn rollover_date(now: DateTime<Utc>, rollover_hour: RolloverHour) -> NaiveDate {
    let date = now.date_naive();
    if now.hour() >= u32::from(rollover_hour.value()) {
        date
    } else {
        date.pred_opt().unwrap_or(date)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 30, 0).unwrap()
    }

    fn settings_with_counts(new_done: u32, reviews_done: u32, now: DateTime<Utc>) -> UserSettings {
        let mut settings = UserSettings::default_for(UserId::new(1), now);
        for _ in 0..new_done {
            settings.record_completion(true);
        }
        for _ in 0..reviews_done {
            settings.record_completion(false);
        }
        settings
    }

    #[test]
    fn rollover_hour_rejects_out_of_range() {
        assert_eq!(
            RolloverHour::new(24).unwrap_err(),
            SettingsError::InvalidRolloverHour(24)
        );
        assert_eq!(RolloverHour::new(23).unwrap().value(), 23);
    }

    #[test]
    fn study_mode_round_trips_through_str() {
        for mode in [StudyMode::Learn, StudyMode::Review, StudyMode::Cram] {
            assert_eq!(mode.as_str().parse::<StudyMode>().unwrap(), mode);
        }
        assert!(matches!(
            "drill".parse::<StudyMode>(),
            Err(SettingsError::InvalidMode(_))
        ));
    }

    #[test]
    fn counters_survive_within_the_same_day() {
        let now = at(2025, 3, 14, 10);
        let settings = settings_with_counts(3, 7, now);

        let later = settings.clone().checked_rollover(now + Duration::hours(5));
        assert_eq!(later, settings);
    }

    #[test]
    fn checked_rollover_resets_after_boundary() {
        let now = at(2025, 3, 14, 10);
        let settings = settings_with_counts(3, 7, now);

        // Next day, past the 04:00 rollover hour.
        let rolled = settings.checked_rollover(at(2025, 3, 15, 5));
        assert_eq!(rolled.new_completed_today(), 0);
        assert_eq!(rolled.reviews_completed_today(), 0);
        assert_eq!(
            rolled.last_reset_date(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
    }

    #[test]
    fn before_rollover_hour_counts_toward_previous_day() {
        let evening = at(2025, 3, 14, 22);
        let settings = settings_with_counts(2, 0, evening);

        // 02:00 the next calendar day is still the same study day.
        let small_hours = at(2025, 3, 15, 2);
        let rolled = settings.clone().checked_rollover(small_hours);
        assert_eq!(rolled.new_completed_today(), 2);

        // 04:30 crosses the boundary.
        let after = settings.checked_rollover(at(2025, 3, 15, 4));
        assert_eq!(after.new_completed_today(), 0);
    }

    #[test]
    fn checked_rollover_is_idempotent() {
        let settings = settings_with_counts(1, 1, at(2025, 3, 14, 10));
        let later = at(2025, 3, 16, 12);

        let once = settings.clone().checked_rollover(later);
        let twice = settings.checked_rollover(later).checked_rollover(later);
        assert_eq!(once, twice);
    }

    #[test]
    fn budgets_saturate_at_zero() {
        let now = at(2025, 3, 14, 10);
        let mut settings = UserSettings::default_for(UserId::new(1), now)
            .reconfigured(2, 3, RolloverHour::default(), StudyMode::Learn);

        for _ in 0..5 {
            settings.record_completion(true);
        }
        assert_eq!(settings.new_completed_today(), 5);
        assert_eq!(settings.remaining_new_budget(), 0);
        assert_eq!(settings.remaining_review_budget(), 3);
    }

    #[test]
    fn reconfigured_preserves_counters() {
        let now = at(2025, 3, 14, 10);
        let settings = settings_with_counts(4, 9, now).reconfigured(
            20,
            200,
            RolloverHour::new(0).unwrap(),
            StudyMode::Cram,
        );

        assert_eq!(settings.daily_new_limit(), 20);
        assert_eq!(settings.new_completed_today(), 4);
        assert_eq!(settings.reviews_completed_today(), 9);
        assert_eq!(settings.preferred_mode(), StudyMode::Cram);
    }
}
