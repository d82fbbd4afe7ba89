use chrono::{DateTime, Duration, Utc};

use crate::model::{CardId, CardProgress, CardReview, MIN_EASINESS, Quality, UserId};

//
// ─── SM-2 SCHEDULER ────────────────────────────────────────────────────────────
//

/// SM-2 spaced-repetition scheduler.
///
/// A pure function from (current progress, review quality, now) to the next
/// progress record. No I/O; persistence is the caller's responsibility.
///
/// The interval sequence for consecutive successful reviews is
/// 1 day, 6 days, then `round(previous_interval * easiness)`. A failing
/// quality (< 3) restarts the learning streak at a 1-day interval. The
/// easiness factor moves after every review and never drops below 1.3.
///
/// # Examples
///
/// ```
/// # use recall_core::scheduler::Sm2;
/// # use recall_core::model::{CardId, Quality, UserId};
/// # use recall_core::time::fixed_now;
/// let scheduler = Sm2::new();
/// let applied = scheduler.apply_review(
///     None,
///     CardId::new(1),
///     UserId::new(1),
///     Quality::EASY,
///     fixed_now(),
/// );
/// assert_eq!(applied.progress.repetitions, 1);
/// assert_eq!(applied.progress.interval_days, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Sm2 {
    first_interval_days: u32,
    second_interval_days: u32,
}

/// Outcome of applying a review: the next progress record plus a log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedReview {
    pub progress: CardProgress,
    pub log: CardReview,
}

impl Sm2 {
    /// Scheduler with the standard SM-2 fixed intervals (1 and 6 days).
    #[must_use]
    pub fn new() -> Self {
        Self {
            first_interval_days: 1,
            second_interval_days: 6,
        }
    }

    /// Compute the next progress record for a review of `quality` at `now`.
    ///
    /// The growth interval for repetitions beyond the second uses the
    /// easiness factor as it stood before this review; the factor update
    /// applies afterwards and is clamped to the 1.3 floor.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_progress(
        &self,
        current: &CardProgress,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> CardProgress {
        let (repetitions, interval_days) = if quality.is_passing() {
            let repetitions = current.repetitions + 1;
            let interval_days = match repetitions {
                1 => self.first_interval_days,
                2 => self.second_interval_days,
                _ => (f64::from(current.interval_days) * current.easiness).round() as u32,
            };
            (repetitions, interval_days)
        } else {
            (0, self.first_interval_days)
        };

        CardProgress {
            card_id: current.card_id,
            user_id: current.user_id,
            interval_days,
            easiness: next_easiness(current.easiness, quality),
            repetitions,
            next_review_at: Some(now + Duration::days(i64::from(interval_days))),
            last_reviewed_at: Some(now),
            last_quality: Some(quality),
        }
    }

    /// Apply a user's review, seeding fresh progress for a never-reviewed
    /// card, and return the new progress together with its log entry.
    #[must_use]
    pub fn apply_review(
        &self,
        previous: Option<&CardProgress>,
        card_id: CardId,
        user_id: UserId,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> AppliedReview {
        let seed;
        let current = match previous {
            Some(progress) => progress,
            None => {
                seed = CardProgress::new_for(card_id, user_id);
                &seed
            }
        };

        AppliedReview {
            progress: self.next_progress(current, quality, now),
            log: CardReview::new(card_id, quality, now),
        }
    }
}

impl Default for Sm2 {
    fn default() -> Self {
        Self::new()
    }
}

/// SM-2 easiness update: `e' = e + (0.1 - (5-q)(0.08 + (5-q) * 0.02))`,
/// clamped to the 1.3 floor.
fn next_easiness(current: f64, quality: Quality) -> f64 {
    let q = f64::from(quality.value());
    let delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
    (current + delta).max(MIN_EASINESS)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::INITIAL_EASINESS;
    use crate::time::fixed_now;

    fn quality(value: u8) -> Quality {
        Quality::new(value).unwrap()
    }

    fn progress_with(repetitions: u32, interval_days: u32, easiness: f64) -> CardProgress {
        CardProgress {
            card_id: CardId::new(1),
            user_id: UserId::new(1),
            interval_days,
            easiness,
            repetitions,
            next_review_at: Some(fixed_now()),
            last_reviewed_at: Some(fixed_now()),
            last_quality: Some(Quality::GOOD),
        }
    }

    #[test]
    fn failing_quality_resets_regardless_of_prior_state() {
        let scheduler = Sm2::new();
        let now = fixed_now();

        for value in 0..3 {
            for prior in [
                CardProgress::new_for(CardId::new(1), UserId::new(1)),
                progress_with(5, 30, 2.8),
            ] {
                let next = scheduler.next_progress(&prior, quality(value), now);
                assert_eq!(next.repetitions, 0);
                assert_eq!(next.interval_days, 1);
                assert_eq!(next.next_review_at, Some(now + Duration::days(1)));
            }
        }
    }

    #[test]
    fn passing_intervals_follow_one_six_then_growth() {
        let scheduler = Sm2::new();
        let now = fixed_now();
        let mut progress = CardProgress::new_for(CardId::new(1), UserId::new(1));

        progress = scheduler.next_progress(&progress, quality(4), now);
        assert_eq!((progress.repetitions, progress.interval_days), (1, 1));

        progress = scheduler.next_progress(&progress, quality(4), now);
        assert_eq!((progress.repetitions, progress.interval_days), (2, 6));

        let expected = (6.0 * progress.easiness).round() as u32;
        progress = scheduler.next_progress(&progress, quality(4), now);
        assert_eq!((progress.repetitions, progress.interval_days), (3, expected));
    }

    #[test]
    fn easiness_never_drops_below_floor() {
        let scheduler = Sm2::new();
        let now = fixed_now();
        let mut progress = CardProgress::new_for(CardId::new(1), UserId::new(1));

        for _ in 0..20 {
            progress = scheduler.next_progress(&progress, Quality::AGAIN, now);
            assert!(progress.easiness >= MIN_EASINESS);
        }
        assert!((progress.easiness - MIN_EASINESS).abs() < 1e-9);
    }

    #[test]
    fn first_review_at_quality_five() {
        let scheduler = Sm2::new();
        let now = fixed_now();

        let applied = scheduler.apply_review(
            None,
            CardId::new(7),
            UserId::new(2),
            Quality::EASY,
            now,
        );

        assert_eq!(applied.progress.repetitions, 1);
        assert_eq!(applied.progress.interval_days, 1);
        assert_eq!(applied.progress.next_review_at, Some(now + Duration::days(1)));
        assert_eq!(applied.progress.last_reviewed_at, Some(now));
        assert_eq!(applied.progress.last_quality, Some(Quality::EASY));
        assert_eq!(applied.log.card_id, CardId::new(7));
        assert_eq!(applied.log.quality, Quality::EASY);
    }

    #[test]
    fn third_review_multiplies_by_easiness() {
        // {repetitions: 2, interval: 6, easiness: 2.5} reviewed at quality 4:
        // interval round(6 * 2.5) = 15, easiness unchanged.
        let scheduler = Sm2::new();
        let prior = progress_with(2, 6, 2.5);

        let next = scheduler.next_progress(&prior, quality(4), fixed_now());
        assert_eq!(next.repetitions, 3);
        assert_eq!(next.interval_days, 15);
        assert!((next.easiness - 2.5).abs() < 1e-9);
    }

    #[test]
    fn failure_applies_full_easiness_penalty() {
        // {repetitions: 5, easiness: 2.0} at quality 0: easiness would drop
        // by 0.8, clamping at the floor.
        let scheduler = Sm2::new();
        let prior = progress_with(5, 30, 2.0);

        let next = scheduler.next_progress(&prior, Quality::AGAIN, fixed_now());
        assert_eq!(next.repetitions, 0);
        assert_eq!(next.interval_days, 1);
        assert!((next.easiness - MIN_EASINESS).abs() < 1e-9);
    }

    #[test]
    fn growth_interval_uses_pre_update_easiness() {
        // Quality 5 raises easiness by 0.1, but the interval for this review
        // is computed against the factor as it stood beforehand.
        let scheduler = Sm2::new();
        let prior = progress_with(3, 10, 2.5);

        let next = scheduler.next_progress(&prior, Quality::EASY, fixed_now());
        assert_eq!(next.interval_days, 25);
        assert!((next.easiness - 2.6).abs() < 1e-9);
    }

    #[test]
    fn quality_three_still_lowers_easiness() {
        let scheduler = Sm2::new();
        let prior = progress_with(1, 1, INITIAL_EASINESS);

        let next = scheduler.next_progress(&prior, Quality::GOOD, fixed_now());
        assert!((next.easiness - (INITIAL_EASINESS - 0.14)).abs() < 1e-9);
    }

    #[test]
    fn apply_review_with_prior_state_matches_next_progress() {
        let scheduler = Sm2::new();
        let now = fixed_now();
        let prior = progress_with(2, 6, 2.5);

        let applied = scheduler.apply_review(
            Some(&prior),
            prior.card_id,
            prior.user_id,
            quality(3),
            now,
        );
        let direct = scheduler.next_progress(&prior, quality(3), now);

        assert_eq!(applied.progress, direct);
        assert_eq!(applied.log.reviewed_at, now);
    }
}
