use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{CardId, UserId};
use crate::model::review::Quality;

/// Easiness factor assigned to a card that has never been reviewed.
pub const INITIAL_EASINESS: f64 = 2.5;

/// Hard floor for the easiness factor.
pub const MIN_EASINESS: f64 = 1.3;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("easiness must be at least {MIN_EASINESS}, got {provided}")]
    EasinessBelowFloor { provided: f64 },

    #[error("repetitions must be 0 after a failed review, got {repetitions}")]
    RepetitionsAfterFailure { repetitions: u32 },
}

//
// ─── CARD PROGRESS ─────────────────────────────────────────────────────────────
//

/// Per-user scheduling state for one card.
///
/// Created implicitly on a card's first review and mutated only by the
/// scheduler. `next_review_at == None` means the card has never been
/// scheduled (a "new" card).
#[derive(Debug, Clone, PartialEq)]
pub struct CardProgress {
    pub card_id: CardId,
    pub user_id: UserId,
    /// Days until the next review; 0 for a never-reviewed card.
    pub interval_days: u32,
    pub easiness: f64,
    /// Count of consecutive successful reviews; resets on failure.
    pub repetitions: u32,
    pub next_review_at: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub last_quality: Option<Quality>,
}

impl CardProgress {
    /// State for a card the user has never reviewed.
    #[must_use]
    pub fn new_for(card_id: CardId, user_id: UserId) -> Self {
        Self {
            card_id,
            user_id,
            interval_days: 0,
            easiness: INITIAL_EASINESS,
            repetitions: 0,
            next_review_at: None,
            last_reviewed_at: None,
            last_quality: None,
        }
    }

    /// Rehydrate progress from persisted storage, checking invariants.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::EasinessBelowFloor` if easiness is below 1.3,
    /// or `ProgressError::RepetitionsAfterFailure` if the most recent review
    /// failed yet repetitions is non-zero.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        card_id: CardId,
        user_id: UserId,
        interval_days: u32,
        easiness: f64,
        repetitions: u32,
        next_review_at: Option<DateTime<Utc>>,
        last_reviewed_at: Option<DateTime<Utc>>,
        last_quality: Option<Quality>,
    ) -> Result<Self, ProgressError> {
        if easiness < MIN_EASINESS {
            return Err(ProgressError::EasinessBelowFloor { provided: easiness });
        }
        if let Some(quality) = last_quality {
            if !quality.is_passing() && repetitions != 0 {
                return Err(ProgressError::RepetitionsAfterFailure { repetitions });
            }
        }

        Ok(Self {
            card_id,
            user_id,
            interval_days,
            easiness,
            repetitions,
            next_review_at,
            last_reviewed_at,
            last_quality,
        })
    }

    /// Whether the card has never been reviewed by this user.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.last_reviewed_at.is_none()
    }

    /// Whether the card is scheduled and its due date has arrived.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at.is_some_and(|due| due <= now)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
