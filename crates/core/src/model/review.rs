use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::CardId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors that can occur when interpreting review input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("review quality must be between 0 and 5, got {0}")]
    InvalidQuality(u8),
}

//
// ─── QUALITY ───────────────────────────────────────────────────────────────────
//

/// Recall quality submitted after a card's answer is revealed.
///
/// The engine accepts the full 0–5 integer range; clients typically submit
/// only the four discrete tiers exposed as constants here
/// (Again/Hard/Good/Easy). Qualities below 3 count as failures and restart
/// a card's learning streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    /// Complete recall failure; the card is relearned from scratch.
    pub const AGAIN: Quality = Quality(0);
    /// Recalled, but with serious difficulty.
    pub const HARD: Quality = Quality(2);
    /// Recalled correctly with some effort.
    pub const GOOD: Quality = Quality(3);
    /// Recalled instantly.
    pub const EASY: Quality = Quality(5);

    /// Validates a raw quality value.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidQuality` if the value is not in 0..=5.
    pub fn new(value: u8) -> Result<Self, ReviewError> {
        if value > 5 {
            return Err(ReviewError::InvalidQuality(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Whether this quality counts as a successful recall (>= 3).
    #[must_use]
    pub fn is_passing(&self) -> bool {
        self.0 >= 3
    }
}

//
// ─── CARD REVIEW ───────────────────────────────────────────────────────────────
//

/// Record of one card review inside a study session.
///
/// Append-only; insertion order within a session is review order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardReview {
    pub card_id: CardId,
    pub quality: Quality,
    pub reviewed_at: DateTime<Utc>,
}

impl CardReview {
    #[must_use]
    pub fn new(card_id: CardId, quality: Quality, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            card_id,
            quality,
            reviewed_at,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn quality_accepts_full_range() {
        for value in 0..=5 {
            assert_eq!(Quality::new(value).unwrap().value(), value);
        }
    }

    #[test]
    fn quality_rejects_out_of_range() {
        let err = Quality::new(6).unwrap_err();
        assert_eq!(err, ReviewError::InvalidQuality(6));
    }

    #[test]
    fn passing_threshold_is_three() {
        assert!(!Quality::AGAIN.is_passing());
        assert!(!Quality::HARD.is_passing());
        assert!(Quality::GOOD.is_passing());
        assert!(Quality::EASY.is_passing());
    }

    #[test]
    fn review_creation_works() {
        let review = CardReview::new(CardId::new(10), Quality::GOOD, fixed_now());
        assert_eq!(review.card_id, CardId::new(10));
        assert_eq!(review.quality, Quality::GOOD);
    }
}
