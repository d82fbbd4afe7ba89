use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{CardId, DeckId, SessionId, UserId};
use crate::model::review::{CardReview, Quality};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session is not active")]
    NotActive,

    #[error("session has already ended")]
    AlreadyEnded,

    #[error("session end time is before its start time")]
    InvalidTimeRange,
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Lifecycle state of a study session.
///
/// Modeled as a tagged variant rather than a nullable end time so that
/// illegal transitions are rejected here, not by scattered null checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Ended { ended_at: DateTime<Utc> },
}

//
// ─── STUDY SESSION ─────────────────────────────────────────────────────────────
//

/// One user's pass through a deck: started, fed sequential reviews, ended.
///
/// Reviews are append-only and ordered; once ended the session is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct StudySession {
    id: SessionId,
    user_id: UserId,
    deck_id: DeckId,
    started_at: DateTime<Utc>,
    state: SessionState,
    reviews: Vec<CardReview>,
}

impl StudySession {
    /// Open a new session.
    #[must_use]
    pub fn start(
        id: SessionId,
        user_id: UserId,
        deck_id: DeckId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            deck_id,
            started_at,
            state: SessionState::Active,
            reviews: Vec::new(),
        }
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidTimeRange` if the end time is
    /// before the start time.
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        deck_id: DeckId,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        reviews: Vec<CardReview>,
    ) -> Result<Self, SessionStateError> {
        let state = match ended_at {
            Some(ended_at) if ended_at < started_at => {
                return Err(SessionStateError::InvalidTimeRange);
            }
            Some(ended_at) => SessionState::Ended { ended_at },
            None => SessionState::Active,
        };

        Ok(Self {
            id,
            user_id,
            deck_id,
            started_at,
            state,
            reviews,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active)
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SessionState::Active => None,
            SessionState::Ended { ended_at } => Some(ended_at),
        }
    }

    #[must_use]
    pub fn reviews(&self) -> &[CardReview] {
        &self.reviews
    }

    /// Number of reviews recorded so far.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn total_reviewed(&self) -> u32 {
        self.reviews.len() as u32
    }

    /// Arithmetic mean of submitted qualities; 0.0 for a session with no
    /// reviews.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_quality(&self) -> f64 {
        if self.reviews.is_empty() {
            return 0.0;
        }
        let sum: u32 = self
            .reviews
            .iter()
            .map(|review| u32::from(review.quality.value()))
            .sum();
        f64::from(sum) / self.reviews.len() as f64
    }

    /// Append a review to an active session.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NotActive` if the session has ended.
    pub fn record_review(
        &mut self,
        card_id: CardId,
        quality: Quality,
        reviewed_at: DateTime<Utc>,
    ) -> Result<&CardReview, SessionStateError> {
        if !self.is_active() {
            return Err(SessionStateError::NotActive);
        }

        self.reviews
            .push(CardReview::new(card_id, quality, reviewed_at));
        self.reviews.last().ok_or(SessionStateError::NotActive)
    }

    /// Close the session. Terminal: no further mutation is permitted.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::AlreadyEnded` on a second end, or
    /// `SessionStateError::InvalidTimeRange` if `ended_at` precedes the
    /// start time.
    pub fn end(&mut self, ended_at: DateTime<Utc>) -> Result<(), SessionStateError> {
        if !self.is_active() {
            return Err(SessionStateError::AlreadyEnded);
        }
        if ended_at < self.started_at {
            return Err(SessionStateError::InvalidTimeRange);
        }

        self.state = SessionState::Ended { ended_at };
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
