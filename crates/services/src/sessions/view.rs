use chrono::{DateTime, Utc};
use serde::Serialize;

use recall_core::model::{Card, CardId, CardProgress, DeckId, SessionId, StudySession};

//
// ─── CARD VIEW ─────────────────────────────────────────────────────────────────
//

/// Wire-facing card shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub id: CardId,
    pub deck_id: DeckId,
    pub front: String,
    pub back: String,
    pub hint: Option<String>,
    pub skill: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id(),
            deck_id: card.deck_id(),
            front: card.front().to_owned(),
            back: card.back().to_owned(),
            hint: card.hint().map(str::to_owned),
            skill: card.skill().map(str::to_owned),
            created_at: card.created_at(),
        }
    }
}

//
// ─── SESSION VIEWS ─────────────────────────────────────────────────────────────
//

/// A freshly started session as returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub id: SessionId,
    pub deck_id: DeckId,
    pub started_at: DateTime<Utc>,
}

impl From<&StudySession> for SessionView {
    fn from(session: &StudySession) -> Self {
        Self {
            id: session.id(),
            deck_id: session.deck_id(),
            started_at: session.started_at(),
        }
    }
}

/// One recorded review inside a session summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewedCardView {
    pub card_id: CardId,
    pub quality: u8,
    pub reviewed_at: DateTime<Utc>,
}

/// Aggregate view of an ended session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummaryView {
    pub id: SessionId,
    pub deck_id: DeckId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_cards_reviewed: u32,
    pub average_quality: f64,
    pub reviewed_cards: Vec<ReviewedCardView>,
}

impl SessionSummaryView {
    /// Build the summary for an ended session.
    ///
    /// Callers guarantee the session has ended; an active session falls back
    /// to its start time rather than panicking.
    #[must_use]
    pub fn from_session(session: &StudySession) -> Self {
        Self {
            id: session.id(),
            deck_id: session.deck_id(),
            started_at: session.started_at(),
            ended_at: session.ended_at().unwrap_or_else(|| session.started_at()),
            total_cards_reviewed: session.total_reviewed(),
            average_quality: session.average_quality(),
            reviewed_cards: session
                .reviews()
                .iter()
                .map(|review| ReviewedCardView {
                    card_id: review.card_id,
                    quality: review.quality.value(),
                    reviewed_at: review.reviewed_at,
                })
                .collect(),
        }
    }
}

//
// ─── REVIEW FEEDBACK ───────────────────────────────────────────────────────────
//

/// Human-readable outcome of one review submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewFeedback {
    pub next_review_at: Option<DateTime<Utc>>,
    pub interval_days: u32,
    pub message: String,
}

impl ReviewFeedback {
    #[must_use]
    pub fn for_progress(progress: &CardProgress) -> Self {
        Self {
            next_review_at: progress.next_review_at,
            interval_days: progress.interval_days,
            message: interval_message(progress.interval_days),
        }
    }
}

fn interval_message(interval_days: u32) -> String {
    match interval_days {
        0 => "Review again today.".to_owned(),
        1 => "Next review tomorrow.".to_owned(),
        n => format!("Next review in {n} days."),
    }
}

/// Result of submitting one review: updated card state plus feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSubmissionResult {
    pub card: CardView,
    pub progress: CardProgress,
    pub feedback: ReviewFeedback,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::model::{Quality, UserId};
    use recall_core::scheduler::Sm2;
    use recall_core::time::fixed_now;

    #[test]
    fn feedback_message_phrasing() {
        assert_eq!(interval_message(1), "Next review tomorrow.");
        assert_eq!(interval_message(6), "Next review in 6 days.");
        assert_eq!(interval_message(0), "Review again today.");
    }

    #[test]
    fn feedback_reflects_progress() {
        let applied = Sm2::new().apply_review(
            None,
            CardId::new(1),
            UserId::new(1),
            Quality::GOOD,
            fixed_now(),
        );

        let feedback = ReviewFeedback::for_progress(&applied.progress);
        assert_eq!(feedback.interval_days, 1);
        assert_eq!(feedback.next_review_at, applied.progress.next_review_at);
        assert_eq!(feedback.message, "Next review tomorrow.");
    }

    #[test]
    fn summary_of_empty_session_has_zero_average() {
        let mut session = StudySession::start(
            SessionId::new_random(),
            UserId::new(1),
            DeckId::new(1),
            fixed_now(),
        );
        session.end(fixed_now()).unwrap();

        let summary = SessionSummaryView::from_session(&session);
        assert_eq!(summary.total_cards_reviewed, 0);
        assert_eq!(summary.average_quality, 0.0);
        assert!(summary.reviewed_cards.is_empty());
    }
}
