use std::sync::Arc;

use recall_core::Clock;
use recall_core::model::{CardId, DeckId, Quality, SessionId, StudySession, UserId};
use recall_core::scheduler::Sm2;
use storage::repository::{
    CardRepository, DeckRepository, ProgressRepository, SessionRepository, StorageError,
    SubmissionPersistence,
};

use crate::error::StudyError;
use crate::settings_service::SettingsService;
use super::view::{CardView, ReviewFeedback, ReviewSubmissionResult, SessionSummaryView, SessionView};

/// Drives the study-session lifecycle: start, sequential review
/// submissions, end.
///
/// State lives in storage; every call rehydrates the session, lets the
/// domain state machine validate the transition, and persists the result.
/// A review submission commits the scheduler output, the session's review
/// row, and the daily counters in one atomic step.
#[derive(Clone)]
pub struct StudyService {
    clock: Clock,
    scheduler: Sm2,
    decks: Arc<dyn DeckRepository>,
    cards: Arc<dyn CardRepository>,
    progress: Arc<dyn ProgressRepository>,
    sessions: Arc<dyn SessionRepository>,
    submissions: Arc<dyn SubmissionPersistence>,
    settings: SettingsService,
}

impl StudyService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Clock,
        decks: Arc<dyn DeckRepository>,
        cards: Arc<dyn CardRepository>,
        progress: Arc<dyn ProgressRepository>,
        sessions: Arc<dyn SessionRepository>,
        submissions: Arc<dyn SubmissionPersistence>,
        settings: SettingsService,
    ) -> Self {
        Self {
            clock,
            scheduler: Sm2::new(),
            decks,
            cards,
            progress,
            sessions,
            submissions,
            settings,
        }
    }

    /// Open a new session for the given deck.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::DeckNotFound` for an unknown deck,
    /// `StudyError::Unauthorized` when the deck belongs to someone else, or
    /// storage failures.
    pub async fn start_session(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> Result<SessionView, StudyError> {
        let deck = self
            .decks
            .get_deck(deck_id)
            .await?
            .ok_or(StudyError::DeckNotFound)?;
        if deck.owner_id() != user_id {
            return Err(StudyError::Unauthorized);
        }

        let session = StudySession::start(
            SessionId::new_random(),
            user_id,
            deck_id,
            self.clock.now(),
        );
        self.sessions.insert_session(&session).await?;

        tracing::info!(
            user_id = user_id.value(),
            deck_id = deck_id.value(),
            session_id = %session.id(),
            "study session started"
        );
        Ok(SessionView::from(&session))
    }

    /// Submit one review for a card in an active session.
    ///
    /// Applies the scheduler, spends the daily budget, appends the review to
    /// the session, and persists all three atomically. Quality is validated
    /// before anything is read or written.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::InvalidQuality` for a quality outside 0..=5,
    /// `StudyError::SessionNotFound` / `StudyError::Unauthorized` /
    /// `StudyError::SessionNotActive` for lifecycle violations,
    /// `StudyError::CardNotFound` when the card is not in the session's
    /// deck, or storage failures.
    pub async fn submit_review(
        &self,
        user_id: UserId,
        session_id: SessionId,
        card_id: CardId,
        quality: u8,
    ) -> Result<ReviewSubmissionResult, StudyError> {
        let quality = Quality::new(quality)?;

        let mut session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(StudyError::SessionNotFound)?;
        if session.user_id() != user_id {
            return Err(StudyError::Unauthorized);
        }
        if !session.is_active() {
            return Err(StudyError::SessionNotActive);
        }

        let card = self
            .cards
            .get_card(session.deck_id(), card_id)
            .await?
            .ok_or(StudyError::CardNotFound)?;

        let now = self.clock.now();
        let previous = self.progress.get_progress(user_id, card_id).await?;
        let was_new_card = previous.is_none();
        let applied = self
            .scheduler
            .apply_review(previous.as_ref(), card_id, user_id, quality, now);

        let mut settings = self.settings.peek(user_id, now).await.map_err(|err| {
            match err {
                crate::error::SettingsServiceError::Storage(storage) => StudyError::Storage(storage),
                crate::error::SettingsServiceError::Invalid(invalid) => StudyError::Storage(
                    StorageError::Serialization(invalid.to_string()),
                ),
            }
        })?;
        settings.record_completion(was_new_card);

        let seq = session.total_reviewed();
        session.record_review(card_id, quality, now)?;

        match self
            .submissions
            .persist_submission(session_id, seq, &applied.log, &applied.progress, &settings)
            .await
        {
            Ok(()) => {}
            // The session was ended (or the same ordinal landed) between our
            // read and the commit; report it as a lifecycle violation.
            Err(StorageError::Conflict) => return Err(StudyError::SessionNotActive),
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(
            user_id = user_id.value(),
            session_id = %session_id,
            card_id = card_id.value(),
            quality = quality.value(),
            interval_days = applied.progress.interval_days,
            "review applied"
        );

        Ok(ReviewSubmissionResult {
            card: CardView::from(&card),
            feedback: ReviewFeedback::for_progress(&applied.progress),
            progress: applied.progress,
        })
    }

    /// Close an active session and compute its aggregate statistics.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::SessionNotFound` / `StudyError::Unauthorized`
    /// for access violations, `StudyError::SessionAlreadyEnded` on a second
    /// end, or storage failures.
    pub async fn end_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<SessionSummaryView, StudyError> {
        let mut session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(StudyError::SessionNotFound)?;
        if session.user_id() != user_id {
            return Err(StudyError::Unauthorized);
        }

        let ended_at = self.clock.now();
        session.end(ended_at)?;

        match self.sessions.finalize_session(session_id, ended_at).await {
            Ok(()) => {}
            // Lost the race against another end of the same session.
            Err(StorageError::Conflict) => return Err(StudyError::SessionAlreadyEnded),
            Err(err) => return Err(err.into()),
        }

        let summary = SessionSummaryView::from_session(&session);
        tracing::info!(
            user_id = user_id.value(),
            session_id = %session_id,
            total = summary.total_cards_reviewed,
            average_quality = summary.average_quality,
            "study session ended"
        );
        Ok(summary)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use recall_core::model::{Card, Deck};
    use recall_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, SettingsRepository};

    fn build_service(repo: &InMemoryRepository) -> StudyService {
        let clock = Clock::fixed(fixed_now());
        StudyService::new(
            clock,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            SettingsService::new(clock, Arc::new(repo.clone())),
        )
    }

    async fn seed(repo: &InMemoryRepository, owner: u64, cards: u64) -> Deck {
        let deck = Deck::new(
            DeckId::new(1),
            UserId::new(owner),
            "Deck",
            None,
            fixed_now(),
        )
        .unwrap();
        repo.upsert_deck(&deck).await.unwrap();
        for id in 1..=cards {
            let card = Card::new(
                CardId::new(id),
                deck.id(),
                format!("front {id}"),
                format!("back {id}"),
                None,
                None,
                fixed_now(),
            )
            .unwrap();
            repo.upsert_card(&card).await.unwrap();
        }
        deck
    }

    #[tokio::test]
    async fn start_requires_existing_owned_deck() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);

        let err = service
            .start_session(UserId::new(1), DeckId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::DeckNotFound));

        seed(&repo, 1, 1).await;
        let err = service
            .start_session(UserId::new(2), DeckId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Unauthorized));

        let view = service
            .start_session(UserId::new(1), DeckId::new(1))
            .await
            .unwrap();
        assert_eq!(view.deck_id, DeckId::new(1));
        assert_eq!(view.started_at, fixed_now());
    }

    #[tokio::test]
    async fn submit_review_updates_progress_counters_and_session() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);
        let deck = seed(&repo, 1, 2).await;
        let user = UserId::new(1);

        let session = service.start_session(user, deck.id()).await.unwrap();
        let result = service
            .submit_review(user, session.id, CardId::new(1), 5)
            .await
            .unwrap();

        assert_eq!(result.card.id, CardId::new(1));
        assert_eq!(result.progress.repetitions, 1);
        assert_eq!(result.progress.interval_days, 1);
        assert_eq!(result.feedback.message, "Next review tomorrow.");

        let settings = repo.get_settings(user).await.unwrap().unwrap();
        assert_eq!(settings.new_completed_today(), 1);
        assert_eq!(settings.reviews_completed_today(), 0);

        // Reviewing the same card again counts toward the review budget.
        service
            .submit_review(user, session.id, CardId::new(1), 3)
            .await
            .unwrap();
        let settings = repo.get_settings(user).await.unwrap().unwrap();
        assert_eq!(settings.new_completed_today(), 1);
        assert_eq!(settings.reviews_completed_today(), 1);

        let stored = repo.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.total_reviewed(), 2);
    }

    #[tokio::test]
    async fn invalid_quality_is_rejected_before_any_mutation() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);
        let deck = seed(&repo, 1, 1).await;
        let user = UserId::new(1);

        let session = service.start_session(user, deck.id()).await.unwrap();
        let err = service
            .submit_review(user, session.id, CardId::new(1), 6)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::InvalidQuality(_)));

        assert!(repo.get_progress(user, CardId::new(1)).await.unwrap().is_none());
        let stored = repo.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.total_reviewed(), 0);
    }

    #[tokio::test]
    async fn review_authorization_and_lookup_failures() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);
        let deck = seed(&repo, 1, 1).await;
        let user = UserId::new(1);

        let err = service
            .submit_review(user, SessionId::new_random(), CardId::new(1), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::SessionNotFound));

        let session = service.start_session(user, deck.id()).await.unwrap();

        let err = service
            .submit_review(UserId::new(2), session.id, CardId::new(1), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Unauthorized));

        let err = service
            .submit_review(user, session.id, CardId::new(42), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::CardNotFound));
    }

    #[tokio::test]
    async fn session_lifecycle_is_enforced() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);
        let deck = seed(&repo, 1, 1).await;
        let user = UserId::new(1);

        let session = service.start_session(user, deck.id()).await.unwrap();
        service
            .submit_review(user, session.id, CardId::new(1), 4)
            .await
            .unwrap();

        let summary = service.end_session(user, session.id).await.unwrap();
        assert_eq!(summary.total_cards_reviewed, 1);
        assert_eq!(summary.average_quality, 4.0);

        let err = service
            .submit_review(user, session.id, CardId::new(1), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::SessionNotActive));

        let err = service.end_session(user, session.id).await.unwrap_err();
        assert!(matches!(err, StudyError::SessionAlreadyEnded));
    }

    #[tokio::test]
    async fn ending_an_empty_session_yields_zero_average() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);
        let deck = seed(&repo, 1, 1).await;
        let user = UserId::new(1);

        let session = service.start_session(user, deck.id()).await.unwrap();
        let summary = service.end_session(user, session.id).await.unwrap();

        assert_eq!(summary.total_cards_reviewed, 0);
        assert_eq!(summary.average_quality, 0.0);
        assert_eq!(summary.ended_at, fixed_now());
    }

    #[tokio::test]
    async fn end_session_checks_ownership() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);
        let deck = seed(&repo, 1, 1).await;

        let session = service
            .start_session(UserId::new(1), deck.id())
            .await
            .unwrap();
        let err = service
            .end_session(UserId::new(2), session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Unauthorized));
    }

    #[tokio::test]
    async fn scheduling_carries_across_submissions() {
        let repo = InMemoryRepository::new();
        let deck = seed(&repo, 1, 1).await;
        let user = UserId::new(1);
        let now = fixed_now();

        // First review today.
        let service = build_service(&repo);
        let session = service.start_session(user, deck.id()).await.unwrap();
        service
            .submit_review(user, session.id, CardId::new(1), 4)
            .await
            .unwrap();

        // Second review the next day sees the stored progress.
        let later_clock = Clock::fixed(now + Duration::days(1));
        let later = StudyService::new(
            later_clock,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            SettingsService::new(later_clock, Arc::new(repo.clone())),
        );
        let session2 = later.start_session(user, deck.id()).await.unwrap();
        let result = later
            .submit_review(user, session2.id, CardId::new(1), 4)
            .await
            .unwrap();

        assert_eq!(result.progress.repetitions, 2);
        assert_eq!(result.progress.interval_days, 6);
        assert_eq!(result.feedback.message, "Next review in 6 days.");
    }
}
