use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use recall_core::model::{
    Card, CardId, CardProgress, CardReview, Deck, DeckId, SessionId, StudySession, UserId,
    UserSettings,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository contract for decks.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Persist or update a deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck cannot be stored.
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError>;

    /// Fetch a deck by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing deck is `None`.
    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError>;
}

/// Repository contract for cards and the study queues built over them.
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Persist or update a card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the card cannot be stored.
    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError>;

    /// Fetch one card of a deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing card is `None`.
    async fn get_card(&self, deck_id: DeckId, id: CardId) -> Result<Option<Card>, StorageError>;

    /// Cards of a deck the user has never reviewed, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn new_cards(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Card>, StorageError>;

    /// Cards of a deck whose next review date has arrived, ascending by due
    /// date with ties broken by creation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn due_cards(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Card>, StorageError>;

    /// Every card of a deck, never-reviewed cards first, then ascending by
    /// the user's next review date.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn deck_cards_by_due(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
    ) -> Result<Vec<Card>, StorageError>;
}

/// Repository contract for per-user card scheduling state.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch a user's progress on one card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; no record yet is `None`.
    async fn get_progress(
        &self,
        user_id: UserId,
        card_id: CardId,
    ) -> Result<Option<CardProgress>, StorageError>;

    /// Persist or update a progress record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, progress: &CardProgress) -> Result<(), StorageError>;
}

/// Repository contract for per-user settings and daily counters.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Fetch a user's settings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; no row yet is `None`.
    async fn get_settings(&self, user_id: UserId) -> Result<Option<UserSettings>, StorageError>;

    /// Persist or update a user's settings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the settings cannot be stored.
    async fn save_settings(&self, settings: &UserSettings) -> Result<(), StorageError>;
}

/// Repository contract for study sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a freshly started session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists.
    async fn insert_session(&self, session: &StudySession) -> Result<(), StorageError>;

    /// Fetch a session with its recorded reviews, in review order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing session is `None`.
    async fn get_session(&self, id: SessionId) -> Result<Option<StudySession>, StorageError>;

    /// Mark a session as ended.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist and
    /// `StorageError::Conflict` if it has already ended.
    async fn finalize_session(
        &self,
        id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Atomic persistence of one review submission.
///
/// A submission touches three rows (progress, session review, settings
/// counters); they must commit or fail together so that two concurrent
/// reviews of the same card cannot interleave partial updates.
#[async_trait]
pub trait SubmissionPersistence: Send + Sync {
    /// Persist the review at position `seq` of the session, the updated
    /// progress record, and the updated daily counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist,
    /// `StorageError::Conflict` if the session has ended or `seq` was
    /// already taken by a concurrent submission, or other storage errors.
    async fn persist_submission(
        &self,
        session_id: SessionId,
        seq: u32,
        review: &CardReview,
        progress: &CardProgress,
        settings: &UserSettings,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

/// Simple in-memory repository for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    decks: Arc<Mutex<HashMap<DeckId, Deck>>>,
    cards: Arc<Mutex<HashMap<(DeckId, CardId), Card>>>,
    progress: Arc<Mutex<HashMap<(UserId, CardId), CardProgress>>>,
    settings: Arc<Mutex<HashMap<UserId, UserSettings>>>,
    sessions: Arc<Mutex<HashMap<SessionId, StudySession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn deck_cards(&self, deck_id: DeckId, skill: Option<&str>) -> Result<Vec<Card>, StorageError> {
        let guard = self
            .cards
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|card| card.deck_id() == deck_id)
            .filter(|card| skill.is_none_or(|wanted| card.skill() == Some(wanted)))
            .cloned()
            .collect())
    }

    fn progress_for(
        &self,
        user_id: UserId,
        card_id: CardId,
    ) -> Result<Option<CardProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id, card_id)).cloned())
    }
}

#[async_trait]
impl DeckRepository for InMemoryRepository {
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let mut guard = self
            .decks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(deck.id(), deck.clone());
        Ok(())
    }

    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError> {
        let guard = self
            .decks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }
}

#[async_trait]
impl CardRepository for InMemoryRepository {
    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError> {
        let mut guard = self
            .cards
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((card.deck_id(), card.id()), card.clone());
        Ok(())
    }

    async fn get_card(&self, deck_id: DeckId, id: CardId) -> Result<Option<Card>, StorageError> {
        let guard = self
            .cards
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(deck_id, id)).cloned())
    }

    async fn new_cards(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Card>, StorageError> {
        let mut cards = Vec::new();
        for card in self.deck_cards(deck_id, skill)? {
            if self.progress_for(user_id, card.id())?.is_none() {
                cards.push(card);
            }
        }
        cards.sort_by_key(|card| (card.created_at(), card.id().value()));
        cards.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(cards)
    }

    async fn due_cards(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Card>, StorageError> {
        let mut due = Vec::new();
        for card in self.deck_cards(deck_id, skill)? {
            if let Some(progress) = self.progress_for(user_id, card.id())? {
                if progress.is_due(now) {
                    due.push((progress.next_review_at, card));
                }
            }
        }
        due.sort_by_key(|(next, card)| (*next, card.created_at(), card.id().value()));
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(due.into_iter().map(|(_, card)| card).collect())
    }

    async fn deck_cards_by_due(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
    ) -> Result<Vec<Card>, StorageError> {
        let mut cards = Vec::new();
        for card in self.deck_cards(deck_id, skill)? {
            let next = self
                .progress_for(user_id, card.id())?
                .and_then(|progress| progress.next_review_at);
            cards.push((next, card));
        }
        // `Option` orders `None` first, which puts never-reviewed cards up front.
        cards.sort_by_key(|(next, card)| (*next, card.created_at(), card.id().value()));
        Ok(cards.into_iter().map(|(_, card)| card).collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        card_id: CardId,
    ) -> Result<Option<CardProgress>, StorageError> {
        self.progress_for(user_id, card_id)
    }

    async fn upsert_progress(&self, progress: &CardProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((progress.user_id, progress.card_id), progress.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_settings(&self, user_id: UserId) -> Result<Option<UserSettings>, StorageError> {
        let guard = self
            .settings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&user_id).cloned())
    }

    async fn save_settings(&self, settings: &UserSettings) -> Result<(), StorageError> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(settings.user_id(), settings.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &StudySession) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(session.id(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<StudySession>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }

    async fn finalize_session(
        &self,
        id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let session = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        session.end(ended_at).map_err(|_| StorageError::Conflict)
    }
}

#[async_trait]
impl SubmissionPersistence for InMemoryRepository {
    async fn persist_submission(
        &self,
        session_id: SessionId,
        seq: u32,
        review: &CardReview,
        progress: &CardProgress,
        settings: &UserSettings,
    ) -> Result<(), StorageError> {
        {
            let mut guard = self
                .sessions
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            let session = guard.get_mut(&session_id).ok_or(StorageError::NotFound)?;
            if session.total_reviewed() != seq {
                return Err(StorageError::Conflict);
            }
            session
                .record_review(review.card_id, review.quality, review.reviewed_at)
                .map_err(|_| StorageError::Conflict)?;
        }

        self.upsert_progress(progress).await?;
        self.save_settings(settings).await?;
        Ok(())
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub decks: Arc<dyn DeckRepository>,
    pub cards: Arc<dyn CardRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub submissions: Arc<dyn SubmissionPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            decks: Arc::new(repo.clone()),
            cards: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            settings: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            submissions: Arc::new(repo),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
