use std::sync::Arc;

use thiserror::Error;

use recall_core::Clock;
use recall_core::model::{Card, CardId, DeckId, SessionId, StudyMode, UserId, UserSettings};
use storage::repository::Storage;
use storage::sqlite::SqliteInitError;

use crate::error::{SelectorError, SettingsServiceError, StudyError};
use crate::selector::DueCardService;
use crate::sessions::{ReviewSubmissionResult, SessionSummaryView, SessionView, StudyService};
use crate::settings_service::{SettingsService, SettingsUpdate};

/// Errors emitted while bootstrapping the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

/// Assembles the engine services over one storage backend.
///
/// The methods map one-to-one onto the operations the engine is consumed
/// through: due-card selection, session start/review/end, and settings
/// read/update. Transport concerns (HTTP, auth token handling) live with
/// the caller.
#[derive(Clone)]
pub struct StudyEngine {
    settings: SettingsService,
    selector: DueCardService,
    study: StudyService,
}

impl StudyEngine {
    /// Build the engine over an already-connected storage backend.
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock) -> Self {
        let settings = SettingsService::new(clock, Arc::clone(&storage.settings));
        let selector = DueCardService::new(
            clock,
            Arc::clone(&storage.decks),
            Arc::clone(&storage.cards),
            settings.clone(),
        );
        let study = StudyService::new(
            clock,
            Arc::clone(&storage.decks),
            Arc::clone(&storage.cards),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.submissions),
            settings.clone(),
        );

        Self {
            settings,
            selector,
            study,
        }
    }

    /// Build the engine backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the connection or migrations fail.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, EngineError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock))
    }

    /// Cards eligible to study now for the given deck and mode.
    ///
    /// # Errors
    ///
    /// See [`DueCardService::select_due`].
    pub async fn due_cards(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        mode: StudyMode,
        skill: Option<&str>,
    ) -> Result<Vec<Card>, SelectorError> {
        self.selector.select_due(user_id, deck_id, mode, skill).await
    }

    /// Open a study session for a deck.
    ///
    /// # Errors
    ///
    /// See [`StudyService::start_session`].
    pub async fn start_session(
        &self,
        user_id: UserId,
        deck_id: DeckId,
    ) -> Result<SessionView, StudyError> {
        self.study.start_session(user_id, deck_id).await
    }

    /// Submit one review for a card within an active session.
    ///
    /// # Errors
    ///
    /// See [`StudyService::submit_review`].
    pub async fn submit_review(
        &self,
        user_id: UserId,
        session_id: SessionId,
        card_id: CardId,
        quality: u8,
    ) -> Result<ReviewSubmissionResult, StudyError> {
        self.study
            .submit_review(user_id, session_id, card_id, quality)
            .await
    }

    /// End an active session, producing its aggregate statistics.
    ///
    /// # Errors
    ///
    /// See [`StudyService::end_session`].
    pub async fn end_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<SessionSummaryView, StudyError> {
        self.study.end_session(user_id, session_id).await
    }

    /// The user's settings with live daily counters.
    ///
    /// # Errors
    ///
    /// See [`SettingsService::current`].
    pub async fn settings(&self, user_id: UserId) -> Result<UserSettings, SettingsServiceError> {
        self.settings.current(user_id).await
    }

    /// Validate and apply a settings update.
    ///
    /// # Errors
    ///
    /// See [`SettingsService::update`].
    pub async fn update_settings(
        &self,
        user_id: UserId,
        update: SettingsUpdate,
    ) -> Result<UserSettings, SettingsServiceError> {
        self.settings.update(user_id, update).await
    }
}
