use std::sync::Arc;

use recall_core::Clock;
use recall_core::model::{Card, DeckId, StudyMode, UserId};
use storage::repository::{CardRepository, DeckRepository};

use crate::error::{SelectorError, SettingsServiceError};
use crate::settings_service::SettingsService;

/// Builds the ordered study queue for a deck under the user's daily limits.
///
/// Selection never mutates counters; budgets are computed from a rolled-over
/// view of the settings and only actual review submissions spend them.
#[derive(Clone)]
pub struct DueCardService {
    clock: Clock,
    decks: Arc<dyn DeckRepository>,
    cards: Arc<dyn CardRepository>,
    settings: SettingsService,
}

impl DueCardService {
    #[must_use]
    pub fn new(
        clock: Clock,
        decks: Arc<dyn DeckRepository>,
        cards: Arc<dyn CardRepository>,
        settings: SettingsService,
    ) -> Self {
        Self {
            clock,
            decks,
            cards,
            settings,
        }
    }

    /// Cards eligible to study now, ordered deterministically.
    ///
    /// - `Learn`: never-reviewed cards in creation order, capped at the
    ///   remaining daily new-card budget.
    /// - `Review`: due cards ascending by next review date, ties broken by
    ///   creation order, capped at the remaining daily review budget.
    /// - `Cram`: the whole deck, due dates and budgets ignored, new cards
    ///   first.
    ///
    /// An exhausted budget yields an empty queue, not an error.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::DeckNotFound` for an unknown deck,
    /// `SelectorError::Unauthorized` when the deck belongs to someone else,
    /// or storage failures.
    pub async fn select_due(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        mode: StudyMode,
        skill: Option<&str>,
    ) -> Result<Vec<Card>, SelectorError> {
        let deck = self
            .decks
            .get_deck(deck_id)
            .await?
            .ok_or(SelectorError::DeckNotFound)?;
        if deck.owner_id() != user_id {
            return Err(SelectorError::Unauthorized);
        }

        let now = self.clock.now();
        let queue = match mode {
            StudyMode::Cram => self.cards.deck_cards_by_due(user_id, deck_id, skill).await?,
            StudyMode::Learn => {
                let budget = self.budgets(user_id).await?.0;
                if budget == 0 {
                    return Ok(Vec::new());
                }
                self.cards.new_cards(user_id, deck_id, skill, budget).await?
            }
            StudyMode::Review => {
                let budget = self.budgets(user_id).await?.1;
                if budget == 0 {
                    return Ok(Vec::new());
                }
                self.cards
                    .due_cards(user_id, deck_id, skill, now, budget)
                    .await?
            }
        };

        tracing::debug!(
            user_id = user_id.value(),
            deck_id = deck_id.value(),
            mode = %mode,
            selected = queue.len(),
            "built study queue"
        );
        Ok(queue)
    }

    async fn budgets(&self, user_id: UserId) -> Result<(u32, u32), SelectorError> {
        let settings = self
            .settings
            .peek(user_id, self.clock.now())
            .await
            .map_err(|err| match err {
                SettingsServiceError::Storage(storage) => SelectorError::Storage(storage),
                // `peek` never validates input, so this arm is unreachable in
                // practice; surface it as a serialization fault if it happens.
                SettingsServiceError::Invalid(invalid) => SelectorError::Storage(
                    storage::repository::StorageError::Serialization(invalid.to_string()),
                ),
            })?;
        Ok((
            settings.remaining_new_budget(),
            settings.remaining_review_budget(),
        ))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
