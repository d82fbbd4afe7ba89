use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{CardId, DeckId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardError {
    #[error("card front cannot be empty")]
    EmptyFront,

    #[error("card back cannot be empty")]
    EmptyBack,
}

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

/// A front/back flashcard belonging to a deck.
///
/// Cards optionally carry a hint shown on demand and a `skill` tag used by
/// the due-card selector to narrow a study queue (e.g. "listening").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    id: CardId,
    deck_id: DeckId,
    front: String,
    back: String,
    hint: Option<String>,
    skill: Option<String>,
    created_at: DateTime<Utc>,
}

impl Card {
    /// Creates a new card.
    ///
    /// Front and back are trimmed; hint and skill are trimmed and dropped
    /// when empty.
    ///
    /// # Errors
    ///
    /// Returns `CardError` if the front or back is empty or whitespace-only.
    pub fn new(
        id: CardId,
        deck_id: DeckId,
        front: impl Into<String>,
        back: impl Into<String>,
        hint: Option<String>,
        skill: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CardError> {
        let front = front.into();
        if front.trim().is_empty() {
            return Err(CardError::EmptyFront);
        }
        let back = back.into();
        if back.trim().is_empty() {
            return Err(CardError::EmptyBack);
        }

        Ok(Self {
            id,
            deck_id,
            front: front.trim().to_owned(),
            back: back.trim().to_owned(),
            hint: normalize_optional(hint),
            skill: normalize_optional(skill),
            created_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> CardId {
        self.id
    }

    #[must_use]
    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    #[must_use]
    pub fn front(&self) -> &str {
        &self.front
    }

    #[must_use]
    pub fn back(&self) -> &str {
        &self.back
    }

    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    #[must_use]
    pub fn skill(&self) -> Option<&str> {
        self.skill.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_owned())
        .filter(|val| !val.is_empty())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn card_rejects_empty_front() {
        let err = Card::new(
            CardId::new(1),
            DeckId::new(1),
            "   ",
            "hola",
            None,
            None,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, CardError::EmptyFront);
    }

    #[test]
    fn card_rejects_empty_back() {
        let err = Card::new(
            CardId::new(1),
            DeckId::new(1),
            "hello",
            " ",
            None,
            None,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, CardError::EmptyBack);
    }

    #[test]
    fn card_trims_fields_and_filters_blank_hint() {
        let card = Card::new(
            CardId::new(3),
            DeckId::new(2),
            "  hello ",
            " hola ",
            Some("   ".into()),
            Some(" vocabulary ".into()),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(card.front(), "hello");
        assert_eq!(card.back(), "hola");
        assert_eq!(card.hint(), None);
        assert_eq!(card.skill(), Some("vocabulary"));
    }
}
