use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{DeckId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck name cannot be empty")]
    EmptyName,
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// A named collection of cards owned by one user.
///
/// Deck CRUD lives outside the engine; the model exists so the selector and
/// session manager can check existence and ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    id: DeckId,
    owner_id: UserId,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl Deck {
    /// Creates a new deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if the name is empty or whitespace-only.
    pub fn new(
        id: DeckId,
        owner_id: UserId,
        name: impl Into<String>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DeckError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DeckError::EmptyName);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            owner_id,
            name: name.trim().to_owned(),
            description,
            created_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> DeckId {
        self.id
    }

    #[must_use]
    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
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
    fn deck_rejects_empty_name() {
        let err = Deck::new(DeckId::new(1), UserId::new(1), "  ", None, fixed_now()).unwrap_err();
        assert_eq!(err, DeckError::EmptyName);
    }

    #[test]
    fn deck_trims_name_and_description() {
        let deck = Deck::new(
            DeckId::new(1),
            UserId::new(9),
            "  Spanish  ",
            Some("  travel phrases  ".into()),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(deck.name(), "Spanish");
        assert_eq!(deck.description(), Some("travel phrases"));
        assert_eq!(deck.owner_id(), UserId::new(9));
    }

    #[test]
    fn deck_filters_empty_description() {
        let deck = Deck::new(
            DeckId::new(1),
            UserId::new(1),
            "French",
            Some("   ".into()),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(deck.description(), None);
    }
}
