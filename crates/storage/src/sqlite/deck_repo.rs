use recall_core::model::{Deck, DeckId};
use sqlx::Row;

use super::{SqliteRepository, mapping};
use crate::repository::{DeckRepository, StorageError};

#[async_trait::async_trait]
impl DeckRepository for SqliteRepository {
    async fn upsert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO decks (id, owner_id, name, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert
                owner_id = excluded.owner_id,
                name = excluded.name,
                description = excluded.description
            ",
        )
        .bind(mapping::id_to_i64("deck_id", deck.id().value())?)
        .bind(mapping::id_to_i64("owner_id", deck.owner_id().value())?)
        .bind(deck.name())
        .bind(deck.description())
        .bind(deck.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, owner_id, name, description, created_at
            FROM decks
            WHERE id = ?1
            ",
        )
        .bind(mapping::id_to_i64("deck_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let deck = Deck::new(
            mapping::deck_id_from_i64(
                row.try_get::<i64, _>("id")
                    .map_err(|e| StorageError::Serialization(e.to_string()))?,
            )?,
            mapping::user_id_from_i64(
                row.try_get::<i64, _>("owner_id")
                    .map_err(|e| StorageError::Serialization(e.to_string()))?,
            )?,
            row.try_get::<String, _>("name")
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
            row.try_get::<Option<String>, _>("description")
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
            row.try_get("created_at")
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(Some(deck))
    }
}
