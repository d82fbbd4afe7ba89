use chrono::{DateTime, Utc};
use recall_core::model::{Card, CardId, DeckId, UserId};

use super::{SqliteRepository, mapping};
use crate::repository::{CardRepository, StorageError};

const CARD_COLUMNS: &str = "c.id, c.deck_id, c.front, c.back, c.hint, c.skill, c.created_at";

#[async_trait::async_trait]
impl CardRepository for SqliteRepository {
    async fn upsert_card(&self, card: &Card) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO cards (id, deck_id, front, back, hint, skill, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id, deck_id) DO UPDATE SET
                -- keep created_at from the original insert; only update mutable fields
                front = excluded.front,
                back = excluded.back,
                hint = excluded.hint,
                skill = excluded.skill
            ",
        )
        .bind(mapping::id_to_i64("card_id", card.id().value())?)
        .bind(mapping::id_to_i64("deck_id", card.deck_id().value())?)
        .bind(card.front())
        .bind(card.back())
        .bind(card.hint())
        .bind(card.skill())
        .bind(card.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_card(&self, deck_id: DeckId, id: CardId) -> Result<Option<Card>, StorageError> {
        let row = sqlx::query(&format!(
            r"
            SELECT {CARD_COLUMNS}
            FROM cards c
            WHERE c.deck_id = ?1 AND c.id = ?2
            "
        ))
        .bind(mapping::id_to_i64("deck_id", deck_id.value())?)
        .bind(mapping::id_to_i64("card_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(mapping::map_card_row).transpose()
    }

    async fn new_cards(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Card>, StorageError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let skill_clause = if skill.is_some() {
            "AND c.skill = ?4"
        } else {
            ""
        };
        let sql = format!(
            r"
            SELECT {CARD_COLUMNS}
            FROM cards c
            WHERE c.deck_id = ?1
              AND NOT EXISTS (
                  SELECT 1 FROM card_progress p
                  WHERE p.user_id = ?2 AND p.card_id = c.id
              )
              {skill_clause}
            ORDER BY c.created_at ASC, c.id ASC
            LIMIT ?3
            "
        );

        let mut query = sqlx::query(&sql)
            .bind(mapping::id_to_i64("deck_id", deck_id.value())?)
            .bind(mapping::id_to_i64("user_id", user_id.value())?)
            .bind(i64::from(limit));
        if let Some(skill) = skill {
            query = query.bind(skill);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(mapping::map_card_row).collect()
    }

    async fn due_cards(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Card>, StorageError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let skill_clause = if skill.is_some() {
            "AND c.skill = ?5"
        } else {
            ""
        };
        let sql = format!(
            r"
            SELECT {CARD_COLUMNS}
            FROM cards c
            JOIN card_progress p ON p.card_id = c.id AND p.user_id = ?2
            WHERE c.deck_id = ?1
              AND p.next_review_at IS NOT NULL
              AND p.next_review_at <= ?3
              {skill_clause}
            ORDER BY p.next_review_at ASC, c.created_at ASC, c.id ASC
            LIMIT ?4
            "
        );

        let mut query = sqlx::query(&sql)
            .bind(mapping::id_to_i64("deck_id", deck_id.value())?)
            .bind(mapping::id_to_i64("user_id", user_id.value())?)
            .bind(now)
            .bind(i64::from(limit));
        if let Some(skill) = skill {
            query = query.bind(skill);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(mapping::map_card_row).collect()
    }

    async fn deck_cards_by_due(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        skill: Option<&str>,
    ) -> Result<Vec<Card>, StorageError> {
        let skill_clause = if skill.is_some() {
            "AND c.skill = ?3"
        } else {
            ""
        };
        // `IS NOT NULL` sorts to 0 for missing progress, putting new cards first.
        let sql = format!(
            r"
            SELECT {CARD_COLUMNS}
            FROM cards c
            LEFT JOIN card_progress p ON p.card_id = c.id AND p.user_id = ?2
            WHERE c.deck_id = ?1
              {skill_clause}
            ORDER BY p.next_review_at IS NOT NULL, p.next_review_at ASC,
                     c.created_at ASC, c.id ASC
            "
        );

        let mut query = sqlx::query(&sql)
            .bind(mapping::id_to_i64("deck_id", deck_id.value())?)
            .bind(mapping::id_to_i64("user_id", user_id.value())?);
        if let Some(skill) = skill {
            query = query.bind(skill);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(mapping::map_card_row).collect()
    }
}
