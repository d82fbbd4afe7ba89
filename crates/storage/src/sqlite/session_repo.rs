use chrono::{DateTime, Utc};
use sqlx::Row;

use recall_core::model::{CardReview, SessionId, StudySession};

use super::{SqliteRepository, mapping};
use crate::repository::{SessionRepository, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &StudySession) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO study_sessions (id, user_id, deck_id, started_at, ended_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(session.id().value().to_string())
        .bind(mapping::id_to_i64("user_id", session.user_id().value())?)
        .bind(mapping::id_to_i64("deck_id", session.deck_id().value())?)
        .bind(session.started_at())
        .bind(session.ended_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StorageError::Conflict;
                }
            }
            conn(e)
        })?;

        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<StudySession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, deck_id, started_at, ended_at
            FROM study_sessions
            WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id_str = row.try_get::<String, _>("id").map_err(ser)?;
        let session_id = SessionId::new(uuid::Uuid::parse_str(&id_str).map_err(ser)?);
        let user_id = mapping::user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?;
        let deck_id = mapping::deck_id_from_i64(row.try_get::<i64, _>("deck_id").map_err(ser)?)?;
        let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;
        let ended_at: Option<DateTime<Utc>> = row.try_get("ended_at").map_err(ser)?;

        let review_rows = sqlx::query(
            r"
            SELECT card_id, quality, reviewed_at
            FROM session_reviews
            WHERE session_id = ?1
            ORDER BY seq ASC
            ",
        )
        .bind(id.value().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let reviews: Vec<CardReview> = review_rows
            .iter()
            .map(mapping::map_review_row)
            .collect::<Result<_, _>>()?;

        let session = StudySession::from_persisted(
            session_id, user_id, deck_id, started_at, ended_at, reviews,
        )
        .map_err(ser)?;

        Ok(Some(session))
    }

    async fn finalize_session(
        &self,
        id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE study_sessions
            SET ended_at = ?2
            WHERE id = ?1 AND ended_at IS NULL
            ",
        )
        .bind(id.value().to_string())
        .bind(ended_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM study_sessions WHERE id = ?1")
                .bind(id.value().to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(conn)?;
            return Err(if exists.is_some() {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        Ok(())
    }
}
