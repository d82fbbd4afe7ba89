use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteArguments;

use recall_core::model::{
    CardId, CardProgress, CardReview, SessionId, UserId, UserSettings,
};

use super::settings_repo::bind_settings_upsert;
use super::{SqliteRepository, mapping};
use crate::repository::{ProgressRepository, StorageError, SubmissionPersistence};

const UPSERT_PROGRESS_SQL: &str = r"
    INSERT INTO card_progress (
        user_id, card_id, interval_days, easiness, repetitions,
        next_review_at, last_reviewed_at, last_quality
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(user_id, card_id) DO UPDATE SET
        interval_days = excluded.interval_days,
        easiness = excluded.easiness,
        repetitions = excluded.repetitions,
        next_review_at = excluded.next_review_at,
        last_reviewed_at = excluded.last_reviewed_at,
        last_quality = excluded.last_quality
";

pub(crate) fn bind_progress_upsert(
    progress: &CardProgress,
) -> Result<sqlx::query::Query<'static, sqlx::Sqlite, SqliteArguments<'static>>, StorageError> {
    Ok(sqlx::query(UPSERT_PROGRESS_SQL)
        .bind(mapping::id_to_i64("user_id", progress.user_id.value())?)
        .bind(mapping::id_to_i64("card_id", progress.card_id.value())?)
        .bind(i64::from(progress.interval_days))
        .bind(progress.easiness)
        .bind(i64::from(progress.repetitions))
        .bind(progress.next_review_at)
        .bind(progress.last_reviewed_at)
        .bind(progress.last_quality.map(|q| i64::from(q.value()))))
}

fn insert_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
    }
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user_id: UserId,
        card_id: CardId,
    ) -> Result<Option<CardProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, card_id, interval_days, easiness, repetitions,
                   next_review_at, last_reviewed_at, last_quality
            FROM card_progress
            WHERE user_id = ?1 AND card_id = ?2
            ",
        )
        .bind(mapping::id_to_i64("user_id", user_id.value())?)
        .bind(mapping::id_to_i64("card_id", card_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(mapping::map_progress_row).transpose()
    }

    async fn upsert_progress(&self, progress: &CardProgress) -> Result<(), StorageError> {
        bind_progress_upsert(progress)?
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubmissionPersistence for SqliteRepository {
    async fn persist_submission(
        &self,
        session_id: SessionId,
        seq: u32,
        review: &CardReview,
        progress: &CardProgress,
        settings: &UserSettings,
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        // The session must still be open at commit time; checking inside the
        // transaction closes the race against a concurrent end.
        let row = sqlx::query("SELECT ended_at FROM study_sessions WHERE id = ?1")
            .bind(session_id.value().to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let Some(row) = row else {
            return Err(StorageError::NotFound);
        };
        let ended_at: Option<DateTime<Utc>> = row
            .try_get("ended_at")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        if ended_at.is_some() {
            return Err(StorageError::Conflict);
        }

        bind_progress_upsert(progress)?
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        // The (session_id, seq) primary key turns a duplicate submission of
        // the same ordinal into a conflict instead of a double-counted review.
        sqlx::query(
            r"
            INSERT INTO session_reviews (session_id, seq, card_id, quality, reviewed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(session_id.value().to_string())
        .bind(i64::from(seq))
        .bind(mapping::id_to_i64("card_id", review.card_id.value())?)
        .bind(i64::from(review.quality.value()))
        .bind(review.reviewed_at)
        .execute(&mut *tx)
        .await
        .map_err(insert_err)?;

        bind_settings_upsert(settings)?
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
