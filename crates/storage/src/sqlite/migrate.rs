use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema: decks, cards, per-user card progress, user
/// settings with daily counters, study sessions with their review rows, and
/// the indexes the study queues rely on.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS decks (
                    id INTEGER PRIMARY KEY,
                    owner_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS cards (
                    id INTEGER NOT NULL,
                    deck_id INTEGER NOT NULL,
                    front TEXT NOT NULL,
                    back TEXT NOT NULL,
                    hint TEXT,
                    skill TEXT,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (id, deck_id),
                    FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS card_progress (
                    user_id INTEGER NOT NULL,
                    card_id INTEGER NOT NULL,
                    interval_days INTEGER NOT NULL CHECK (interval_days >= 0),
                    easiness REAL NOT NULL CHECK (easiness >= 1.3),
                    repetitions INTEGER NOT NULL CHECK (repetitions >= 0),
                    next_review_at TEXT,
                    last_reviewed_at TEXT,
                    last_quality INTEGER CHECK (last_quality BETWEEN 0 AND 5),
                    PRIMARY KEY (user_id, card_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_settings (
                    user_id INTEGER PRIMARY KEY,
                    daily_new_limit INTEGER NOT NULL CHECK (daily_new_limit >= 0),
                    daily_review_limit INTEGER NOT NULL CHECK (daily_review_limit >= 0),
                    new_completed_today INTEGER NOT NULL CHECK (new_completed_today >= 0),
                    reviews_completed_today INTEGER NOT NULL CHECK (reviews_completed_today >= 0),
                    rollover_hour INTEGER NOT NULL CHECK (rollover_hour BETWEEN 0 AND 23),
                    last_reset_date TEXT NOT NULL,
                    preferred_mode TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS study_sessions (
                    id TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    deck_id INTEGER NOT NULL,
                    started_at TEXT NOT NULL,
                    ended_at TEXT,
                    FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_reviews (
                    session_id TEXT NOT NULL,
                    seq INTEGER NOT NULL CHECK (seq >= 0),
                    card_id INTEGER NOT NULL,
                    quality INTEGER NOT NULL CHECK (quality BETWEEN 0 AND 5),
                    reviewed_at TEXT NOT NULL,
                    PRIMARY KEY (session_id, seq),
                    FOREIGN KEY (session_id) REFERENCES study_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_cards_deck_created
                    ON cards (deck_id, created_at, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_progress_user_next_review
                    ON card_progress (user_id, next_review_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_user_started
                    ON study_sessions (user_id, started_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
