use sqlx::Row;

use recall_core::model::{
    Card, CardId, CardProgress, CardReview, DeckId, Quality, RolloverHour, StudyMode, UserId,
    UserSettings,
};

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn deck_id_from_i64(v: i64) -> Result<DeckId, StorageError> {
    Ok(DeckId::new(i64_to_u64("deck_id", v)?))
}

pub(crate) fn card_id_from_i64(v: i64) -> Result<CardId, StorageError> {
    Ok(CardId::new(i64_to_u64("card_id", v)?))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

/// Converts a stored integer quality (0..=5) back into `Quality`.
pub(crate) fn quality_from_i64(value: i64) -> Result<Quality, StorageError> {
    let raw = u8::try_from(value)
        .map_err(|_| StorageError::Serialization(format!("invalid quality: {value}")))?;
    Quality::new(raw).map_err(ser)
}

pub(crate) fn mode_from_str(s: &str) -> Result<StudyMode, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn map_card_row(row: &sqlx::sqlite::SqliteRow) -> Result<Card, StorageError> {
    Card::new(
        card_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        deck_id_from_i64(row.try_get::<i64, _>("deck_id").map_err(ser)?)?,
        row.try_get::<String, _>("front").map_err(ser)?,
        row.try_get::<String, _>("back").map_err(ser)?,
        row.try_get::<Option<String>, _>("hint").map_err(ser)?,
        row.try_get::<Option<String>, _>("skill").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CardProgress, StorageError> {
    let last_quality = row
        .try_get::<Option<i64>, _>("last_quality")
        .map_err(ser)?
        .map(quality_from_i64)
        .transpose()?;

    CardProgress::from_persisted(
        card_id_from_i64(row.try_get::<i64, _>("card_id").map_err(ser)?)?,
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        i64_to_u32(
            "interval_days",
            row.try_get::<i64, _>("interval_days").map_err(ser)?,
        )?,
        row.try_get("easiness").map_err(ser)?,
        i64_to_u32(
            "repetitions",
            row.try_get::<i64, _>("repetitions").map_err(ser)?,
        )?,
        row.try_get("next_review_at").map_err(ser)?,
        row.try_get("last_reviewed_at").map_err(ser)?,
        last_quality,
    )
    .map_err(ser)
}

pub(crate) fn map_settings_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<UserSettings, StorageError> {
    let rollover_raw = u8::try_from(row.try_get::<i64, _>("rollover_hour").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("invalid rollover_hour".into()))?;
    let rollover_hour = RolloverHour::new(rollover_raw).map_err(ser)?;

    let mode_str: String = row.try_get("preferred_mode").map_err(ser)?;

    Ok(UserSettings::from_persisted(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        i64_to_u32(
            "daily_new_limit",
            row.try_get::<i64, _>("daily_new_limit").map_err(ser)?,
        )?,
        i64_to_u32(
            "daily_review_limit",
            row.try_get::<i64, _>("daily_review_limit").map_err(ser)?,
        )?,
        i64_to_u32(
            "new_completed_today",
            row.try_get::<i64, _>("new_completed_today").map_err(ser)?,
        )?,
        i64_to_u32(
            "reviews_completed_today",
            row.try_get::<i64, _>("reviews_completed_today")
                .map_err(ser)?,
        )?,
        rollover_hour,
        row.try_get("last_reset_date").map_err(ser)?,
        mode_from_str(&mode_str)?,
    ))
}

pub(crate) fn map_review_row(row: &sqlx::sqlite::SqliteRow) -> Result<CardReview, StorageError> {
    Ok(CardReview::new(
        card_id_from_i64(row.try_get::<i64, _>("card_id").map_err(ser)?)?,
        quality_from_i64(row.try_get::<i64, _>("quality").map_err(ser)?)?,
        row.try_get("reviewed_at").map_err(ser)?,
    ))
}
