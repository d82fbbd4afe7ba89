//! Shared error types for the services crate.

use thiserror::Error;

use recall_core::model::{ReviewError, SessionStateError, SettingsError};
use storage::repository::StorageError;

/// Errors emitted by `SettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error(transparent)]
    Invalid(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DueCardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectorError {
    #[error("deck not found")]
    DeckNotFound,
    #[error("deck does not belong to the requesting user")]
    Unauthorized,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StudyService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyError {
    #[error("deck not found")]
    DeckNotFound,
    #[error("card not found in this session's deck")]
    CardNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("session does not belong to the requesting user")]
    Unauthorized,
    #[error("session is not active")]
    SessionNotActive,
    #[error("session has already ended")]
    SessionAlreadyEnded,
    #[error(transparent)]
    InvalidQuality(#[from] ReviewError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<SessionStateError> for StudyError {
    fn from(err: SessionStateError) -> Self {
        match err {
            SessionStateError::AlreadyEnded => StudyError::SessionAlreadyEnded,
            SessionStateError::NotActive | SessionStateError::InvalidTimeRange => {
                StudyError::SessionNotActive
            }
            _ => StudyError::SessionNotActive,
        }
    }
}
