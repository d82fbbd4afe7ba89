#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod selector;
pub mod sessions;
pub mod settings_service;

pub use recall_core::Clock;

pub use engine::{EngineError, StudyEngine};
pub use error::{SelectorError, SettingsServiceError, StudyError};
pub use selector::DueCardService;
pub use sessions::{
    CardView, ReviewFeedback, ReviewSubmissionResult, SessionSummaryView, SessionView,
    StudyService,
};
pub use settings_service::{SettingsService, SettingsUpdate, SettingsView};
