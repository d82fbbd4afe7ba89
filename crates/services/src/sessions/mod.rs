mod service;
mod view;

pub use service::StudyService;
pub use view::{
    CardView, ReviewFeedback, ReviewSubmissionResult, ReviewedCardView, SessionSummaryView,
    SessionView,
};
