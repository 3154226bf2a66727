//! Note documents and their relevance scores

pub mod note;
pub mod scoring;

pub use note::{
    AuthorMetrics, EngagementMetrics, GeoPoint, IndexSource, IndexingMetadata, Ineligible,
    MAX_CONTENT_LENGTH, MIN_CONTENT_LENGTH, MIN_QUALITY_SCORE, NoteDocument, ValidationError,
    VerificationLevel, Visibility,
};
pub use scoring::{BoostFactors, ScoreSet, score_note};
