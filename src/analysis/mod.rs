//! Content analysis for notes
//!
//! Entity extraction, language detection, quality and spam scoring, safety
//! classification, topics and sentiment.

pub mod analyzer;
pub mod language;
pub mod patterns;
pub mod quality;

pub use analyzer::{AnalysisResult, ContentAnalyzer, Sentiment};
pub use language::{FALLBACK_LANGUAGE, detect_language};
pub use quality::{QualityProfile, content_quality};

#[cfg(test)]
mod tests;
