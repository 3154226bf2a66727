//! The note document indexed into the search backend

use ahash::AHashSet;
use chrono::serde::{ts_milliseconds, ts_milliseconds_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::analysis::{AnalysisResult, ContentAnalyzer, Sentiment};

use super::scoring::{BoostFactors, score_note};

/// Notes shorter than this (in characters) are never indexed
pub const MIN_CONTENT_LENGTH: usize = 3;
/// Default admission threshold for `content_quality_score`
pub const MIN_QUALITY_SCORE: f32 = 0.2;
/// Upper bound on content length accepted by `validate`
pub const MAX_CONTENT_LENGTH: usize = 10_000;

const SIZE_OVERHEAD_BYTES: u64 = 500;

/// Audience of a note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Followers,
    Private,
    Deleted,
}

impl Visibility {
    /// Private and deleted notes never reach the index
    #[must_use]
    pub fn is_indexable(self) -> bool {
        !matches!(self, Visibility::Private | Visibility::Deleted)
    }
}

/// How strongly an author's identity has been verified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    #[default]
    None,
    Email,
    Phone,
    Identity,
    Organization,
}

/// Path through which a note reached the indexer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    #[default]
    Realtime,
    Bulk,
    Migration,
    Api,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Interaction counters and the scores derived from them
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementMetrics {
    pub likes_count: u64,
    pub renotes_count: u64,
    pub replies_count: u64,
    pub views_count: u64,
    pub engagement_score: f32,
    pub virality_score: f32,
    pub trending_score: f32,
}

impl EngagementMetrics {
    #[must_use]
    pub fn total_engagement(&self) -> u64 {
        self.likes_count
            .saturating_add(self.renotes_count)
            .saturating_add(self.replies_count)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorMetrics {
    pub followers_count: u64,
    pub following_count: u64,
    /// 0 to 100
    pub reputation_score: f32,
    pub verification_level: VerificationLevel,
}

impl AuthorMetrics {
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verification_level != VerificationLevel::None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingMetadata {
    #[serde(with = "ts_milliseconds_option")]
    pub indexed_at: Option<DateTime<Utc>>,
    pub version: u32,
    pub source: IndexSource,
}

/// Structural problems that make a note unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Note is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Note content is {length} characters, limit is {max}")]
    ContentTooLong { length: usize, max: usize },
}

/// Why a structurally valid note is kept out of the index
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Ineligible {
    #[error("visibility is {0:?}")]
    Hidden(Visibility),

    #[error("content is {0} characters, minimum is {min}", min = MIN_CONTENT_LENGTH)]
    TooShort(usize),

    #[error("content quality {score:.2} is below {threshold:.2}")]
    LowQuality { score: f32, threshold: f32 },
}

/// A short user post together with everything derived from it
///
/// Serializes to the document stored in the search backend. Deserialization
/// is lenient about missing fields; timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteDocument {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub content: String,

    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub media_urls: Vec<String>,
    pub language: String,
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    pub spam_score: f32,

    pub visibility: Visibility,
    pub nsfw: bool,
    pub sensitive: bool,

    pub is_reply: bool,
    pub reply_to_id: Option<String>,
    pub is_renote: bool,
    pub renote_of_id: Option<String>,
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "is_blank")]
    pub place_name: Option<String>,

    pub metrics: EngagementMetrics,
    pub user_metrics: AuthorMetrics,
    pub content_quality_score: f32,
    pub boost_factors: BoostFactors,

    #[serde(with = "ts_milliseconds", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "ts_milliseconds", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    pub indexing_metadata: IndexingMetadata,
}

fn merge_unique(existing: &mut Vec<String>, extracted: Vec<String>, lowercase: bool) {
    let mut seen = AHashSet::new();
    let merged = existing
        .drain(..)
        .map(|item| if lowercase { item.to_lowercase() } else { item })
        .chain(extracted)
        .filter(|item| seen.insert(item.clone()))
        .collect();
    *existing = merged;
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

impl NoteDocument {
    /// A bare note with timestamps set to `now`; language is detected on `enrich`
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    /// Run the analyzer and recompute every score
    pub fn enrich(&mut self, analyzer: &ContentAnalyzer, now: DateTime<Utc>) {
        let analysis = analyzer.analyze(&self.content);
        self.apply_analysis(analysis);
        self.recompute_scores(now);
    }

    /// Merge analyzer output into the note, keeping caller-provided entities
    pub fn apply_analysis(&mut self, analysis: AnalysisResult) {
        merge_unique(&mut self.hashtags, analysis.hashtags, true);
        merge_unique(&mut self.mentions, analysis.mentions, true);
        merge_unique(&mut self.media_urls, analysis.media_urls, false);
        if self.language.is_empty() || self.language == "unknown" {
            self.language = analysis.language;
        }
        self.topics = analysis.topics;
        self.sentiment = analysis.sentiment;
        self.spam_score = analysis.spam_score;
        self.content_quality_score = analysis.content_quality_score;
        self.nsfw |= analysis.nsfw;
        self.sensitive |= analysis.sensitive;
    }

    /// Refresh engagement, virality, trending and boost factors
    pub fn recompute_scores(&mut self, now: DateTime<Utc>) {
        let scores = score_note(
            &self.metrics,
            &self.user_metrics,
            self.created_at,
            !self.hashtags.is_empty(),
            self.content_quality_score,
            now,
        );
        self.metrics.engagement_score = scores.engagement;
        self.metrics.virality_score = scores.virality;
        self.metrics.trending_score = scores.trending;
        self.boost_factors = scores.boosts;
    }

    /// Eligibility against the default quality threshold
    #[must_use]
    pub fn should_be_indexed(&self) -> bool {
        self.check_eligibility(MIN_QUALITY_SCORE).is_ok()
    }

    pub fn check_eligibility(&self, min_quality: f32) -> Result<(), Ineligible> {
        if !self.visibility.is_indexable() {
            return Err(Ineligible::Hidden(self.visibility));
        }
        let length = self.content.chars().count();
        if length < MIN_CONTENT_LENGTH {
            return Err(Ineligible::TooShort(length));
        }
        if self.content_quality_score < min_quality {
            return Err(Ineligible::LowQuality {
                score: self.content_quality_score,
                threshold: min_quality,
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user_id"));
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::MissingField("content"));
        }
        let length = self.content.chars().count();
        if length > MAX_CONTENT_LENGTH {
            return Err(ValidationError::ContentTooLong {
                length,
                max: MAX_CONTENT_LENGTH,
            });
        }
        Ok(())
    }

    /// Shard routing key; co-locates an author's notes
    #[must_use]
    pub fn routing_key(&self) -> &str {
        &self.user_id
    }

    /// Rough in-memory footprint used for admission control
    #[must_use]
    pub fn estimated_size_bytes(&self) -> u64 {
        let strings = [
            &self.id,
            &self.user_id,
            &self.username,
            &self.display_name,
            &self.content,
            &self.language,
        ]
        .iter()
        .map(|s| s.len())
        .sum::<usize>();
        let lists = [&self.hashtags, &self.mentions, &self.media_urls, &self.topics]
            .iter()
            .flat_map(|list| list.iter())
            .map(String::len)
            .sum::<usize>();
        let optional = [
            &self.reply_to_id,
            &self.renote_of_id,
            &self.thread_id,
            &self.place_name,
        ]
        .iter()
        .filter_map(|s| s.as_ref())
        .map(String::len)
        .sum::<usize>();
        (strings + lists + optional) as u64 + SIZE_OVERHEAD_BYTES
    }

    /// xxh3 of the content as 16 hex digits
    #[must_use]
    pub fn content_hash(&self) -> String {
        format!("{:016x}", xxh3_64(self.content.as_bytes()))
    }

    /// Deterministic id for a note that arrives without one
    #[must_use]
    pub fn generated_id(user_id: &str, content_hash: &str) -> String {
        let key = format!("{user_id}:{content_hash}");
        format!("{:016x}", xxh3_64(key.as_bytes()))
    }

    /// The JSON body written to the search backend
    pub fn to_search_document(&self) -> serde_json::Result<Value> {
        let mut doc = serde_json::to_value(self)?;
        if let Some(author) = doc.get_mut("user_metrics").and_then(Value::as_object_mut) {
            author.insert("is_verified".into(), Value::Bool(self.user_metrics.is_verified()));
        }
        Ok(doc)
    }

    /// Partial document for a metrics-only update
    pub fn metrics_document(&self) -> serde_json::Result<Value> {
        Ok(json!({
            "metrics": serde_json::to_value(self.metrics)?,
            "boost_factors": serde_json::to_value(self.boost_factors)?,
            "updated_at": self.updated_at.timestamp_millis(),
        }))
    }

    /// Parse one JSON note and enrich it with the default analyzer at the
    /// current time
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let note: Self = serde_json::from_str(text)?;
        Ok(note.completed(&ContentAnalyzer::default(), Utc::now()))
    }

    /// Decode `value`, then run analysis and scoring at `now`
    ///
    /// Out-of-range scores are clamped and a note without an id gets one
    /// derived from its author and content.
    pub fn from_json_with(
        value: Value,
        analyzer: &ContentAnalyzer,
        now: DateTime<Utc>,
    ) -> serde_json::Result<Self> {
        let note: Self = serde_json::from_value(value)?;
        Ok(note.completed(analyzer, now))
    }

    fn completed(mut self, analyzer: &ContentAnalyzer, now: DateTime<Utc>) -> Self {
        self.user_metrics.reputation_score = self.user_metrics.reputation_score.clamp(0.0, 100.0);
        if self.id.is_empty() && !self.user_id.is_empty() {
            self.id = Self::generated_id(&self.user_id, &self.content_hash());
        }
        self.enrich(analyzer, now);
        self.indexing_metadata.source = IndexSource::Api;
        self
    }
}
