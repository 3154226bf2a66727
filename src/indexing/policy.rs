//! Content filtering applied before a note is queued

use ahash::AHashSet;
use thiserror::Error;

use crate::config::IndexerConfig;
use crate::document::{Ineligible, NoteDocument};

/// Why a note was kept out of the index
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("invalid note: {0}")]
    Invalid(#[from] crate::document::ValidationError),

    #[error("not eligible: {0}")]
    Ineligible(#[from] Ineligible),

    #[error("author {0} is blocked")]
    BlockedUser(String),

    #[error("hashtag #{0} is blocked")]
    BlockedHashtag(String),

    #[error("spam score {score:.2} reaches threshold {threshold:.2}")]
    Spam { score: f32, threshold: f32 },

    #[error("NSFW content indexing is disabled")]
    Nsfw,
}

#[derive(Debug, Clone)]
pub struct IndexingPolicy {
    min_quality_score: f32,
    spam_threshold: f32,
    index_spam_content: bool,
    index_nsfw_content: bool,
    blocked_users: AHashSet<String>,
    blocked_hashtags: AHashSet<String>,
}

impl From<&IndexerConfig> for IndexingPolicy {
    fn from(config: &IndexerConfig) -> Self {
        Self {
            min_quality_score: config.min_quality_score(),
            spam_threshold: config.spam_threshold(),
            index_spam_content: config.index_spam_content(),
            index_nsfw_content: config.index_nsfw_content(),
            blocked_users: config.blocked_users().iter().cloned().collect(),
            blocked_hashtags: config
                .blocked_hashtags()
                .iter()
                .map(|tag| tag.trim_start_matches('#').to_lowercase())
                .collect(),
        }
    }
}

impl IndexingPolicy {
    /// Check an enriched note against structure, eligibility and filters
    pub fn evaluate(&self, note: &NoteDocument) -> Result<(), SkipReason> {
        note.validate()?;
        note.check_eligibility(self.min_quality_score)?;

        if self.blocked_users.contains(&note.user_id) {
            return Err(SkipReason::BlockedUser(note.user_id.clone()));
        }
        if let Some(tag) = note
            .hashtags
            .iter()
            .find(|tag| self.blocked_hashtags.contains(tag.as_str()))
        {
            return Err(SkipReason::BlockedHashtag(tag.clone()));
        }
        if !self.index_spam_content && note.spam_score >= self.spam_threshold {
            return Err(SkipReason::Spam {
                score: note.spam_score,
                threshold: self.spam_threshold,
            });
        }
        if !self.index_nsfw_content && note.nsfw {
            return Err(SkipReason::Nsfw);
        }
        Ok(())
    }

    /// `evaluate` as a yes/no answer
    #[must_use]
    pub fn is_indexable(&self, note: &NoteDocument) -> bool {
        self.evaluate(note).is_ok()
    }
}
