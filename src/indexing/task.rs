//! Indexing tasks and their priority
//!
//! A task wraps one note snapshot and the operation to perform on it. Priority
//! is derived from author verification, engagement, virality, freshness and
//! hashtags when the caller does not supply one. Failed tasks are rescheduled
//! with exponential backoff and jitter.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::document::NoteDocument;

/// Lower and upper bound of the multiplicative retry jitter
pub const JITTER_MIN: f64 = 0.75;
pub const JITTER_MAX: f64 = 1.25;

/// Priority given to deletes so removals overtake pending writes
pub const DELETE_PRIORITY: i32 = 30;

const MAX_BACKOFF_EXPONENT: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexingOperation {
    Create,
    Update,
    Delete,
    UpdateMetrics,
}

impl IndexingOperation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IndexingOperation::Create => "CREATE",
            IndexingOperation::Update => "UPDATE",
            IndexingOperation::Delete => "DELETE",
            IndexingOperation::UpdateMetrics => "UPDATE_METRICS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexingTask {
    pub operation: IndexingOperation,
    pub note: NoteDocument,
    pub correlation_id: String,
    pub priority: i32,
    pub retry_count: u32,
    pub queued_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    /// Assigned by the scheduler on every insertion
    pub(crate) sequence: u64,
}

impl IndexingTask {
    /// A task ready to run at `now`; a missing or non-positive priority is computed
    #[must_use]
    pub fn new(
        operation: IndexingOperation,
        note: NoteDocument,
        priority: Option<i32>,
        now: DateTime<Utc>,
    ) -> Self {
        let priority = match priority {
            Some(p) if p > 0 => p,
            _ => Self::calculate_priority(&note, now),
        };
        Self {
            correlation_id: format!("note_{}_{}", note.id, Uuid::new_v4()),
            operation,
            note,
            priority,
            retry_count: 0,
            queued_at: now,
            scheduled_at: now,
            sequence: 0,
        }
    }

    /// Verified +10, engagement > 0.7 +5, virality > 0.8 +8, under ten minutes old +3, hashtags +2
    #[must_use]
    pub fn calculate_priority(note: &NoteDocument, now: DateTime<Utc>) -> i32 {
        let mut priority = 0;
        if note.user_metrics.is_verified() {
            priority += 10;
        }
        if note.metrics.engagement_score > 0.7 {
            priority += 5;
        }
        if note.metrics.virality_score > 0.8 {
            priority += 8;
        }
        let age = now.signed_duration_since(note.created_at);
        if age < TimeDelta::minutes(10) {
            priority += 3;
        }
        if !note.hashtags.is_empty() {
            priority += 2;
        }
        priority
    }

    #[must_use]
    pub fn should_retry(&self, max_retry_attempts: u32) -> bool {
        self.retry_count < max_retry_attempts
    }

    /// `base * 2^retry_count * jitter` for a given jitter factor
    #[must_use]
    pub fn retry_delay_with_jitter(&self, base: Duration, jitter: f64) -> Duration {
        let exponent = self.retry_count.min(MAX_BACKOFF_EXPONENT);
        let factor = 2f64.powi(exponent as i32) * jitter.clamp(JITTER_MIN, JITTER_MAX);
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    /// Backoff for the next attempt with uniform jitter in [0.75, 1.25]
    #[must_use]
    pub fn retry_delay(&self, base: Duration) -> Duration {
        let jitter = rand::rng().random_range(JITTER_MIN..=JITTER_MAX);
        self.retry_delay_with_jitter(base, jitter)
    }

    /// Push `scheduled_at` out by the backoff and count the attempt
    pub fn reschedule(&mut self, base: Duration, now: DateTime<Utc>) -> Duration {
        let delay = self.retry_delay(base);
        let delta = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
        self.scheduled_at = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.retry_count += 1;
        delay
    }

    #[inline]
    #[must_use]
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    #[must_use]
    pub fn estimated_size_bytes(&self) -> u64 {
        self.note.estimated_size_bytes() + self.correlation_id.len() as u64
    }
}
