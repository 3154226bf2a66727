//! Engagement, virality and trending scores
//!
//! Pure functions over engagement counters, author metrics and content age.
//! `now` is always injected so results are reproducible. Every score is
//! clamped to [0, 1].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::note::{AuthorMetrics, EngagementMetrics};

/// Whole hours between `created_at` and `now`; clock skew counts as zero
#[must_use]
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = now.signed_duration_since(created_at).num_hours();
    hours.max(0) as f64
}

#[inline]
fn log_ratio(value: f64, ceiling: f64) -> f64 {
    (1.0 + value).ln() / (1.0 + ceiling).ln()
}

#[inline]
fn clamp_unit(value: f64) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0) as f32
}

/// Engagement relative to reach, plus absolute volume and author reputation
#[must_use]
pub fn engagement_score(metrics: &EngagementMetrics, author: &AuthorMetrics) -> f32 {
    if metrics.views_count == 0 {
        return 0.0;
    }
    let total = metrics.total_engagement() as f64;
    let rate = total / metrics.views_count as f64;
    let reputation = (f64::from(author.reputation_score) / 100.0).clamp(0.0, 1.0);

    let score = 0.6 * log_ratio(1000.0 * rate, 1000.0)
        + 0.3 * log_ratio(total, 10_000.0)
        + 0.1 * reputation;
    clamp_unit(score.min(1.0))
}

/// Engagement velocity, share ratio and author reach
#[must_use]
pub fn virality_score(metrics: &EngagementMetrics, author: &AuthorMetrics, age_hours: f64) -> f32 {
    let total = metrics.total_engagement() as f64;
    let velocity = total / age_hours.max(1.0);
    let renote_ratio = if total > 0.0 {
        metrics.renotes_count as f64 / total
    } else {
        0.0
    };

    let score = 0.5 * log_ratio(velocity, 1000.0)
        + 0.3 * renote_ratio
        + 0.2 * log_ratio(author.followers_count as f64, 1_000_000.0);
    clamp_unit(score)
}

/// Recency-weighted blend of engagement and virality
#[must_use]
pub fn trending_score(age_hours: f64, engagement: f32, virality: f32, has_hashtags: bool) -> f32 {
    let recency = (-age_hours.max(0.0) / 24.0).exp();
    let hashtag_factor = if has_hashtags { 0.8 } else { 0.5 };

    let score = 0.4 * recency
        + 0.3 * f64::from(engagement)
        + 0.2 * f64::from(virality)
        + 0.1 * hashtag_factor;
    clamp_unit(score)
}

/// Multipliers the search backend can apply at query time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostFactors {
    pub recency_boost: f32,
    pub engagement_boost: f32,
    pub author_boost: f32,
    pub content_quality_boost: f32,
}

impl Default for BoostFactors {
    fn default() -> Self {
        Self {
            recency_boost: 1.0,
            engagement_boost: 1.0,
            author_boost: 1.0,
            content_quality_boost: 1.0,
        }
    }
}

impl BoostFactors {
    /// Recency, engagement and author boosts lie in [1, 2]; content quality in [0.5, 1.5]
    #[must_use]
    pub fn derive(
        age_hours: f64,
        engagement: f32,
        author: &AuthorMetrics,
        content_quality: f32,
    ) -> Self {
        let recency = (-age_hours.max(0.0) / 24.0).exp() as f32;
        let verified = if author.is_verified() { 0.5 } else { 0.0 };
        let reputation = (author.reputation_score / 100.0).clamp(0.0, 1.0) * 0.5;
        Self {
            recency_boost: 1.0 + recency,
            engagement_boost: 1.0 + engagement.clamp(0.0, 1.0),
            author_boost: 1.0 + verified + reputation,
            content_quality_boost: 0.5 + content_quality.clamp(0.0, 1.0),
        }
    }
}

/// All derived scores for one note at `now`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSet {
    pub engagement: f32,
    pub virality: f32,
    pub trending: f32,
    pub boosts: BoostFactors,
}

#[must_use]
pub fn score_note(
    metrics: &EngagementMetrics,
    author: &AuthorMetrics,
    created_at: DateTime<Utc>,
    has_hashtags: bool,
    content_quality: f32,
    now: DateTime<Utc>,
) -> ScoreSet {
    let age = age_hours(created_at, now);
    let engagement = engagement_score(metrics, author);
    let virality = virality_score(metrics, author, age);
    ScoreSet {
        engagement,
        virality,
        trending: trending_score(age, engagement, virality, has_hashtags),
        boosts: BoostFactors::derive(age, engagement, author, content_quality),
    }
}
