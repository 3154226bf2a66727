//! Heuristic content-quality scoring
//!
//! Scores start at 0.5 and move with length, casing, punctuation, link and
//! hashtag density and word repetition. The result is clamped to [0, 1].

use ahash::AHashMap;

use super::patterns::URL;

/// Which length band earns the length bonus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QualityProfile {
    /// Short-form notes: 50..1000 characters
    #[default]
    Note,
    /// Long-form content: 280..1000 characters
    Strict,
}

impl QualityProfile {
    fn rewarded_band(self) -> (usize, usize) {
        match self {
            QualityProfile::Note => (50, 1000),
            QualityProfile::Strict => (280, 1000),
        }
    }
}

const BASELINE: f32 = 0.5;
const MAX_WORD_REPEATS: usize = 5;

/// Score `text` given the number of hashtags already extracted from it
#[must_use]
pub fn content_quality(text: &str, hashtag_count: usize, profile: QualityProfile) -> f32 {
    let mut score = BASELINE;
    let length = text.chars().count();

    if length < 10 {
        score -= 0.3;
    }
    let (low, high) = profile.rewarded_band();
    if length > low && length < high {
        score += 0.2;
    }
    if length > 2000 {
        score -= 0.1;
    }

    if length > 0 {
        let uppercase = text.chars().filter(|c| c.is_uppercase()).count();
        if uppercase as f32 / length as f32 > 0.5 {
            score -= 0.3;
        }
        let punctuation = text.chars().filter(char::is_ascii_punctuation).count();
        if punctuation as f32 / length as f32 > 0.3 {
            score -= 0.2;
        }
    }

    match URL.find_iter(text).count() {
        1 => score += 0.1,
        n if n > 3 => score -= 0.3,
        _ => {}
    }

    let mut counts: AHashMap<String, usize> = AHashMap::new();
    for word in text.split_whitespace() {
        *counts.entry(word.to_lowercase()).or_default() += 1;
    }
    if counts.values().any(|&n| n > MAX_WORD_REPEATS) {
        score -= 0.3;
    }

    if hashtag_count > 5 {
        score -= 0.2;
    }
    if hashtag_count > 10 {
        score -= 0.3;
    }

    score.clamp(0.0, 1.0)
}
