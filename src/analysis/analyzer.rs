//! The content analyzer
//!
//! `ContentAnalyzer` is a stateless `Copy` value. It derives everything the
//! search document needs from raw note text: entities, language, quality,
//! spam likelihood, safety flags, topics and sentiment.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use super::language::{FALLBACK_LANGUAGE, detect_language};
use super::patterns::{
    HASHTAG, MEDIA_EXTENSION, MEDIA_PLATFORM, MENTION, NEGATIVE_WORDS, NSFW_PATTERNS,
    POSITIVE_WORDS, SENSITIVE_PATTERNS, SPAM_PATTERN_WEIGHT, SPAM_PATTERNS, TOPIC_KEYWORDS,
    TOPIC_MIN_HITS, URL,
};
use super::quality::{QualityProfile, content_quality};

const URL_FLOOD_LIMIT: usize = 3;
const URL_FLOOD_WEIGHT: f32 = 0.4;
const CAPS_FLOOD_RATIO: f32 = 0.7;
const CAPS_FLOOD_WEIGHT: f32 = 0.2;
const EXCLAMATION_LIMIT: usize = 5;
const EXCLAMATION_WEIGHT: f32 = 0.1;

/// Overall tone of a note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

/// Everything the analyzer derives from one piece of text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub urls: Vec<String>,
    pub media_urls: Vec<String>,
    pub language: String,
    pub content_quality_score: f32,
    pub spam_score: f32,
    pub nsfw: bool,
    pub sensitive: bool,
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            hashtags: Vec::new(),
            mentions: Vec::new(),
            urls: Vec::new(),
            media_urls: Vec::new(),
            language: FALLBACK_LANGUAGE.to_string(),
            content_quality_score: content_quality("", 0, QualityProfile::Note),
            spam_score: 0.0,
            nsfw: false,
            sensitive: false,
            topics: Vec::new(),
            sentiment: Sentiment::Neutral,
        }
    }
}

/// Stateless note text analyzer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentAnalyzer {
    profile: QualityProfile,
}

fn dedupe_lowercase<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = AHashSet::new();
    items
        .map(str::to_lowercase)
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn lowercase_words(text: &str) -> AHashSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl ContentAnalyzer {
    #[must_use]
    pub fn new(profile: QualityProfile) -> Self {
        Self { profile }
    }

    #[must_use]
    pub fn profile(&self) -> QualityProfile {
        self.profile
    }

    /// Run every analysis over `text`
    #[must_use]
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        if text.trim().is_empty() {
            return AnalysisResult::default();
        }
        let hashtags = self.extract_hashtags(text);
        AnalysisResult {
            mentions: self.extract_mentions(text),
            urls: self.extract_urls(text),
            media_urls: self.extract_media_urls(text),
            language: self.detect_language(text).to_string(),
            content_quality_score: content_quality(text, hashtags.len(), self.profile),
            spam_score: self.spam_score(text),
            nsfw: self.is_nsfw(text),
            sensitive: self.is_sensitive(text),
            topics: self.extract_topics(text),
            sentiment: self.analyze_sentiment(text),
            hashtags,
        }
    }

    /// Lowercase hashtags without `#`, first-seen order, no duplicates
    #[must_use]
    pub fn extract_hashtags(&self, text: &str) -> Vec<String> {
        dedupe_lowercase(
            HASHTAG
                .captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| m.as_str())),
        )
    }

    /// Hashtags with the byte offset of their `#`
    #[must_use]
    pub fn extract_hashtags_with_positions(&self, text: &str) -> Vec<(String, usize)> {
        HASHTAG
            .captures_iter(text)
            .filter_map(|c| {
                let whole = c.get(0)?;
                let tag = c.get(1)?;
                Some((tag.as_str().to_lowercase(), whole.start()))
            })
            .collect()
    }

    /// Lowercase mentions without `@`, first-seen order, no duplicates
    #[must_use]
    pub fn extract_mentions(&self, text: &str) -> Vec<String> {
        dedupe_lowercase(
            MENTION
                .captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| m.as_str())),
        )
    }

    /// Mentions with the byte offset of their `@`
    #[must_use]
    pub fn extract_mentions_with_positions(&self, text: &str) -> Vec<(String, usize)> {
        MENTION
            .captures_iter(text)
            .filter_map(|c| {
                let whole = c.get(0)?;
                let name = c.get(1)?;
                Some((name.as_str().to_lowercase(), whole.start()))
            })
            .collect()
    }

    #[must_use]
    pub fn extract_urls(&self, text: &str) -> Vec<String> {
        URL.find_iter(text).map(|m| m.as_str().to_string()).collect()
    }

    /// Image, video and known-platform links in order of appearance
    #[must_use]
    pub fn extract_media_urls(&self, text: &str) -> Vec<String> {
        let mut seen = AHashSet::new();
        URL.find_iter(text)
            .map(|m| m.as_str())
            .filter(|url| MEDIA_EXTENSION.is_match(url) || MEDIA_PLATFORM.is_match(url))
            .filter(|url| seen.insert(*url))
            .map(str::to_string)
            .collect()
    }

    #[must_use]
    pub fn detect_language(&self, text: &str) -> &'static str {
        detect_language(text)
    }

    /// Quality score with hashtags counted from `text` itself
    #[must_use]
    pub fn content_quality(&self, text: &str) -> f32 {
        content_quality(text, self.extract_hashtags(text).len(), self.profile)
    }

    /// Weighted sum of spam signals, clamped to [0, 1]
    #[must_use]
    pub fn spam_score(&self, text: &str) -> f32 {
        let mut score = SPAM_PATTERNS
            .iter()
            .filter(|p| p.is_match(text))
            .count() as f32
            * SPAM_PATTERN_WEIGHT;

        if URL.find_iter(text).count() > URL_FLOOD_LIMIT {
            score += URL_FLOOD_WEIGHT;
        }

        let (letters, upper) = text
            .chars()
            .filter(|c| c.is_alphabetic())
            .fold((0usize, 0usize), |(l, u), c| (l + 1, u + usize::from(c.is_uppercase())));
        if letters > 0 && upper as f32 / letters as f32 > CAPS_FLOOD_RATIO {
            score += CAPS_FLOOD_WEIGHT;
        }

        if text.matches('!').count() > EXCLAMATION_LIMIT {
            score += EXCLAMATION_WEIGHT;
        }

        score.clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn is_nsfw(&self, text: &str) -> bool {
        NSFW_PATTERNS.iter().any(|p| p.is_match(text))
    }

    #[must_use]
    pub fn is_sensitive(&self, text: &str) -> bool {
        SENSITIVE_PATTERNS.iter().any(|p| p.is_match(text))
    }

    /// Topics with at least two distinct keyword hits, sorted by name
    #[must_use]
    pub fn extract_topics(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let words = lowercase_words(text);
        TOPIC_KEYWORDS
            .iter()
            .filter(|(_, keywords)| {
                let hits = keywords
                    .iter()
                    .filter(|kw| {
                        if kw.contains(' ') {
                            lowered.contains(**kw)
                        } else {
                            words.contains(**kw)
                        }
                    })
                    .count();
                hits >= TOPIC_MIN_HITS
            })
            .map(|(topic, _)| (*topic).to_string())
            .collect()
    }

    #[must_use]
    pub fn analyze_sentiment(&self, text: &str) -> Sentiment {
        let words = lowercase_words(text);
        let positive = POSITIVE_WORDS.iter().filter(|w| words.contains(**w)).count();
        let negative = NEGATIVE_WORDS.iter().filter(|w| words.contains(**w)).count();
        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }

    /// Collapse whitespace runs into single spaces and trim
    #[must_use]
    pub fn normalize_content(&self, text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
