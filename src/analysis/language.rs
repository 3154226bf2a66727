//! Lightweight language detection
//!
//! Non-Latin scripts are recognised by code point ranges. Latin text is voted
//! on with small stop-word lists; English wins ties.

use ahash::AHashSet;

use super::patterns::{STOPWORDS_DE, STOPWORDS_EN, STOPWORDS_ES, STOPWORDS_FR};

pub const FALLBACK_LANGUAGE: &str = "en";

fn script_language(c: char) -> Option<&'static str> {
    match c as u32 {
        0x0400..=0x04FF => Some("ru"),
        0x4E00..=0x9FFF => Some("zh"),
        0x0600..=0x06FF => Some("ar"),
        0xAC00..=0xD7AF | 0x1100..=0x11FF => Some("ko"),
        0x3040..=0x309F | 0x30A0..=0x30FF => Some("ja"),
        _ => None,
    }
}

/// Detect the language of `text` as an ISO 639-1 code
#[must_use]
pub fn detect_language(text: &str) -> &'static str {
    if let Some(lang) = text.chars().find_map(script_language) {
        return lang;
    }

    let words: AHashSet<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return FALLBACK_LANGUAGE;
    }

    let hits = |list: &[&str]| list.iter().filter(|w| words.contains(**w)).count();
    let english = hits(STOPWORDS_EN);
    let candidates = [
        ("es", hits(STOPWORDS_ES)),
        ("fr", hits(STOPWORDS_FR)),
        ("de", hits(STOPWORDS_DE)),
    ];

    for (i, &(lang, count)) in candidates.iter().enumerate() {
        let beats_others = candidates
            .iter()
            .enumerate()
            .all(|(j, &(_, other))| i == j || count > other);
        if count > english && beats_others {
            return lang;
        }
    }
    FALLBACK_LANGUAGE
}
