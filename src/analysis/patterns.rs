//! Compiled pattern tables used by the content analyzer
//!
//! Every regex is compiled once on first use. All tables are hardcoded, so a
//! compile failure is a programming error caught by the unit tests.

use std::sync::LazyLock;

use regex::Regex;

pub static HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#([\p{L}\p{N}_]+)").expect("HASHTAG: hardcoded regex is valid")
});

pub static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("MENTION: hardcoded regex is valid"));

pub static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL: hardcoded regex is valid"));

pub static MEDIA_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:jpg|jpeg|png|gif|webp|svg|mp4|webm|mov|avi|mkv)(?:\?\S*)?$")
        .expect("MEDIA_EXTENSION: hardcoded regex is valid")
});

pub static MEDIA_PLATFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:www\.)?(?:youtube\.com/watch|youtu\.be/|twitter\.com/[^/\s]+/status|instagram\.com/p/|tiktok\.com/@[^/\s]+/video)",
    )
    .expect("MEDIA_PLATFORM: hardcoded regex is valid")
});

/// Weight added to the spam score by each matching pattern
pub const SPAM_PATTERN_WEIGHT: f32 = 0.3;

pub static SPAM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // promotional phrases
        r"(?i)\b(?:click here|buy now|limited time|act fast|guaranteed|free money|earn \$\d+)",
        // spam vocabulary
        r"(?i)\b(?:viagra|cialis|casino|lottery|winner|congratulations)\b",
        // shortener with a real slug
        r"(?i)(?:https?://)?(?:bit\.ly|tinyurl\.com|t\.co)/[a-zA-Z0-9]{6,}",
        // phone number
        r"\b\d{3}-\d{3}-\d{4}\b",
        // money amounts, optionally per period
        r"(?i)\$\d+(?:\.\d{2})?(?:\s*(?:per|/)\s*(?:hour|day|week|month))?",
        // explicit profanity
        r"(?i)\b(?:fuck\w*|shit\w*|bitch\w*|asshole\w*|cunt\w*)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("SPAM_PATTERNS: hardcoded regex is valid"))
    .collect()
});

pub static NSFW_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:porn\w*|xxx|nude|nudes|naked|sex|adult only|onlyfans)\b",
        r"(?i)\b18\+",
        r"(?i)\bnsfw\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("NSFW_PATTERNS: hardcoded regex is valid"))
    .collect()
});

pub static SENSITIVE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:suicide|self[- ]harm|depression|anxiety|trauma|abuse)\b",
        r"(?i)\b(?:violence|death|murder|killing|war|terrorism)\b",
        r"(?i)\b(?:tw|cw|trigger warning|content warning)\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("SENSITIVE_PATTERNS: hardcoded regex is valid"))
    .collect()
});

/// Topic name paired with its lowercase keywords; sorted by topic name
pub const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "business",
        &["business", "startup", "company", "market", "economy", "finance", "investment", "stock"],
    ),
    (
        "education",
        &["education", "school", "university", "student", "teacher", "learning", "course", "study"],
    ),
    (
        "entertainment",
        &["movie", "music", "celebrity", "tv", "show", "concert", "film", "album"],
    ),
    (
        "food",
        &["food", "recipe", "cooking", "restaurant", "meal", "dinner", "lunch", "breakfast"],
    ),
    (
        "health",
        &["health", "medical", "doctor", "hospital", "fitness", "wellness", "nutrition", "exercise"],
    ),
    (
        "politics",
        &["election", "vote", "government", "president", "congress", "policy", "politics", "democracy"],
    ),
    (
        "science",
        &["research", "study", "science", "discovery", "experiment", "climate", "space", "physics"],
    ),
    (
        "sports",
        &["football", "basketball", "soccer", "baseball", "tennis", "olympics", "nfl", "nba"],
    ),
    (
        "technology",
        &["ai", "machine learning", "blockchain", "crypto", "tech", "programming", "software", "computer"],
    ),
    (
        "travel",
        &["travel", "vacation", "trip", "hotel", "flight", "tourism", "adventure", "explore"],
    ),
];

/// Minimum distinct keyword hits before a topic is assigned
pub const TOPIC_MIN_HITS: usize = 2;

pub const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "awesome", "amazing", "excellent", "fantastic", "love", "like", "happy",
    "wonderful", "best", "perfect", "beautiful", "brilliant",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "horrible", "worst", "sad", "angry", "disappointed",
    "annoying", "stupid", "boring", "broken", "ugly",
];

pub const STOPWORDS_EN: &[&str] = &[
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is", "are",
];
pub const STOPWORDS_ES: &[&str] = &[
    "el", "la", "de", "que", "y", "en", "un", "es", "se", "no", "te", "lo", "los", "las",
];
pub const STOPWORDS_FR: &[&str] = &[
    "le", "de", "et", "à", "un", "il", "être", "en", "avoir", "que", "pour", "les", "des", "est",
];
pub const STOPWORDS_DE: &[&str] = &[
    "der", "die", "und", "ist", "nicht", "das", "ein", "mit", "zu", "den", "von", "sie",
];
