use super::*;

fn analyzer() -> ContentAnalyzer {
    ContentAnalyzer::default()
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn pattern_tables_compile() {
    assert!(!patterns::SPAM_PATTERNS.is_empty());
    assert!(!patterns::NSFW_PATTERNS.is_empty());
    assert!(!patterns::SENSITIVE_PATTERNS.is_empty());
    assert!(patterns::HASHTAG.is_match("#ok"));
    assert!(patterns::MEDIA_PLATFORM.is_match("https://youtu.be/abc"));
}

#[test]
fn hashtags_are_lowercased_and_deduplicated() {
    let tags = analyzer().extract_hashtags("#Rust is great #rust #Tokio #café_2");
    assert_eq!(tags, vec!["rust", "tokio", "café_2"]);
}

#[test]
fn hashtag_positions_are_byte_offsets() {
    let tags = analyzer().extract_hashtags_with_positions("hi #One and #two");
    assert_eq!(tags, vec![("one".to_string(), 3), ("two".to_string(), 12)]);
}

#[test]
fn mentions_are_lowercased_and_deduplicated() {
    let mentions = analyzer().extract_mentions("@Alice said hi to @bob and @alice");
    assert_eq!(mentions, vec!["alice", "bob"]);
    let positions = analyzer().extract_mentions_with_positions("cc @Bob");
    assert_eq!(positions, vec![("bob".to_string(), 3)]);
}

#[test]
fn media_urls_keep_order_of_appearance() {
    let text = "clip https://youtu.be/xyz then https://cdn.example.com/a.PNG?size=2 \
                and https://example.com/page and https://cdn.example.com/b.mp4 \
                again https://youtu.be/xyz";
    let media = analyzer().extract_media_urls(text);
    assert_eq!(
        media,
        vec![
            "https://youtu.be/xyz",
            "https://cdn.example.com/a.PNG?size=2",
            "https://cdn.example.com/b.mp4",
        ]
    );
}

#[test]
fn language_by_script() {
    let a = analyzer();
    assert_eq!(a.detect_language("Привет мир"), "ru");
    assert_eq!(a.detect_language("你好世界"), "zh");
    assert_eq!(a.detect_language("مرحبا بالعالم"), "ar");
    assert_eq!(a.detect_language("안녕하세요"), "ko");
    assert_eq!(a.detect_language("こんにちは"), "ja");
}

#[test]
fn language_by_stopword_vote() {
    let a = analyzer();
    assert_eq!(a.detect_language("the cat sat on the mat with a hat"), "en");
    assert_eq!(a.detect_language("el perro y la casa de los niños"), "es");
    assert_eq!(a.detect_language("der Hund und die Katze ist nicht hier"), "de");
    assert_eq!(a.detect_language("le chat et les chiens pour être"), "fr");
    assert_eq!(a.detect_language("xyzzy plugh"), FALLBACK_LANGUAGE);
}

#[test]
fn url_flood_scores_as_spam() {
    let text = "Check this out! http://bit.ly/x http://bit.ly/y http://bit.ly/z http://bit.ly/w";
    let score = analyzer().spam_score(text);
    assert!(score >= 0.4, "score {score}");
}

#[test]
fn spam_signals_accumulate_and_clamp() {
    let a = analyzer();
    assert_eq!(a.spam_score("A calm note about gardening today."), 0.0);
    assert!(approx(a.spam_score("Click here to win the lottery"), 0.6));
    let loud = "CLICK HERE!!!!!! WINNER CASINO $100 per day call 555-123-4567";
    assert_eq!(a.spam_score(loud), 1.0);
}

#[test]
fn nsfw_and_sensitive_flags() {
    let a = analyzer();
    assert!(a.is_nsfw("this post is NSFW"));
    assert!(a.is_nsfw("18+ only"));
    assert!(!a.is_nsfw("a picture of my dog"));
    assert!(a.is_sensitive("TW: talking about depression"));
    assert!(!a.is_sensitive("sunny afternoon walk"));
}

#[test]
fn topics_need_two_keyword_hits() {
    let a = analyzer();
    assert!(a.extract_topics("I love football").is_empty());
    assert_eq!(
        a.extract_topics("football and basketball all weekend"),
        vec!["sports"]
    );
    assert_eq!(
        a.extract_topics("new AI software for machine learning plus a nba and nfl recap"),
        vec!["sports", "technology"]
    );
}

#[test]
fn sentiment_tallies() {
    let a = analyzer();
    assert_eq!(a.analyze_sentiment("what a great and amazing day"), Sentiment::Positive);
    assert_eq!(a.analyze_sentiment("terrible service, worst ever"), Sentiment::Negative);
    assert_eq!(a.analyze_sentiment("good but bad"), Sentiment::Neutral);
    assert_eq!(a.analyze_sentiment(""), Sentiment::Neutral);
}

#[test]
fn quality_rules() {
    let note = QualityProfile::Note;
    // short penalty
    assert!(approx(content_quality("tiny", 0, note), 0.2));
    // plain mid-length text sits at the baseline
    assert!(approx(content_quality("a reasonable sentence here", 0, note), 0.5));
    // rewarded band
    let long = "This is a thoughtful note about the weather and my garden today.";
    assert!(approx(content_quality(long, 0, note), 0.7));
    // the strict profile needs 280+ characters for the bonus
    assert!(approx(content_quality(long, 0, QualityProfile::Strict), 0.5));
    // one link earns a bonus
    assert!(approx(
        content_quality("see https://example.com ok", 0, note),
        0.6
    ));
    // shouting
    assert!(approx(content_quality("THIS IS ALL CAPS YES", 0, note), 0.2));
    // repetition
    assert!(approx(
        content_quality("buy buy buy buy buy buy now", 0, note),
        0.2
    ));
    // hashtag stuffing
    assert!(approx(content_quality("a reasonable sentence here", 6, note), 0.3));
    assert!(approx(content_quality("a reasonable sentence here", 11, note), 0.0));
}

#[test]
fn empty_input_yields_defaults() {
    let result = analyzer().analyze("   ");
    assert!(result.hashtags.is_empty());
    assert!(result.mentions.is_empty());
    assert!(result.media_urls.is_empty());
    assert_eq!(result.language, "en");
    assert_eq!(result.sentiment, Sentiment::Neutral);
    assert_eq!(result.spam_score, 0.0);
    assert!(approx(result.content_quality_score, 0.2));
}

#[test]
fn analyze_combines_everything() {
    let result = analyzer().analyze(
        "Loving the new #Rust release with @ferris, great work! https://example.com/logo.png",
    );
    assert_eq!(result.hashtags, vec!["rust"]);
    assert_eq!(result.mentions, vec!["ferris"]);
    assert_eq!(result.media_urls, vec!["https://example.com/logo.png"]);
    assert_eq!(result.sentiment, Sentiment::Positive);
    assert!(!result.nsfw);
    assert!((0.0..=1.0).contains(&result.content_quality_score));
}

#[test]
fn normalize_collapses_whitespace() {
    assert_eq!(
        analyzer().normalize_content("  hello \n\t  world  "),
        "hello world"
    );
}
