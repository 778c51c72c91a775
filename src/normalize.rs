//! Conversion of upstream articles into post drafts.
//!
//! Everything derived here is heuristic: tags are substring hits against a
//! fixed technology vocabulary and keywords are plain word frequencies.

use crate::models::{NewsArticle, PostDraft};
use crate::scrapers::extractor::{ContentExtractor, NO_CONTENT, is_placeholder};
use crate::utils::{read_time, slugify};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};
use uuid::Uuid;

pub const MAX_TAGS: usize = 5;
pub const MAX_KEYWORDS: usize = 10;

/// Words this short or shorter never become keywords.
const MIN_KEYWORD_CHARS: usize = 4;

/// Vocabulary tags are drawn from, in match-priority order.
pub const TAG_VOCABULARY: &[&str] = &[
    "AI",
    "artificial intelligence",
    "machine learning",
    "blockchain",
    "cryptocurrency",
    "startup",
    "innovation",
    "technology",
    "software",
    "hardware",
    "mobile",
    "web development",
    "programming",
    "coding",
    "data science",
    "cloud computing",
    "cybersecurity",
    "fintech",
    "edtech",
    "healthtech",
    "biotech",
    "robotics",
    "automation",
    "IoT",
    "internet of things",
    "5G",
    "quantum computing",
    "virtual reality",
    "VR",
    "augmented reality",
    "AR",
    "metaverse",
];

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "this", "that", "with", "from", "they", "have", "been", "were", "said", "each", "which",
        "their", "time", "will", "about", "there", "could", "other", "after", "first", "well",
        "also", "where", "much", "some", "very", "when", "come", "here", "just", "into", "over",
        "think", "back", "then", "them", "these", "she", "work", "may", "say", "use", "her",
        "many", "way", "would", "like", "make", "him", "has", "two", "more", "go", "no", "my",
        "than", "water", "call", "who", "its", "now", "find", "long", "down", "day", "did", "get",
        "made", "part",
    ]
    .into_iter()
    .collect()
});

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Tags found in `content`: vocabulary terms that occur as case-insensitive
/// substrings, in vocabulary order, capped at [`MAX_TAGS`].
pub fn extract_tags(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let lowered = content.to_lowercase();
    TAG_VOCABULARY
        .iter()
        .filter(|term| lowered.contains(&term.to_lowercase()))
        .take(MAX_TAGS)
        .map(|term| term.to_string())
        .collect()
}

/// The most frequent non-trivial words in `content`.
///
/// Punctuation is stripped, words of four characters or fewer and stoplist
/// words are dropped, and ties keep first-occurrence order.
pub fn extract_keywords(content: &str) -> Vec<String> {
    let lowered = content.to_lowercase();
    let cleaned = PUNCTUATION.replace_all(&lowered, "");
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_KEYWORD_CHARS)
        .filter(|w| !STOPWORDS.contains(w))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for w in &words {
        *counts.entry(*w).or_default() += 1;
    }

    words
        .iter()
        .unique()
        .sorted_by(|a, b| counts[*b].cmp(&counts[*a]))
        .take(MAX_KEYWORDS)
        .map(|w| w.to_string())
        .collect()
}

/// Parse the API's `publishedAt`, falling back to now.
fn parse_published_at(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn non_blank(s: Option<&String>) -> Option<&str> {
    s.map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
}

/// Convert an upstream article into a publishable [`PostDraft`].
///
/// Content preference: the API's inline content, then (when
/// `fetch_full_content` is set) the extractor's result, then the
/// description, then a fixed placeholder. A failed extraction keeps the
/// extractor's placeholder so the backfill job can find the post later.
#[instrument(level = "info", skip_all, fields(title = %article.title))]
pub async fn to_post(
    article: &NewsArticle,
    category_id: Option<Uuid>,
    author_id: Uuid,
    fetch_full_content: bool,
    extractor: &ContentExtractor,
) -> PostDraft {
    let description = non_blank(article.description.as_ref());

    let content = match non_blank(article.content.as_ref()) {
        Some(inline) => inline.to_string(),
        None if fetch_full_content && !article.url.trim().is_empty() => {
            debug!(url = %article.url, "No inline content; fetching article page");
            extractor.fetch_full_content(&article.url).await
        }
        None => description.unwrap_or(NO_CONTENT).to_string(),
    };

    // Placeholders carry no signal, so derive metadata from the description
    let signal = if is_placeholder(&content) {
        description.unwrap_or_default()
    } else {
        content.as_str()
    };

    PostDraft {
        title: article.title.clone(),
        slug: slugify(&article.title),
        excerpt: description.unwrap_or("No description available").to_string(),
        cover_image: non_blank(article.url_to_image.as_ref()).map(str::to_string),
        published: true,
        featured: false,
        sponsored: false,
        author_id,
        category_id,
        tags: extract_tags(signal),
        keywords: extract_keywords(signal),
        read_time: read_time(&content),
        published_at: Some(parse_published_at(article.published_at.as_deref())),
        source_url: Some(article.url.clone()),
        source_name: Some(article.source.name.clone()),
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleSource;
    use crate::scrapers::extractor::{ExtractorConfig, SENTINEL};
    use chrono::TimeZone;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(ExtractorConfig::default()).unwrap()
    }

    fn article(content: Option<&str>, description: Option<&str>) -> NewsArticle {
        NewsArticle {
            source: ArticleSource {
                id: None,
                name: "Example Wire".to_string(),
            },
            author: Some("Reporter".to_string()),
            title: "Getting Started with Next.js 15!".to_string(),
            description: description.map(str::to_string),
            url: "https://example.com/nextjs".to_string(),
            url_to_image: Some("https://example.com/img.png".to_string()),
            published_at: Some("2025-05-06T14:30:00Z".to_string()),
            content: content.map(str::to_string),
        }
    }

    #[test]
    fn test_extract_tags_vocabulary_order_and_cap() {
        let text = "Metaverse robotics blockchain startup software hardware mobile AI";
        let tags = extract_tags(text);
        assert_eq!(
            tags,
            vec!["AI", "blockchain", "startup", "software", "hardware"]
        );
    }

    #[test]
    fn test_extract_tags_only_vocabulary_terms() {
        let tags = extract_tags("Quantum computing and cybersecurity in the cloud computing era");
        assert!(tags.len() <= MAX_TAGS);
        for tag in &tags {
            assert!(TAG_VOCABULARY.contains(&tag.as_str()));
        }
        assert!(tags.contains(&"quantum computing".to_string()));
        assert!(tags.contains(&"cybersecurity".to_string()));
    }

    #[test]
    fn test_extract_tags_empty() {
        assert!(extract_tags("").is_empty());
    }

    #[test]
    fn test_extract_keywords_rank_and_filters() {
        let text = "Rockets! Rockets launch; rockets land. Engines roar, engines cool. \
                    Which would about there other satellite.";
        let keywords = extract_keywords(text);
        assert_eq!(keywords[0], "rockets");
        assert_eq!(keywords[1], "engines");
        assert!(keywords.contains(&"launch".to_string()));
        assert!(keywords.contains(&"satellite".to_string()));
        for w in ["which", "would", "about", "there", "other", "land", "roar", "cool"] {
            assert!(!keywords.contains(&w.to_string()), "{w} should be filtered");
        }
    }

    #[test]
    fn test_extract_keywords_keeps_common_long_words() {
        let text = "People should still trust those because people being people. Water could think.";
        let keywords = extract_keywords(text);
        assert_eq!(keywords[0], "people");
        for w in ["should", "still", "trust", "those", "because", "being"] {
            assert!(keywords.contains(&w.to_string()), "{w} should be kept");
        }
        for w in ["water", "could", "think"] {
            assert!(!keywords.contains(&w.to_string()), "{w} should be filtered");
        }
    }

    #[test]
    fn test_extract_keywords_cap() {
        let text: String = (0..30).map(|i| format!("keyword{i:02} ")).collect();
        let keywords = extract_keywords(&text);
        assert_eq!(keywords.len(), MAX_KEYWORDS);
        assert!(keywords.iter().all(|k| k.chars().count() > 4));
        assert_eq!(keywords[0], "keyword00");
    }

    #[tokio::test]
    async fn test_to_post_prefers_inline_content() {
        let body = "Inline body about software and AI. ".repeat(50);
        let draft = to_post(
            &article(Some(&body), Some("Short description")),
            None,
            Uuid::new_v4(),
            true,
            &extractor(),
        )
        .await;

        assert_eq!(draft.slug, "getting-started-with-nextjs-15");
        assert_eq!(draft.content, body);
        assert_eq!(draft.excerpt, "Short description");
        assert!(draft.published);
        assert!(!draft.featured && !draft.sponsored);
        assert_eq!(draft.source_url.as_deref(), Some("https://example.com/nextjs"));
        assert_eq!(draft.source_name.as_deref(), Some("Example Wire"));
        assert_eq!(
            draft.published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap())
        );
        assert!(draft.read_time >= 1);
        assert!(draft.tags.contains(&"AI".to_string()));
        assert!(draft.tags.contains(&"software".to_string()));
    }

    #[tokio::test]
    async fn test_to_post_without_fetch_uses_description() {
        let draft = to_post(
            &article(None, Some("Description about robotics")),
            None,
            Uuid::new_v4(),
            false,
            &extractor(),
        )
        .await;
        assert_eq!(draft.content, "Description about robotics");
        assert_eq!(draft.read_time, 1);
        assert_eq!(draft.tags, vec!["robotics"]);
    }

    #[tokio::test]
    async fn test_to_post_with_nothing_uses_placeholder() {
        let draft = to_post(&article(None, None), None, Uuid::new_v4(), false, &extractor()).await;
        assert_eq!(draft.content, NO_CONTENT);
        assert_eq!(draft.excerpt, "No description available");
        assert!(draft.tags.is_empty());
        assert!(draft.keywords.is_empty());
    }

    #[tokio::test]
    async fn test_to_post_failed_extraction_keeps_sentinel() {
        let mut raw = article(None, Some("Fintech funding news"));
        raw.url = "http://127.0.0.1:1/unreachable".to_string();
        let draft = to_post(&raw, None, Uuid::new_v4(), true, &extractor()).await;
        assert_eq!(draft.content, SENTINEL);
        assert_eq!(draft.tags, vec!["fintech"]);
        assert_eq!(draft.read_time, 1);
    }

    #[tokio::test]
    async fn test_to_post_read_time_is_deterministic() {
        let body = "word ".repeat(450);
        let raw = article(Some(&body), None);
        let author = Uuid::new_v4();
        let a = to_post(&raw, None, author, false, &extractor()).await;
        let b = to_post(&raw, None, author, false, &extractor()).await;
        assert_eq!(a.read_time, 3);
        assert_eq!(a.read_time, b.read_time);
    }

    #[test]
    fn test_parse_published_at_fallback() {
        let before = Utc::now();
        let parsed = parse_published_at(Some("yesterday-ish"));
        assert!(parsed >= before);
    }
}
