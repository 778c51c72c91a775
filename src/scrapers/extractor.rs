//! Full-article content extractor.
//!
//! The news API usually hands back a description and a truncated snippet at
//! best. When a post has no inline content, this module fetches the article
//! page itself and pulls out the main body text with a few layered
//! heuristics:
//!
//! 1. Drop noise elements (scripts, navigation, ads, sidebars, comments, ...)
//! 2. Try a list of known article containers, first one over 800 chars wins
//! 3. Otherwise join every substantial `<p>` in the body
//! 4. Otherwise take the longest `<div>` text block
//!
//! The result is whitespace-normalized and only accepted if it is longer
//! than 500 characters. Any failure along the way yields [`SENTINEL`]; the
//! extractor never returns an error.

use crate::utils::normalize_whitespace;
use once_cell::sync::Lazy;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Content stored when extraction fails. Doubles as the backfill marker.
pub const SENTINEL: &str = "Full article content could not be retrieved. Please visit the original source for the complete article.";

/// Content stored when neither the API nor the page yielded anything.
pub const NO_CONTENT: &str = "No content available";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Returns `true` for content that marks a post as needing a backfill.
pub fn is_placeholder(content: &str) -> bool {
    content.contains("could not be retrieved") || content.contains(NO_CONTENT)
}

static NOISE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "script, style, noscript, nav, header, footer, aside, \
         .advertisement, .ad, .sidebar, .comments, .social-share, \
         .related-articles, .newsletter, .subscribe, .footer, .header",
    )
    .unwrap()
});

// Generic containers first, then site-specific patterns, then broad "main" areas.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main article",
    ".article-content",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".content",
    ".story-body",
    ".article-text",
    ".post-text",
    ".entry-text",
    ".article-main",
    ".post-main",
    ".entry-main",
    "[data-module=\"ArticleBody\"]",
    ".ArticleBody",
    ".caas-body",
    ".article__body",
    ".post__body",
    ".entry__body",
    ".story__body",
    ".content__body",
    ".article__content",
    ".post__content",
    ".entry__content",
    ".story__content",
    ".content__content",
    "main",
    ".main-content",
    ".main-article",
    ".main-story",
    ".main-post",
    ".main-entry",
    ".caas-content",
    ".article-content-body",
    ".story-content-body",
    ".post-content-body",
    ".entry-content-body",
];

static CONTENT: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok().map(|sel| (*s, sel)))
        .collect()
});

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("body p").unwrap());
static DIVS: Lazy<Selector> = Lazy::new(|| Selector::parse("body div").unwrap());

/// Tunables for [`ContentExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// A selector match must be longer than this to be used directly.
    pub min_selector_chars: usize,
    /// Paragraphs at or below this length are ignored by the fallback.
    pub min_paragraph_chars: usize,
    /// Divs at or below this length are ignored by the last fallback.
    pub min_div_chars: usize,
    /// The final text must be longer than this to be accepted.
    pub min_accept_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: BROWSER_USER_AGENT.to_string(),
            min_selector_chars: 800,
            min_paragraph_chars: 50,
            min_div_chars: 100,
            min_accept_chars: 500,
        }
    }
}

/// Fetches article pages and extracts their main text.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    http: Client,
    config: ExtractorConfig,
}

impl ContentExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Fetch `url` and return its main text, or [`SENTINEL`] on any failure.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_full_content(&self, url: &str) -> String {
        let parsed = match Url::parse(url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => u,
            Ok(u) => {
                warn!(scheme = u.scheme(), "Refusing to fetch non-http URL");
                return SENTINEL.to_string();
            }
            Err(e) => {
                warn!(error = %e, "Article URL does not parse");
                return SENTINEL.to_string();
            }
        };

        let html = match self.fetch_html(parsed).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Article fetch failed");
                return SENTINEL.to_string();
            }
        };

        match extract_with(&html, &self.config) {
            Some(text) => {
                info!(chars = text.chars().count(), "Extracted article content");
                text
            }
            None => {
                warn!(bytes = html.len(), "Article page had no usable content");
                SENTINEL.to_string()
            }
        }
    }

    async fn fetch_html(&self, url: Url) -> Result<String, reqwest::Error> {
        self.http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

/// Extract the main text of an HTML page with the default thresholds.
///
/// Returns `None` when nothing longer than 500 characters was found.
pub fn extract_main_text(html: &str) -> Option<String> {
    extract_with(html, &ExtractorConfig::default())
}

fn extract_with(html: &str, config: &ExtractorConfig) -> Option<String> {
    let mut document = Html::parse_document(html);
    strip_noise(&mut document);

    let mut content = String::new();
    for (name, selector) in CONTENT.iter() {
        let mut matches = document.select(selector).peekable();
        if matches.peek().is_none() {
            continue;
        }
        content = matches.map(element_text).collect::<String>().trim().to_string();
        if char_len(&content) > config.min_selector_chars {
            debug!(selector = name, chars = char_len(&content), "Matched content selector");
            break;
        }
    }

    if char_len(&content) <= config.min_selector_chars {
        content = document
            .select(&PARAGRAPHS)
            .map(|p| element_text(p).trim().to_string())
            .filter(|p| char_len(p) > config.min_paragraph_chars)
            .collect::<Vec<_>>()
            .join("\n\n");
        debug!(chars = char_len(&content), "Used paragraph extraction");
    }

    if char_len(&content) <= config.min_selector_chars {
        let longest = document
            .select(&DIVS)
            .map(|d| element_text(d).trim().to_string())
            .filter(|d| char_len(d) > config.min_div_chars)
            .max_by_key(|d| char_len(d));
        if let Some(div) = longest {
            debug!(chars = char_len(&div), "Used div extraction");
            content = div;
        }
    }

    let content = normalize_whitespace(&content);
    (char_len(&content) > config.min_accept_chars).then_some(content)
}

fn strip_noise(document: &mut Html) {
    let ids: Vec<_> = document.select(&NOISE).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sentence(n: usize) -> String {
        format!(
            "Sentence number {n} explains how the new chip design improves battery life for laptops. "
        )
    }

    fn long_text(sentences: usize) -> String {
        (0..sentences).map(sentence).collect()
    }

    fn article_page() -> String {
        format!(
            r#"<html><head><title>T</title><script>var tracking = "SCRIPT_NOISE";</script></head>
            <body>
              <header>HEADER_NOISE</header>
              <nav>NAV_NOISE</nav>
              <article>
                <p>{}</p>
                <div class="ad">AD_NOISE</div>
                <p>{}</p>
              </article>
              <footer>FOOTER_NOISE</footer>
            </body></html>"#,
            long_text(6),
            long_text(6)
        )
    }

    #[test]
    fn test_article_selector_wins_and_noise_is_removed() {
        let text = extract_main_text(&article_page()).unwrap();
        assert!(text.chars().count() > 800);
        assert!(text.contains("Sentence number 0"));
        for noise in ["SCRIPT_NOISE", "HEADER_NOISE", "NAV_NOISE", "AD_NOISE", "FOOTER_NOISE"] {
            assert!(!text.contains(noise), "{noise} leaked into {text}");
        }
    }

    #[test]
    fn test_paragraph_fallback() {
        let paragraphs: String = (0..12).map(|i| format!("<p>{}</p>\n", sentence(i))).collect();
        let html = format!(
            "<html><body><div><p>Too short.</p>{paragraphs}</div></body></html>"
        );
        let text = extract_main_text(&html).unwrap();
        assert!(!text.contains("Too short."));
        assert!(text.contains("Sentence number 11"));
        assert!(text.contains("\n\n"));
    }

    #[test]
    fn test_div_fallback() {
        let html = format!(
            "<html><body><div><span>{}</span></div><div>tiny</div></body></html>",
            long_text(7)
        );
        let text = extract_main_text(&html).unwrap();
        assert!(text.starts_with("Sentence number 0"));
        assert!(text.chars().count() > 500);
    }

    #[test]
    fn test_short_page_is_rejected() {
        let html = "<html><body><article><p>Just a teaser.</p></article></body></html>";
        assert!(extract_main_text(html).is_none());
    }

    #[test]
    fn test_garbage_html_does_not_panic() {
        assert!(extract_main_text("<<<>>> </div></p><article").is_none());
        assert!(extract_main_text("").is_none());
    }

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder(SENTINEL));
        assert!(is_placeholder(NO_CONTENT));
        assert!(!is_placeholder("A real article body."));
    }

    #[tokio::test]
    async fn test_fetch_full_content_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story"))
            .respond_with(ResponseTemplate::new(200).set_body_string(article_page()))
            .mount(&server)
            .await;

        let extractor = ContentExtractor::new(ExtractorConfig::default()).unwrap();
        let text = extractor
            .fetch_full_content(&format!("{}/story", server.uri()))
            .await;
        assert_ne!(text, SENTINEL);
        assert!(text.chars().count() > 500);
    }

    #[tokio::test]
    async fn test_fetch_full_content_http_error_yields_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string(article_page()))
            .mount(&server)
            .await;

        let extractor = ContentExtractor::new(ExtractorConfig::default()).unwrap();
        let text = extractor
            .fetch_full_content(&format!("{}/missing", server.uri()))
            .await;
        assert_eq!(text, SENTINEL);
    }

    #[tokio::test]
    async fn test_fetch_full_content_never_fails() {
        let extractor = ContentExtractor::new(ExtractorConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        for url in ["not a url", "ftp://example.com/file", "http://127.0.0.1:1/unreachable", ""] {
            assert_eq!(extractor.fetch_full_content(url).await, SENTINEL);
        }
    }
}
