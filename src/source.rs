//! News API client.
//!
//! Thin wrapper over a NewsAPI.org-compatible search service. Two upstream
//! query modes are used:
//!
//! | Category | Endpoint | Query |
//! |----------|----------|-------|
//! | tech | `everything` | OR'd technology keywords, newest first |
//! | science | `everything` | OR'd science keywords, newest first |
//! | business | `top-headlines` | `category=business&country=us` |
//! | health | `top-headlines` | `category=health&country=us` |
//!
//! Errors are returned as-is. There is no retry and no backoff: a failed
//! scheduled run is simply picked up again on the next tick.

use crate::error::SourceError;
use crate::models::{Category, NewsApiResponse};
use crate::utils::truncate_for_log;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";

const TECH_QUERY: &str =
    "technology OR tech OR software OR AI OR artificial intelligence OR startup OR innovation";
const SCIENCE_QUERY: &str = "science OR research OR study OR medical OR health technology";

/// Connection settings for [`NewsApiClient`].
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl SourceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Parameters for the `top-headlines` endpoint.
#[derive(Debug, Clone, Default)]
pub struct HeadlinesQuery {
    pub country: Option<String>,
    pub category: Option<String>,
    pub sources: Option<String>,
    pub q: Option<String>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
}

impl HeadlinesQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_opt(&mut params, "country", &self.country);
        push_opt(&mut params, "category", &self.category);
        push_opt(&mut params, "sources", &self.sources);
        push_opt(&mut params, "q", &self.q);
        push_num(&mut params, "pageSize", self.page_size);
        push_num(&mut params, "page", self.page);
        params
    }
}

/// Sort order for the `everything` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Relevancy,
    Popularity,
    PublishedAt,
}

impl SortBy {
    fn as_str(&self) -> &'static str {
        match self {
            SortBy::Relevancy => "relevancy",
            SortBy::Popularity => "popularity",
            SortBy::PublishedAt => "publishedAt",
        }
    }
}

/// Parameters for the `everything` endpoint.
#[derive(Debug, Clone, Default)]
pub struct EverythingQuery {
    pub q: Option<String>,
    pub sources: Option<String>,
    pub domains: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub language: Option<String>,
    pub sort_by: Option<SortBy>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
}

impl EverythingQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_opt(&mut params, "q", &self.q);
        push_opt(&mut params, "sources", &self.sources);
        push_opt(&mut params, "domains", &self.domains);
        push_opt(&mut params, "from", &self.from);
        push_opt(&mut params, "to", &self.to);
        push_opt(&mut params, "language", &self.language);
        if let Some(sort_by) = self.sort_by {
            params.push(("sortBy", sort_by.as_str().to_string()));
        }
        push_num(&mut params, "pageSize", self.page_size);
        push_num(&mut params, "page", self.page);
        params
    }
}

fn push_opt(params: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<String>) {
    if let Some(v) = value {
        params.push((key, v.clone()));
    }
}

fn push_num(params: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<u32>) {
    if let Some(v) = value {
        params.push((key, v.to_string()));
    }
}

/// Client for the news search API.
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        if config.api_key.trim().is_empty() {
            return Err(SourceError::Config("missing news API key".to_string()));
        }
        // Url::join replaces the last path segment unless it ends in '/'
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| SourceError::Config(format!("invalid base URL {base:?}: {e}")))?;
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
        })
    }

    /// Fetch the newest articles for a category.
    ///
    /// This is the entry point used by the pipeline. See the module docs for
    /// how each category maps onto an upstream query.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_by_category(
        &self,
        category: Category,
        page_size: u32,
    ) -> Result<NewsApiResponse, SourceError> {
        let response = match category {
            Category::Tech => self.everything(&keyword_query(TECH_QUERY, page_size)).await?,
            Category::Science => {
                self.everything(&keyword_query(SCIENCE_QUERY, page_size))
                    .await?
            }
            Category::Business | Category::Health => {
                self.top_headlines(&HeadlinesQuery {
                    country: Some("us".to_string()),
                    category: Some(category.slug().to_string()),
                    page_size: Some(page_size),
                    ..Default::default()
                })
                .await?
            }
        };
        info!(
            count = response.articles.len(),
            total_results = response.total_results,
            "Fetched articles"
        );
        Ok(response)
    }

    /// Call the `top-headlines` endpoint.
    pub async fn top_headlines(
        &self,
        query: &HeadlinesQuery,
    ) -> Result<NewsApiResponse, SourceError> {
        self.get("top-headlines", query.params()).await
    }

    /// Call the `everything` endpoint.
    pub async fn everything(&self, query: &EverythingQuery) -> Result<NewsApiResponse, SourceError> {
        self.get("everything", query.params()).await
    }

    async fn get(
        &self,
        endpoint: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<NewsApiResponse, SourceError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| SourceError::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;
        debug!(%url, ?params, "Calling news API");

        let response = self
            .http
            .get(url)
            .query(&[("apiKey", self.api_key.as_str())])
            .query(&params)
            .send()
            .await?;
        let http_status = response.status();
        let body = response.text().await?;

        let parsed: NewsApiResponse =
            serde_json::from_str(&body).map_err(|source| {
                warn!(
                    http_status = http_status.as_u16(),
                    body = %truncate_for_log(&body, 300),
                    "News API body is not valid JSON"
                );
                SourceError::Decode {
                    http_status: http_status.as_u16(),
                    source,
                }
            })?;

        if parsed.status != "ok" {
            let message = parsed
                .message
                .clone()
                .unwrap_or_else(|| format!("HTTP {http_status}"));
            warn!(status = %parsed.status, code = ?parsed.code, %message, "News API rejected request");
            return Err(SourceError::Status {
                status: parsed.status,
                message,
            });
        }
        Ok(parsed)
    }
}

fn keyword_query(q: &str, page_size: u32) -> EverythingQuery {
    EverythingQuery {
        q: Some(q.to_string()),
        language: Some("en".to_string()),
        sort_by: Some(SortBy::PublishedAt),
        page_size: Some(page_size),
        ..Default::default()
    }
}
