//! Data models for upstream articles and the posts they become.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`NewsArticle`] / [`NewsApiResponse`]: Raw article data as returned by the news API
//! - [`Category`]: The fixed set of categories the pipeline knows how to fetch
//! - [`PostDraft`] / [`Post`]: A normalized article before and after it is persisted
//! - [`CategoryRecord`], [`User`]: Supporting records created lazily by the pipeline
//! - Report types returned by ingestion, sweep and backfill runs
//!
//! Types that cross the HTTP boundary use camelCase field names to match the
//! JSON consumed by the admin UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where an upstream article came from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArticleSource {
    /// Provider-specific source id (often null for smaller outlets).
    pub id: Option<String>,
    /// Human-readable outlet name, e.g. "The Verge".
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// A raw news article as returned by the news API.
///
/// Transient: it is normalized into a [`PostDraft`] and never stored as-is.
/// The API is loose about nulls. A null or missing title, URL or source
/// decodes as empty so one bad article cannot fail the whole envelope; the
/// pipeline rejects it on its own.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: ArticleSource,
    pub author: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    /// Truncated content snippet. Missing for most headline results.
    pub content: Option<String>,
}

/// Envelope returned by every news API endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiResponse {
    /// `"ok"` on success, `"error"` otherwise.
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_results: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub articles: Vec<NewsArticle>,
    /// Machine-readable error code, only present when `status == "error"`.
    pub code: Option<String>,
    /// Human-readable error message, only present when `status == "error"`.
    pub message: Option<String>,
}

/// The categories the pipeline can fetch.
///
/// Anything the parser does not recognize falls back to [`Category::Tech`],
/// so callers can pass user input straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Tech,
    Business,
    Health,
    Science,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Tech,
        Category::Business,
        Category::Health,
        Category::Science,
    ];

    /// Parse a category name, falling back to `Tech` for anything unknown.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "business" => Category::Business,
            "health" => Category::Health,
            "science" => Category::Science,
            _ => Category::Tech,
        }
    }

    /// The slug used for the category record and for filtering.
    pub fn slug(&self) -> &'static str {
        match self {
            Category::Tech => "tech",
            Category::Business => "business",
            Category::Health => "health",
            Category::Science => "science",
        }
    }

    /// Display name used when the category record is created.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Tech => "Technology",
            Category::Business => "Business",
            Category::Health => "Health",
            Category::Science => "Science",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Category::parse(&raw))
    }
}

/// Role of a [`User`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

/// An account posts are attributed to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a [`User`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// A persisted category.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: Uuid,
    pub name: String,
    /// Unique key used for routing and filtering.
    pub slug: String,
    pub description: String,
    /// Tailwind color class used by the site theme.
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a [`CategoryRecord`].
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub color: String,
}

impl NewCategory {
    /// The record the pipeline creates the first time a category is requested.
    pub fn for_category(category: Category) -> Self {
        let name = category.display_name();
        Self {
            name: name.to_string(),
            slug: category.slug().to_string(),
            description: format!("Latest news in {name}"),
            color: "bg-blue-500".to_string(),
        }
    }
}

/// A normalized article that has not been stored yet.
///
/// Produced by [`crate::normalize::to_post`] for ingested articles; the store
/// assigns the id and timestamps and makes the slug unique.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub sponsored: bool,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub read_time: u32,
    pub published_at: Option<DateTime<Utc>>,
    /// Set for ingested posts only. The retention sweep relies on this.
    pub source_url: Option<String>,
    pub source_name: Option<String>,
}

/// A persisted article or news item.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub sponsored: bool,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    /// Only ever incremented.
    pub views: u64,
    pub read_time: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub source_name: Option<String>,
}

impl Post {
    /// Whether this post came from the ingestion pipeline.
    pub fn is_ingested(&self) -> bool {
        self.source_url.is_some()
    }
}

/// Article summary returned by the preview endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePreview {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub source: String,
    pub author: Option<String>,
}

impl From<&NewsArticle> for ArticlePreview {
    fn from(article: &NewsArticle) -> Self {
        Self {
            title: article.title.clone(),
            description: article.description.clone(),
            url: article.url.clone(),
            url_to_image: article.url_to_image.clone(),
            published_at: article.published_at.clone(),
            source: article.source.name.clone(),
            author: article.author.clone(),
        }
    }
}

/// Result of a fetch without persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub articles: Vec<ArticlePreview>,
    pub total_results: u64,
}

/// A post saved by an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub source: String,
}

/// An article that could not be saved, with the raw error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleError {
    pub title: String,
    pub error: String,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub category: Category,
    pub total_fetched: usize,
    pub saved_posts: Vec<SavedPost>,
    /// Articles dropped as duplicates.
    pub skipped: usize,
    pub errors: Vec<ArticleError>,
}

impl IngestReport {
    pub fn saved_count(&self) -> usize {
        self.saved_posts.len()
    }
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Number of ingested posts found.
    pub examined: usize,
    pub deleted: usize,
}

/// A post whose content was replaced by the backfill job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedPost {
    pub id: Uuid,
    pub title: String,
    pub content_length: usize,
}

/// Outcome of one backfill run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub examined: usize,
    pub updated_articles: Vec<UpdatedPost>,
}
