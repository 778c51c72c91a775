//! The ingestion pipeline: fetch → dedupe → extract → normalize → persist.
//!
//! [`Ingestor`] owns the collaborators and exposes the four jobs the
//! scheduler, the HTTP layer and the CLI trigger: [`Ingestor::preview`],
//! [`Ingestor::ingest`], [`Ingestor::sweep`] and [`Ingestor::backfill`].
//!
//! Batches favor partial success. A failing article is recorded in the
//! report's `errors` and the batch moves on; only a failed upstream fetch or
//! a failure to set up the author/category aborts the whole run.

use crate::error::{IngestError, StoreError};
use crate::models::{
    ArticleError, ArticlePreview, BackfillReport, Category, IngestReport, NewCategory, NewUser,
    NewsArticle, Preview, Role, SavedPost, SweepReport, UpdatedPost, User,
};
use crate::normalize::to_post;
use crate::scrapers::extractor::{ContentExtractor, is_placeholder};
use crate::source::NewsApiClient;
use crate::store::Store;
use crate::utils::{read_time, truncate_for_log};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Ingested posts kept by the retention sweep.
pub const RETENTION_KEEP: usize = 50;

/// Posts examined per backfill run.
pub const DEFAULT_BACKFILL_LIMIT: usize = 5;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@10xnews.com";
pub const DEFAULT_ADMIN_NAME: &str = "10xNews Staff";

/// What counts as "already stored".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupeMode {
    /// Same title. Used by the manual HTTP fetch.
    Title,
    /// Same title or same source URL. Used by scheduled and CLI runs.
    #[default]
    TitleOrSource,
}

/// Point-in-time duplicate check run before an article is normalized.
///
/// The store's own uniqueness check backs this up, so a race between two
/// runs still cannot insert the same article twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupeGate {
    mode: DedupeMode,
}

impl DedupeGate {
    pub fn new(mode: DedupeMode) -> Self {
        Self { mode }
    }

    pub async fn is_duplicate(
        &self,
        store: &dyn Store,
        article: &NewsArticle,
    ) -> Result<bool, StoreError> {
        let source_url = match self.mode {
            DedupeMode::Title => None,
            DedupeMode::TitleOrSource => Some(article.url.as_str()).filter(|u| !u.is_empty()),
        };
        Ok(store
            .find_duplicate(&article.title, source_url)
            .await?
            .is_some())
    }
}

/// Trims ingested posts down to the newest `keep`.
///
/// Posts without a source URL are never considered.
#[derive(Debug, Clone, Copy)]
pub struct RetentionSweeper {
    keep: usize,
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self {
            keep: RETENTION_KEEP,
        }
    }
}

impl RetentionSweeper {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    #[instrument(level = "info", skip_all, fields(keep = self.keep))]
    pub async fn sweep(&self, store: &dyn Store) -> Result<SweepReport, StoreError> {
        let sourced = store.sourced_posts_newest_first().await?;
        let examined = sourced.len();
        if examined <= self.keep {
            debug!(examined, "Nothing to sweep");
            return Ok(SweepReport {
                examined,
                deleted: 0,
            });
        }

        let doomed: Vec<Uuid> = sourced[self.keep..].iter().map(|p| p.id).collect();
        let deleted = store.delete_posts(&doomed).await?;
        info!(examined, deleted, "Swept old ingested posts");
        Ok(SweepReport { examined, deleted })
    }
}

/// Knobs for an [`Ingestor`].
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Author of every ingested post, created on first use.
    pub admin_email: String,
    pub admin_name: String,
    /// Scrape article pages when the API returned no inline content.
    pub fetch_full_content: bool,
    pub backfill_limit: usize,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_name: DEFAULT_ADMIN_NAME.to_string(),
            fetch_full_content: true,
            backfill_limit: DEFAULT_BACKFILL_LIMIT,
        }
    }
}

/// Runs the ingestion jobs against one store.
#[derive(Clone)]
pub struct Ingestor {
    source: NewsApiClient,
    extractor: ContentExtractor,
    store: Arc<dyn Store>,
    sweeper: RetentionSweeper,
    config: IngestorConfig,
}

impl Ingestor {
    pub fn new(
        source: NewsApiClient,
        extractor: ContentExtractor,
        store: Arc<dyn Store>,
        config: IngestorConfig,
    ) -> Self {
        Self {
            source,
            extractor,
            store,
            sweeper: RetentionSweeper::default(),
            config,
        }
    }

    pub fn with_sweeper(mut self, sweeper: RetentionSweeper) -> Self {
        self.sweeper = sweeper;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &IngestorConfig {
        &self.config
    }

    /// Fetch a category without storing anything.
    #[instrument(level = "info", skip(self))]
    pub async fn preview(&self, category: Category, limit: u32) -> Result<Preview, IngestError> {
        let response = self.source.fetch_by_category(category, limit).await?;
        Ok(Preview {
            articles: response.articles.iter().map(ArticlePreview::from).collect(),
            total_results: response.total_results,
        })
    }

    /// Fetch up to `limit` articles for `category` and store the new ones.
    ///
    /// Articles are processed one at a time. Duplicates are counted in
    /// `skipped`; any other per-article failure lands in `errors`.
    #[instrument(level = "info", skip(self))]
    pub async fn ingest(
        &self,
        category: Category,
        limit: u32,
        mode: DedupeMode,
    ) -> Result<IngestReport, IngestError> {
        let response = self.source.fetch_by_category(category, limit).await?;
        let author = self.ensure_admin().await?;
        let category_id = self.ensure_category(category).await?;
        let gate = DedupeGate::new(mode);

        let mut report = IngestReport {
            category,
            total_fetched: response.articles.len(),
            ..Default::default()
        };

        for article in &response.articles {
            match self.save_article(&gate, article, category_id, author.id).await {
                Ok(Some(saved)) => report.saved_posts.push(saved),
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        title = %truncate_for_log(&article.title, 80),
                        error = %e,
                        "Failed to save article"
                    );
                    report.errors.push(ArticleError {
                        title: article.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            %category,
            fetched = report.total_fetched,
            saved = report.saved_count(),
            skipped = report.skipped,
            errors = report.errors.len(),
            "Ingestion finished"
        );
        Ok(report)
    }

    /// `Ok(None)` means the article was a duplicate.
    async fn save_article(
        &self,
        gate: &DedupeGate,
        article: &NewsArticle,
        category_id: Uuid,
        author_id: Uuid,
    ) -> Result<Option<SavedPost>, StoreError> {
        if article.title.trim().is_empty() {
            return Err(StoreError::Invalid("article has no title".to_string()));
        }
        if gate.is_duplicate(self.store.as_ref(), article).await? {
            debug!(title = %truncate_for_log(&article.title, 80), "Skipping duplicate");
            return Ok(None);
        }

        let draft = to_post(
            article,
            Some(category_id),
            author_id,
            self.config.fetch_full_content,
            &self.extractor,
        )
        .await;

        match self.store.create_post(draft).await {
            Ok(post) => {
                info!(slug = %post.slug, "Saved article");
                Ok(Some(SavedPost {
                    id: post.id,
                    title: post.title,
                    slug: post.slug,
                    source: post.source_name.unwrap_or_default(),
                }))
            }
            Err(StoreError::Duplicate(title)) => {
                debug!(title = %truncate_for_log(&title, 80), "Lost insert race; skipping");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete ingested posts beyond the retention cap.
    pub async fn sweep(&self) -> Result<SweepReport, IngestError> {
        Ok(self.sweeper.sweep(self.store.as_ref()).await?)
    }

    /// Re-extract content for posts still carrying a placeholder.
    ///
    /// A post is only updated when the new extraction produced real content;
    /// otherwise it keeps its placeholder and stays eligible for next time.
    #[instrument(level = "info", skip(self))]
    pub async fn backfill(&self, limit: usize) -> Result<BackfillReport, IngestError> {
        let pending = self.store.posts_needing_content(limit).await?;
        let min_chars = self.extractor.config().min_accept_chars;
        let mut report = BackfillReport {
            examined: pending.len(),
            ..Default::default()
        };

        for post in pending {
            let Some(url) = post.source_url.as_deref() else {
                continue;
            };
            let content = self.extractor.fetch_full_content(url).await;
            let chars = content.chars().count();
            if chars <= min_chars || is_placeholder(&content) {
                debug!(slug = %post.slug, "Extraction still failing");
                continue;
            }

            let minutes = read_time(&content);
            match self.store.update_content(post.id, content, minutes).await {
                Ok(updated) => report.updated_articles.push(UpdatedPost {
                    id: updated.id,
                    title: updated.title,
                    content_length: chars,
                }),
                Err(e) => warn!(slug = %post.slug, error = %e, "Failed to update content"),
            }
        }

        info!(
            examined = report.examined,
            updated = report.updated_articles.len(),
            "Backfill finished"
        );
        Ok(report)
    }

    /// The admin user ingested posts are attributed to, created if missing.
    pub async fn ensure_admin(&self) -> Result<User, StoreError> {
        if let Some(admin) = self.store.find_user_by_role(Role::Admin).await? {
            return Ok(admin);
        }
        info!(email = %self.config.admin_email, "Creating fallback admin user");
        self.store
            .create_user(NewUser {
                email: self.config.admin_email.clone(),
                name: self.config.admin_name.clone(),
                role: Role::Admin,
            })
            .await
    }

    /// Id of the category record for `category`, created if missing.
    pub async fn ensure_category(&self, category: Category) -> Result<Uuid, StoreError> {
        if let Some(existing) = self.store.find_category_by_slug(category.slug()).await? {
            return Ok(existing.id);
        }
        let created = self
            .store
            .create_category(NewCategory::for_category(category))
            .await?;
        info!(slug = %created.slug, "Created category");
        Ok(created.id)
    }
}
