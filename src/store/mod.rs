//! Persistence facade.
//!
//! The pipeline and the HTTP read paths only ever see the [`Store`] trait.
//! A single implementation is picked at startup:
//!
//! - [`JsonStore::open`]: posts, categories and users in one JSON file
//! - [`JsonStore::in_memory`]: same behavior without touching disk (tests, dry runs)
//!
//! Uniqueness lives here rather than in callers. [`Store::create_post`]
//! rejects a second post with the same title or source URL with
//! [`StoreError::Duplicate`] and makes slugs unique by suffixing, all under
//! the store's write lock, so overlapping ingestion runs cannot
//! double-insert.

pub mod json;

use crate::error::StoreError;
use crate::models::{CategoryRecord, NewCategory, NewUser, Post, PostDraft, Role, User};
use async_trait::async_trait;
use uuid::Uuid;

pub use json::JsonStore;

/// Filter for [`Store::list_posts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PostQuery {
    /// Only posts in the category with this slug.
    pub category_slug: Option<String>,
    /// Only published posts.
    pub published_only: bool,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_role(&self, role: Role) -> Result<Option<User>, StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, StoreError>;

    /// Create a category, or return the existing one with the same slug.
    async fn create_category(&self, category: NewCategory) -> Result<CategoryRecord, StoreError>;

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, StoreError>;

    /// First post whose title equals `title`, or whose source URL equals
    /// `source_url` when one is given.
    async fn find_duplicate(
        &self,
        title: &str,
        source_url: Option<&str>,
    ) -> Result<Option<Post>, StoreError>;

    /// Persist a draft. Fails with [`StoreError::Duplicate`] if the title or
    /// source URL is taken; the slug gets a numeric suffix if it is taken.
    async fn create_post(&self, draft: PostDraft) -> Result<Post, StoreError>;

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError>;

    /// Published-date-descending listing.
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError>;

    /// Every post with a source URL, newest `published_at` first.
    async fn sourced_posts_newest_first(&self) -> Result<Vec<Post>, StoreError>;

    /// Up to `limit` sourced posts whose content is a placeholder.
    async fn posts_needing_content(&self, limit: usize) -> Result<Vec<Post>, StoreError>;

    async fn update_content(
        &self,
        id: Uuid,
        content: String,
        read_time: u32,
    ) -> Result<Post, StoreError>;

    /// Bump the view counter and return the new value.
    async fn increment_views(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Delete the given posts, returning how many existed.
    async fn delete_posts(&self, ids: &[Uuid]) -> Result<usize, StoreError>;
}
