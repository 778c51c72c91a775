//! JSON-file backed [`Store`].
//!
//! The whole data set lives in memory behind one async mutex and is written
//! back to disk after every mutation (write to a temp file, then rename).
//! That is plenty for a news site's few hundred posts and keeps every
//! check-then-write sequence atomic.

use super::{PostQuery, Store};
use crate::error::StoreError;
use crate::models::{CategoryRecord, NewCategory, NewUser, Post, PostDraft, Role, User};
use crate::scrapers::extractor::is_placeholder;
use crate::utils::ensure_writable_dir;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    categories: Vec<CategoryRecord>,
    #[serde(default)]
    posts: Vec<Post>,
}

impl Snapshot {
    fn unique_slug(&self, base: &str) -> String {
        let base = if base.is_empty() { "post" } else { base };
        let taken = |s: &str| self.posts.iter().any(|p| p.slug == s);
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| format!("{base}-{}", Uuid::new_v4()))
    }

    fn post_mut(&mut self, id: Uuid) -> Result<&mut Post, StoreError> {
        self.posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound { kind: "post", id })
    }
}

/// Newest first; undated posts sink to the bottom.
fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by_key(|p| (Reverse(p.published_at), Reverse(p.created_at)));
}

/// A [`Store`] persisted as a single JSON document.
#[derive(Debug)]
pub struct JsonStore {
    path: Option<PathBuf>,
    state: Mutex<Snapshot>,
}

impl JsonStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(Snapshot::default()),
        }
    }

    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the parent directory is not writable or the existing file
    /// is not a valid store document.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_writable_dir(parent).await?;
        }

        let snapshot = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };
        info!(
            posts = snapshot.posts.len(),
            categories = snapshot.categories.len(),
            users = snapshot.users.len(),
            "Opened store"
        );
        Ok(Self {
            path: Some(path),
            state: Mutex::new(snapshot),
        })
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "Persisted store");
        Ok(())
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn find_user_by_role(&self, role: Role) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.role == role).cloned())
    }

    /// Returns the existing user when the email is taken, or when an admin
    /// is requested and one already exists.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.lock().await;
        let wants_admin = user.role == Role::Admin;
        if let Some(existing) = state
            .users
            .iter()
            .find(|u| u.email == user.email || (wants_admin && u.role == Role::Admin))
        {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        if let Err(e) = self.persist(&state).await {
            state.users.pop();
            return Err(e);
        }
        Ok(user)
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn create_category(&self, category: NewCategory) -> Result<CategoryRecord, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.categories.iter().find(|c| c.slug == category.slug) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let record = CategoryRecord {
            id: Uuid::new_v4(),
            name: category.name,
            slug: category.slug,
            description: category.description,
            color: category.color,
            created_at: now,
            updated_at: now,
        };
        state.categories.push(record.clone());
        if let Err(e) = self.persist(&state).await {
            state.categories.pop();
            return Err(e);
        }
        Ok(record)
    }

    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, StoreError> {
        let state = self.state.lock().await;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_duplicate(
        &self,
        title: &str,
        source_url: Option<&str>,
    ) -> Result<Option<Post>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .find(|p| {
                p.title == title
                    || source_url.is_some_and(|url| p.source_url.as_deref() == Some(url))
            })
            .cloned())
    }

    async fn create_post(&self, draft: PostDraft) -> Result<Post, StoreError> {
        let mut state = self.state.lock().await;

        let clash = state.posts.iter().any(|p| {
            p.title == draft.title
                || (draft.source_url.as_deref().is_some_and(|u| !u.is_empty())
                    && p.source_url == draft.source_url)
        });
        if clash {
            return Err(StoreError::Duplicate(draft.title));
        }

        let now = Utc::now();
        let slug = state.unique_slug(&draft.slug);
        let published_at = if draft.published {
            Some(draft.published_at.unwrap_or(now))
        } else {
            None
        };
        let post = Post {
            id: Uuid::new_v4(),
            title: draft.title,
            slug,
            content: draft.content,
            excerpt: draft.excerpt,
            cover_image: draft.cover_image,
            published: draft.published,
            featured: draft.featured,
            sponsored: draft.sponsored,
            author_id: draft.author_id,
            category_id: draft.category_id,
            tags: draft.tags,
            keywords: draft.keywords,
            views: 0,
            read_time: draft.read_time.max(1),
            created_at: now,
            updated_at: now,
            published_at,
            source_url: draft.source_url,
            source_name: draft.source_name,
        };
        state.posts.push(post.clone());
        if let Err(e) = self.persist(&state).await {
            state.posts.pop();
            return Err(e);
        }
        Ok(post)
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.posts.iter().find(|p| p.slug == slug).cloned())
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, StoreError> {
        let state = self.state.lock().await;
        let category_id = match &query.category_slug {
            Some(slug) => match state.categories.iter().find(|c| &c.slug == slug) {
                Some(c) => Some(c.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|p| !query.published_only || p.published)
            .filter(|p| category_id.is_none() || p.category_id == category_id)
            .cloned()
            .collect();
        sort_newest_first(&mut posts);
        if let Some(limit) = query.limit {
            posts.truncate(limit);
        }
        Ok(posts)
    }

    async fn sourced_posts_newest_first(&self) -> Result<Vec<Post>, StoreError> {
        let state = self.state.lock().await;
        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|p| p.is_ingested())
            .cloned()
            .collect();
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    async fn posts_needing_content(&self, limit: usize) -> Result<Vec<Post>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .filter(|p| p.is_ingested() && is_placeholder(&p.content))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: String,
        read_time: u32,
    ) -> Result<Post, StoreError> {
        let mut state = self.state.lock().await;
        let post = state.post_mut(id)?;
        let previous = post.clone();
        post.content = content;
        post.read_time = read_time.max(1);
        post.updated_at = Utc::now();
        let updated = post.clone();
        if let Err(e) = self.persist(&state).await {
            *state.post_mut(id)? = previous;
            return Err(e);
        }
        Ok(updated)
    }

    async fn increment_views(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let post = state.post_mut(id)?;
        post.views = post.views.saturating_add(1);
        let views = post.views;
        if let Err(e) = self.persist(&state).await {
            state.post_mut(id)?.views = views - 1;
            return Err(e);
        }
        Ok(views)
    }

    async fn delete_posts(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let doomed: HashSet<Uuid> = ids.iter().copied().collect();
        if !state.posts.iter().any(|p| doomed.contains(&p.id)) {
            return Ok(0);
        }
        let before = state.posts.clone();
        state.posts.retain(|p| !doomed.contains(&p.id));
        let deleted = before.len() - state.posts.len();
        if let Err(e) = self.persist(&state).await {
            state.posts = before;
            return Err(e);
        }
        Ok(deleted)
    }
}
