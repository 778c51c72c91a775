//! HTTP surface for the admin UI and the public read paths.
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/api/news/fetch` | GET | preview a category without storing |
//! | `/api/news/fetch` | POST | ingest a category (title-only dedupe) |
//! | `/api/news/scheduler` | GET | list the scheduler actions |
//! | `/api/news/scheduler` | POST | `start`, `stop` or `fetch` |
//! | `/api/news/update-content` | POST | run the content backfill |
//! | `/api/categories` | GET | category records |
//! | `/api/posts` | GET | published posts, newest first (cached) |
//! | `/api/posts/{slug}` | GET | one post; bumps its view counter |
//!
//! Failures come back as `{"success": false, "error": "<message>"}` with the
//! underlying error message unchanged. Malformed JSON bodies and query
//! strings use the same shape with axum's rejection status.

use crate::cache::TtlCache;
use crate::models::{Category, Post};
use crate::pipeline::{DedupeMode, Ingestor};
use crate::scheduler::Scheduler;
use crate::store::{PostQuery, Store};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const DEFAULT_LIMIT: u32 = 10;
const DEFAULT_POSTS_LIMIT: usize = 20;
const MAX_POSTS_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn Store>,
    pub posts_cache: Arc<TtlCache<PostQuery, Vec<Post>>>,
}

impl AppState {
    pub fn new(ingestor: Arc<Ingestor>, scheduler: Arc<Scheduler>) -> Self {
        let store = Arc::clone(ingestor.store());
        Self {
            ingestor,
            scheduler,
            store,
            posts_cache: Arc::new(TtlCache::default()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/news/fetch", get(preview_news).post(fetch_news))
        .route(
            "/api/news/scheduler",
            get(scheduler_actions).post(control_scheduler),
        )
        .route("/api/news/update-content", post(update_content))
        .route("/api/categories", get(list_categories))
        .route("/api/posts", get(list_posts))
        .route("/api/posts/{slug}", get(get_post))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({"success": false, "error": message.into()})),
    )
        .into_response()
}

/// Unwrap an extractor result, turning a rejection into a [`failure`].
macro_rules! extract_or_fail {
    ($result:expr) => {
        match $result {
            Ok(value) => value.0,
            Err(rejection) => {
                warn!(status = %rejection.status(), error = %rejection.body_text(), "Rejected request");
                return failure(rejection.status(), rejection.body_text());
            }
        }
    };
}

fn internal(e: impl std::fmt::Display) -> Response {
    failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// --- Request bodies ---

#[derive(Debug, Default, Deserialize)]
pub struct FetchParams {
    category: Option<String>,
    limit: Option<u32>,
}

impl FetchParams {
    fn category(&self) -> Category {
        self.category.as_deref().map(Category::parse).unwrap_or_default()
    }

    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SchedulerRequest {
    #[serde(default)]
    action: String,
    #[serde(flatten)]
    params: FetchParams,
}

#[derive(Debug, Deserialize)]
pub struct PostsParams {
    category: Option<String>,
    limit: Option<usize>,
}

// --- Pipeline handlers ---

async fn preview_news(
    State(state): State<AppState>,
    params: Result<Query<FetchParams>, QueryRejection>,
) -> Response {
    let params = extract_or_fail!(params);
    match state.ingestor.preview(params.category(), params.limit()).await {
        Ok(preview) => Json(json!({
            "success": true,
            "articles": preview.articles,
            "totalResults": preview.total_results,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Preview failed");
            internal(e)
        }
    }
}

async fn fetch_news(
    State(state): State<AppState>,
    params: Result<Json<FetchParams>, JsonRejection>,
) -> Response {
    let params = extract_or_fail!(params);
    let result = state
        .ingestor
        .ingest(params.category(), params.limit(), DedupeMode::Title)
        .await;
    state.posts_cache.clear();

    match result {
        Ok(report) => Json(json!({
            "success": true,
            "message": format!("Successfully fetched and saved {} articles", report.saved_count()),
            "savedPosts": report.saved_posts,
            "errors": report.errors,
            "totalFetched": report.total_fetched,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Fetch failed");
            internal(e)
        }
    }
}

async fn scheduler_actions() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "News scheduler API is running",
        "endpoints": {
            "start": r#"POST /api/news/scheduler with { "action": "start" }"#,
            "stop": r#"POST /api/news/scheduler with { "action": "stop" }"#,
            "fetch": r#"POST /api/news/scheduler with { "action": "fetch", "category": "tech", "limit": 10 }"#,
        }
    }))
}

async fn control_scheduler(
    State(state): State<AppState>,
    request: Result<Json<SchedulerRequest>, JsonRejection>,
) -> Response {
    let request = extract_or_fail!(request);
    match request.action.as_str() {
        "start" => {
            let message = if state.scheduler.start() {
                "News scheduler started successfully"
            } else {
                "News scheduler is already running"
            };
            Json(json!({"success": true, "message": message})).into_response()
        }
        "stop" => {
            let message = if state.scheduler.stop().await {
                "News scheduler stopped successfully"
            } else {
                "News scheduler is not running"
            };
            Json(json!({"success": true, "message": message})).into_response()
        }
        "fetch" => {
            let params = &request.params;
            let result = state
                .scheduler
                .fetch_news_now(params.category(), params.limit())
                .await;
            state.posts_cache.clear();
            match result {
                Ok(report) => Json(json!({
                    "success": true,
                    "savedCount": report.saved_count(),
                    "savedPosts": report.saved_posts,
                    "totalFetched": report.total_fetched,
                    "errors": report.errors,
                }))
                .into_response(),
                Err(e) => {
                    error!(error = %e, "Manual fetch failed");
                    internal(e)
                }
            }
        }
        other => {
            warn!(action = other, "Unknown scheduler action");
            failure(
                StatusCode::BAD_REQUEST,
                r#"Invalid action. Use "start", "stop", or "fetch""#,
            )
        }
    }
}

async fn update_content(State(state): State<AppState>) -> Response {
    let limit = state.ingestor.config().backfill_limit;
    match state.ingestor.backfill(limit).await {
        Ok(report) => {
            state.posts_cache.clear();
            Json(json!({
                "success": true,
                "message": format!("Updated {} articles", report.updated_articles.len()),
                "updatedArticles": report.updated_articles,
            }))
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "Backfill failed");
            internal(e)
        }
    }
}

// --- Read paths ---

async fn list_categories(State(state): State<AppState>) -> Response {
    match state.store.list_categories().await {
        Ok(categories) => Json(json!({"categories": categories})).into_response(),
        Err(e) => internal(e),
    }
}

async fn list_posts(
    State(state): State<AppState>,
    params: Result<Query<PostsParams>, QueryRejection>,
) -> Response {
    let params = extract_or_fail!(params);
    let query = PostQuery {
        category_slug: params.category.map(|c| c.trim().to_ascii_lowercase()),
        published_only: true,
        limit: Some(
            params
                .limit
                .unwrap_or(DEFAULT_POSTS_LIMIT)
                .clamp(1, MAX_POSTS_LIMIT),
        ),
    };

    if let Some(posts) = state.posts_cache.get(&query) {
        return Json(json!({"posts": posts})).into_response();
    }
    match state.store.list_posts(&query).await {
        Ok(posts) => {
            state.posts_cache.insert(query, posts.clone());
            Json(json!({"posts": posts})).into_response()
        }
        Err(e) => internal(e),
    }
}

async fn get_post(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    let mut post = match state.store.find_post_by_slug(&slug).await {
        Ok(Some(post)) => post,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "Post not found"),
        Err(e) => return internal(e),
    };
    match state.store.increment_views(post.id).await {
        Ok(views) => post.views = views,
        Err(e) => warn!(%slug, error = %e, "Failed to count view"),
    }
    Json(json!({"post": post})).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{article_json, ingestor_for, mount_articles};
    use crate::store::JsonStore;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use serde_json::Value;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_for(server: &MockServer) -> (Router, AppState) {
        let store: Arc<dyn Store> = Arc::new(JsonStore::in_memory());
        let ingestor = Arc::new(ingestor_for(server, store));
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&ingestor)).unwrap());
        let state = AppState::new(ingestor, scheduler);
        (router(state.clone()), state)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_scheduler_actions_listing() {
        let server = MockServer::start().await;
        let (app, _) = app_for(&server);
        let (status, body) = send(&app, get_req("/api/news/scheduler")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["endpoints"]["fetch"].as_str().unwrap().contains("fetch"));
    }

    #[tokio::test]
    async fn test_invalid_scheduler_action() {
        let server = MockServer::start().await;
        let (app, _) = app_for(&server);
        let (status, body) = send(
            &app,
            post_json("/api/news/scheduler", json!({"action": "restart"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"],
            r#"Invalid action. Use "start", "stop", or "fetch""#
        );
    }

    #[tokio::test]
    async fn test_malformed_json_body_uses_error_shape() {
        let server = MockServer::start().await;
        let (app, state) = app_for(&server);

        for uri in ["/api/news/fetch", "/api/news/scheduler"] {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"category\": "))
                .unwrap();
            let (status, body) = send(&app, request).await;
            assert!(status.is_client_error(), "{uri} returned {status}");
            assert_eq!(body["success"], false);
            assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        }

        let missing_type = Request::builder()
            .method("POST")
            .uri("/api/news/fetch")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(&app, missing_type).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["success"], false);
        assert!(state.store.list_posts(&PostQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_query_string_uses_error_shape() {
        let server = MockServer::start().await;
        let (app, _) = app_for(&server);

        for uri in ["/api/news/fetch?limit=abc", "/api/posts?limit=-1"] {
            let (status, body) = send(&app, get_req(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["success"], false);
            assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        }
    }

    #[tokio::test]
    async fn test_scheduler_start_and_stop() {
        let server = MockServer::start().await;
        let (app, state) = app_for(&server);

        let (status, body) =
            send(&app, post_json("/api/news/scheduler", json!({"action": "start"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "News scheduler started successfully");
        assert!(state.scheduler.is_running());

        let (_, body) =
            send(&app, post_json("/api/news/scheduler", json!({"action": "stop"}))).await;
        assert_eq!(body["message"], "News scheduler stopped successfully");
        assert!(!state.scheduler.is_running());
    }

    #[tokio::test]
    async fn test_scheduler_fetch_action() {
        let server = MockServer::start().await;
        mount_articles(
            &server,
            "/top-headlines",
            vec![article_json("Quarterly earnings", "https://example.com/q", Some("Body"))],
        )
        .await;
        let (app, _) = app_for(&server);

        let (status, body) = send(
            &app,
            post_json(
                "/api/news/scheduler",
                json!({"action": "fetch", "category": "business", "limit": 1}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["savedCount"], 1);
        assert_eq!(body["totalFetched"], 1);
        assert_eq!(body["savedPosts"][0]["slug"], "quarterly-earnings");
    }

    #[tokio::test]
    async fn test_preview_endpoint() {
        let server = MockServer::start().await;
        mount_articles(
            &server,
            "/everything",
            vec![article_json("Preview only", "https://example.com/p", None)],
        )
        .await;
        let (app, state) = app_for(&server);

        let (status, body) = send(&app, get_req("/api/news/fetch?category=nonsense&limit=3")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["totalResults"], 1);
        assert_eq!(body["articles"][0]["source"], "Example Wire");
        assert!(state.store.list_posts(&PostQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_endpoint_and_cache_invalidation() {
        let server = MockServer::start().await;
        mount_articles(
            &server,
            "/everything",
            vec![
                article_json("Chip news", "https://example.com/c", Some("Body")),
                article_json("Chip news", "https://example.com/d", Some("Body")),
            ],
        )
        .await;
        let (app, _) = app_for(&server);

        let (_, body) = send(&app, get_req("/api/posts?category=tech")).await;
        assert_eq!(body["posts"].as_array().unwrap().len(), 0);

        let (status, body) = send(
            &app,
            post_json("/api/news/fetch", json!({"category": "tech", "limit": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["totalFetched"], 2);
        assert_eq!(body["savedPosts"].as_array().unwrap().len(), 1);
        assert_eq!(body["message"], "Successfully fetched and saved 1 articles");

        let (_, body) = send(&app, get_req("/api/posts?category=tech")).await;
        assert_eq!(body["posts"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, get_req("/api/categories")).await;
        assert_eq!(body["categories"][0]["slug"], "tech");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/everything"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "status": "error",
                "code": "rateLimited",
                "message": "You have made too many requests recently."
            })))
            .mount(&server)
            .await;
        let (app, _) = app_for(&server);

        let (status, body) = send(&app, get_req("/api/news/fetch")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("too many requests"));
    }

    #[tokio::test]
    async fn test_post_detail_counts_views() {
        let server = MockServer::start().await;
        mount_articles(
            &server,
            "/everything",
            vec![article_json("Read me", "https://example.com/r", Some("Body"))],
        )
        .await;
        let (app, state) = app_for(&server);
        state
            .ingestor
            .ingest(Category::Tech, 1, DedupeMode::default())
            .await
            .unwrap();

        let (status, body) = send(&app, get_req("/api/posts/read-me")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["views"], 1);
        let (_, body) = send(&app, get_req("/api/posts/read-me")).await;
        assert_eq!(body["post"]["views"], 2);

        let (status, body) = send(&app, get_req("/api/posts/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Post not found");
    }

    #[tokio::test]
    async fn test_update_content_with_nothing_pending() {
        let server = MockServer::start().await;
        let (app, _) = app_for(&server);
        let (status, body) = send(&app, post_json("/api/news/update-content", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Updated 0 articles");
        assert!(body["updatedArticles"].as_array().unwrap().is_empty());
    }
}
