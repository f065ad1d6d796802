//! Integration tests for the direct REST API.
//!
//! The full stack runs in-process: router, rate limiter, service and the
//! cache-aside repository over an in-memory durable store and cache.

use std::sync::{
    atomic::{AtomicI64, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{AppError, AppResult, RateLimitAlgorithm, RateLimitConfig};
use domain::{ListQuery, NewUser, User};
use user_service_lib::infra::MemoryCache;
use user_service_lib::rate_limit::RateLimiter;
use user_service_lib::repository::{CachedUserRepository, UserRepository};
use user_service_lib::rest::{create_router, RestState};
use user_service_lib::service::UserManager;

// =============================================================================
// In-memory durable store
// =============================================================================

#[derive(Default)]
struct InMemoryUsers {
    users: Mutex<Vec<User>>,
    next_id: AtomicI64,
    reads_by_id: AtomicUsize,
}

impl InMemoryUsers {
    fn reads_by_id(&self) -> usize {
        self.reads_by_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn create(&self, user: NewUser) -> AppResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        self.users.lock().unwrap().push(User {
            id,
            name: user.name,
            email: user.email,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.reads_by_id.fetch_add(1, Ordering::SeqCst);
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update(&self, user: &User) -> AppResult<i64> {
        let mut users = self.users.lock().unwrap();
        let stored = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(AppError::NotFound)?;
        *stored = User {
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(user.id)
    }

    async fn delete(&self, id: i64) -> AppResult<i64> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(id)
    }

    async fn list(&self, query: &ListQuery) -> AppResult<(Vec<User>, u64)> {
        let users = self.users.lock().unwrap();
        let term = query.search.as_deref().map(str::to_lowercase);
        let matching: Vec<User> = users
            .iter()
            .filter(|u| match &term {
                Some(term) => {
                    u.name.to_lowercase().contains(term) || u.email.to_lowercase().contains(term)
                }
                None => true,
            })
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit() as usize)
            .collect();
        Ok((page, total))
    }
}

// =============================================================================
// Helpers
// =============================================================================

struct TestApp {
    router: Router,
    store: Arc<InMemoryUsers>,
}

fn app_with_limits(rate_limit: RateLimitConfig) -> TestApp {
    let store = Arc::new(InMemoryUsers::default());
    let cache = Arc::new(MemoryCache::new());
    let repo = Arc::new(CachedUserRepository::new(
        store.clone(),
        cache.clone(),
        Duration::from_secs(300),
    ));
    let service = Arc::new(UserManager::new(repo));
    let limiter = Arc::new(RateLimiter::new(cache.clone(), rate_limit));

    TestApp {
        router: create_router(RestState::new(service, limiter, cache)),
        store,
    }
}

fn app() -> TestApp {
    app_with_limits(RateLimitConfig {
        enabled: false,
        ..RateLimitConfig::default()
    })
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create(router: &Router, name: &str, email: &str) -> i64 {
    let (status, body) = send(
        router,
        "POST",
        "/users",
        Some(json!({ "name": name, "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

// =============================================================================
// CRUD
// =============================================================================

#[tokio::test]
async fn create_then_get_normalizes_input() {
    let app = app();
    let id = create(&app.router, "  Ada Lovelace ", "ADA@Example.com").await;

    let (status, body) = send(&app.router, "GET", &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ada Lovelace");
    assert_eq!(body["email"], "ada@example.com");
}

#[tokio::test]
async fn repeated_reads_are_served_from_cache() {
    let app = app();
    let id = create(&app.router, "Grace Hopper", "grace@example.com").await;

    for _ in 0..5 {
        let (status, _) = send(&app.router, "GET", &format!("/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(app.store.reads_by_id(), 1);
}

#[tokio::test]
async fn create_rejects_invalid_and_duplicate_input() {
    let app = app();
    create(&app.router, "Alan Turing", "alan@example.com").await;

    let (status, body) = send(
        &app.router,
        "POST",
        "/users",
        Some(json!({ "name": "Al", "email": "al@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app.router,
        "POST",
        "/users",
        Some(json!({ "name": "Another Alan", "email": "Alan@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn update_is_visible_on_next_read() {
    let app = app();
    let id = create(&app.router, "Katherine", "katherine@example.com").await;

    // warm the cache
    send(&app.router, "GET", &format!("/users/{id}"), None).await;

    let (status, body) = send(
        &app.router,
        "PUT",
        &format!("/users/{id}"),
        Some(json!({ "name": "Katherine Johnson" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (_, body) = send(&app.router, "GET", &format!("/users/{id}"), None).await;
    assert_eq!(body["name"], "Katherine Johnson");
    assert_eq!(body["email"], "katherine@example.com");
}

#[tokio::test]
async fn update_without_fields_is_rejected() {
    let app = app();
    let id = create(&app.router, "Margaret", "margaret@example.com").await;

    let (status, _) = send(&app.router, "PUT", &format!("/users/{id}"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleted_user_is_gone() {
    let app = app();
    let id = create(&app.router, "Barbara", "barbara@example.com").await;
    send(&app.router, "GET", &format!("/users/{id}"), None).await;

    let (status, body) = send(&app.router, "DELETE", &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, body) = send(&app.router, "GET", &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app.router, "DELETE", &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_positive_id_is_a_validation_error() {
    let app = app();
    let (status, _) = send(&app.router, "GET", "/users/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_searches_and_paginates() {
    let app = app();
    for i in 1..=12 {
        create(&app.router, &format!("Searchable {i}"), &format!("s{i}@example.com")).await;
    }
    create(&app.router, "Someone Else", "other@example.org").await;

    let (status, body) = send(&app.router, "GET", "/users?query=SEARCH&page=2&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 5);
    assert_eq!(
        body["pagination"],
        json!({ "page": 2, "limit": 5, "total": 12, "total_pages": 3 })
    );

    let (_, body) = send(&app.router, "GET", "/users", None).await;
    assert_eq!(body["pagination"]["limit"], 10);
    assert_eq!(body["pagination"]["total"], 13);
}

#[tokio::test]
async fn out_of_range_page_returns_empty_page() {
    let app = app();
    create(&app.router, "Ada Lovelace", "ada@example.com").await;

    let (status, body) = send(&app.router, "GET", "/users?page=18446744073709551615", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["users"].as_array().unwrap().is_empty());
    assert_eq!(body["pagination"]["page"], i64::MAX as u64 / 10);
    assert_eq!(body["pagination"]["total"], 1);
}

// =============================================================================
// Rate limiting
// =============================================================================

fn fixed_window(rate_per_second: u64, window_seconds: u64) -> RateLimitConfig {
    RateLimitConfig {
        enabled: true,
        algorithm: RateLimitAlgorithm::FixedWindow,
        rate_per_second,
        window_seconds,
        burst: rate_per_second,
    }
}

fn list_request(client: &str) -> Request<Body> {
    Request::get("/users")
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn requests_over_the_limit_get_429() {
    let app = app_with_limits(fixed_window(1, 3));

    for remaining in ["2", "1", "0"] {
        let response = app
            .router
            .clone()
            .oneshot(list_request("203.0.113.7"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "3");
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let response = app
        .router
        .clone()
        .oneshot(list_request("203.0.113.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "3");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let (status, body) = send(&app.router, "GET", "/users", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RESOURCE_EXHAUSTED");
}

#[tokio::test]
async fn clients_and_routes_have_separate_budgets() {
    let app = app_with_limits(fixed_window(1, 2));
    for _ in 0..2 {
        let (status, _) = send(&app.router, "GET", "/users", None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(&app.router, "GET", "/users", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // same client, different route template
    let (status, _) = send(&app.router, "GET", "/users/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // different client, same route
    let response = app
        .router
        .clone()
        .oneshot(list_request("198.51.100.2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_not_throttled() {
    let app = app_with_limits(fixed_window(1, 1));
    for _ in 0..5 {
        let (status, body) = send(&app.router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
