//! Direct REST API calling the business logic in-process.

mod handlers;
mod health;
mod middleware;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::infra::CacheStore;
use crate::rate_limit::RateLimiter;
use crate::service::UserService;

pub use middleware::rate_limit_middleware;

/// Shared state of the REST router.
#[derive(Clone)]
pub struct RestState {
    pub service: Arc<dyn UserService>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<dyn CacheStore>,
}

impl RestState {
    pub fn new(
        service: Arc<dyn UserService>,
        limiter: Arc<RateLimiter>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            service,
            limiter,
            cache,
        }
    }
}

/// Build the REST router. User routes are throttled; health is not.
pub fn create_router(state: RestState) -> Router {
    let users = Router::new()
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/users/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(users)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
