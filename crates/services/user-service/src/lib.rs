//! User Service Library
//!
//! This crate provides user management over gRPC and a direct REST API,
//! backed by Postgres with a read-through cache and per-client rate limiting.
//! It can be run as a standalone service or embedded in the combined binary.

pub mod config;
pub mod grpc;
pub mod infra;
pub mod rate_limit;
pub mod repository;
pub mod rest;
pub mod service;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use tonic::transport::Server;
use tracing::info;

use common::{CacheBackend, CacheConfig};

use crate::config::UserServiceConfig;
use crate::grpc::{RateLimitLayer, UserGrpcService};
use crate::infra::{CacheStore, Database, MemoryCache, RedisCache};
use crate::rate_limit::RateLimiter;
use crate::repository::{CachedUserRepository, UserStore};
use crate::rest::{create_router, RestState};
use crate::service::{UserManager, UserService};

/// Run the user service as an embedded component (for combined binary).
pub async fn run_embedded(
    host: &str,
    port: u16,
    http_port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = UserServiceConfig::from_env();
    run_server_with_config(host, port, http_port, config).await
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(action: MigrateAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = UserServiceConfig::from_env();
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Open the cache store selected by `CACHE_BACKEND`.
pub async fn connect_cache(
    config: &CacheConfig,
) -> Result<Arc<dyn CacheStore>, redis::RedisError> {
    let cache: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::Redis => Arc::new(RedisCache::connect(config).await?),
        CacheBackend::Memory => {
            info!("Using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };
    Ok(cache)
}

/// Run the gRPC and REST servers with the given configuration.
async fn run_server_with_config(
    host: &str,
    port: u16,
    http_port: u16,
    config: UserServiceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    // Storage
    let db = Database::connect(&config.database).await?;
    let cache = connect_cache(&config.cache).await?;

    // Repository stack and service
    let store = Arc::new(UserStore::new(db.get_connection()));
    let repo = Arc::new(CachedUserRepository::new(
        store,
        cache.clone(),
        config.cache.ttl(),
    ));
    let user_service: Arc<dyn UserService> = Arc::new(UserManager::new(repo));

    let limiter = Arc::new(RateLimiter::new(cache.clone(), config.rate_limit.clone()));
    info!(
        enabled = config.rate_limit.enabled,
        algorithm = %config.rate_limit.algorithm,
        "Rate limiter configured"
    );

    // Build addresses
    let grpc_addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let http_addr: SocketAddr = format!("{}:{}", host, http_port).parse()?;

    info!("User service gRPC listening on {}", grpc_addr);
    let grpc = Server::builder()
        .layer(RateLimitLayer::new(limiter.clone()))
        .add_service(proto::UserServiceServer::new(UserGrpcService::new(
            user_service.clone(),
        )))
        .serve(grpc_addr);

    info!("User service REST listening on {}", http_addr);
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let app = create_router(RestState::new(user_service, limiter, cache));
    let rest = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    // Errors stay Send so the whole future can be spawned
    type BoxError = Box<dyn std::error::Error + Send + Sync>;
    tokio::try_join!(
        async { grpc.await.map_err(BoxError::from) },
        async { rest.await.map_err(BoxError::from) },
    )
        .map(|_| ())
        .map_err(|e| -> Box<dyn std::error::Error> { e })
}
