//! Infrastructure layer - database and cache stores.

pub mod cache;
mod db;
pub mod migrations;

pub use cache::{CacheStore, LimitScript, MemoryCache, RedisCache, DENIED};
pub use db::Database;
pub use migrations::Migrator;
