//! Repository layer for data access.

mod cached_user_repository;
pub mod entities;
mod user_repository;

pub use cached_user_repository::{user_cache_key, CachedUserRepository, CACHE_PREFIX_USER};
pub use user_repository::{UserRepository, UserStore};

#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
