//! Stand-ins shared by unit tests.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use redis::{ErrorKind, RedisError};

use common::{AppError, AppResult};
use domain::User;

use crate::infra::{CacheStore, LimitScript};

/// Cache store whose every operation fails as if Redis were unreachable.
#[derive(Default)]
pub struct FailingCache {
    calls: AtomicUsize,
}

impl FailingCache {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> AppResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Cache(RedisError::from((
            ErrorKind::IoError,
            "connection refused",
        ))))
    }
}

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, _key: &str) -> AppResult<Option<Vec<u8>>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> AppResult<()> {
        self.fail()
    }

    async fn delete(&self, _keys: &[String]) -> AppResult<()> {
        self.fail()
    }

    async fn eval(&self, _script: LimitScript, _key: &str, _args: &[i64]) -> AppResult<i64> {
        self.fail()
    }

    async fn ping(&self) -> AppResult<()> {
        self.fail()
    }
}

pub fn sample_user(id: i64) -> User {
    let now = Utc::now();
    User {
        id,
        name: format!("User {id}"),
        email: format!("user{id}@example.com"),
        created_at: now,
        updated_at: now,
    }
}
