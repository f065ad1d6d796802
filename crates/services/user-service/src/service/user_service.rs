//! User service - Handles user-related business logic.
//!
//! Validates input, enforces email uniqueness and orchestrates repository
//! calls. Transports call into this trait and never touch the repository.

use async_trait::async_trait;
use std::sync::Arc;

use common::{AppError, AppResult};
use domain::{ListQuery, NewUser, Pagination, User, UserChanges};

use crate::repository::UserRepository;

/// User service trait for dependency injection.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Create a user and return its id
    async fn create_user(&self, name: String, email: String) -> AppResult<i64>;

    /// Get user by ID
    async fn get_user(&self, id: i64) -> AppResult<User>;

    /// Change name and/or email; returns the id
    async fn update_user(
        &self,
        id: i64,
        name: Option<String>,
        email: Option<String>,
    ) -> AppResult<i64>;

    /// Permanently delete a user; returns the id
    async fn delete_user(&self, id: i64) -> AppResult<i64>;

    /// Search users by name or email, one page at a time
    async fn list_users(&self, query: ListQuery) -> AppResult<(Vec<User>, Pagination)>;
}

/// Concrete implementation of UserService using repository.
pub struct UserManager {
    repo: Arc<dyn UserRepository>,
}

impl UserManager {
    /// Create new user service instance with repository
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }
}

fn validate_id(id: i64) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::validation("User id must be a positive integer"));
    }
    Ok(())
}

#[async_trait]
impl UserService for UserManager {
    async fn create_user(&self, name: String, email: String) -> AppResult<i64> {
        let new_user = NewUser::new(name, email).validated()?;

        // Check if email already exists
        if self.repo.get_by_email(&new_user.email).await?.is_some() {
            return Err(AppError::conflict("Email"));
        }

        self.repo.create(new_user).await
    }

    async fn get_user(&self, id: i64) -> AppResult<User> {
        validate_id(id)?;
        self.repo.get_by_id(id).await
    }

    async fn update_user(
        &self,
        id: i64,
        name: Option<String>,
        email: Option<String>,
    ) -> AppResult<i64> {
        validate_id(id)?;
        let changes = UserChanges::new(name, email).validated()?;

        if let Some(email) = &changes.email {
            if let Some(existing) = self.repo.get_by_email(email).await? {
                if existing.id != id {
                    return Err(AppError::conflict("Email"));
                }
            }
        }

        let mut user = self.repo.get_for_update(id).await?;
        user.apply(&changes);
        self.repo.update(&user).await
    }

    async fn delete_user(&self, id: i64) -> AppResult<i64> {
        validate_id(id)?;
        self.repo.delete(id).await
    }

    async fn list_users(&self, query: ListQuery) -> AppResult<(Vec<User>, Pagination)> {
        let (users, total) = self.repo.list(&query).await?;
        Ok((users, Pagination::new(query.page, total)))
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::*;

    use super::*;
    use crate::repository::MockUserRepository;
    use crate::test_support::sample_user;

    fn service(repo: MockUserRepository) -> UserManager {
        UserManager::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn create_user_normalizes_and_persists() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .withf(|email| email == "ada@example.com")
            .times(1)
            .returning(|_| Ok(None));
        repo.expect_create()
            .withf(|u| u.name == "Ada Lovelace" && u.email == "ada@example.com")
            .times(1)
            .returning(|_| Ok(7));

        let id = service(repo)
            .create_user(" Ada Lovelace ".into(), "Ada@Example.com".into())
            .await
            .unwrap();
        assert_eq!(id, 7);
    }

    #[tokio::test]
    async fn create_user_rejects_invalid_input_without_storage() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email().never();
        repo.expect_create().never();
        let service = service(repo);

        let err = service
            .create_user("Al".into(), "al@example.com".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .create_user("Alice".into(), "not-an-email".into())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid email format");
    }

    #[tokio::test]
    async fn create_user_conflicts_on_taken_email() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .returning(|_| Ok(Some(sample_user(1))));
        repo.expect_create().never();

        let err = service(repo)
            .create_user("Someone".into(), "user1@example.com".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn get_user_rejects_non_positive_ids() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id().never();
        let service = service(repo);

        for id in [0, -5] {
            assert!(matches!(
                service.get_user(id).await,
                Err(AppError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn get_user_propagates_not_found() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id()
            .with(eq(9))
            .returning(|_| Err(AppError::NotFound));

        assert!(matches!(
            service(repo).get_user(9).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_user_applies_changes() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id().never();
        repo.expect_get_for_update()
            .with(eq(3))
            .times(1)
            .returning(|id| Ok(sample_user(id)));
        repo.expect_update()
            .withf(|u| u.id == 3 && u.name == "New Name" && u.email == "user3@example.com")
            .times(1)
            .returning(|u| Ok(u.id));

        let id = service(repo)
            .update_user(3, Some("New Name".into()), None)
            .await
            .unwrap();
        assert_eq!(id, 3);
    }

    #[tokio::test]
    async fn update_user_allows_keeping_own_email() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .returning(|_| Ok(Some(sample_user(3))));
        repo.expect_get_for_update().returning(|id| Ok(sample_user(id)));
        repo.expect_update().times(1).returning(|u| Ok(u.id));

        let result = service(repo)
            .update_user(3, None, Some("user3@example.com".into()))
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_user_conflicts_on_email_of_another_user() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .returning(|_| Ok(Some(sample_user(4))));
        repo.expect_update().never();

        let err = service(repo)
            .update_user(3, None, Some("user4@example.com".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_user_requires_a_change() {
        let repo = MockUserRepository::new();
        let err = service(repo).update_user(3, None, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_user_returns_id() {
        let mut repo = MockUserRepository::new();
        repo.expect_delete().with(eq(5)).times(1).returning(Ok);

        assert_eq!(service(repo).delete_user(5).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn list_users_builds_pagination() {
        let mut repo = MockUserRepository::new();
        repo.expect_list()
            .withf(|q| q.page.page() == 2 && q.page.limit() == 100 && q.search.as_deref() == Some("ada"))
            .returning(|_| Ok((vec![sample_user(101)], 150)));

        let (users, pagination) = service(repo)
            .list_users(ListQuery::new(Some("ada".into()), Some(2), Some(500)))
            .await
            .unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(
            pagination,
            Pagination {
                page: 2,
                limit: 100,
                total: 150,
                total_pages: 2
            }
        );
    }
}
