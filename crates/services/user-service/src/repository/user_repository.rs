//! Durable user repository backed by SeaORM.

use async_trait::async_trait;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ActiveValue::{Set, Unchanged},
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, SqlErr,
};

use super::entities::user::{self, ActiveModel, Entity as UserEntity};
use common::{AppError, AppResult, OptionExt};
use domain::{sanitize_search_query, search::LIKE_ESCAPE, ListQuery, NewUser, User};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user and return the assigned id
    async fn create(&self, new_user: NewUser) -> AppResult<i64>;

    /// Find user by ID, `NotFound` if absent
    async fn get_by_id(&self, id: i64) -> AppResult<User>;

    /// Find user by ID from the durable store, skipping any cache.
    /// Used to build the row for a read-modify-write.
    async fn get_for_update(&self, id: i64) -> AppResult<User> {
        self.get_by_id(id).await
    }

    /// Find user by email address
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Persist name and email of an existing user
    async fn update(&self, user: &User) -> AppResult<i64>;

    /// Permanently delete user by ID
    async fn delete(&self, id: i64) -> AppResult<i64>;

    /// One page of users matching the search, plus the total match count
    async fn list(&self, query: &ListQuery) -> AppResult<(Vec<User>, u64)>;
}

/// Concrete implementation of UserRepository
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Unique email violations surface as `Conflict`.
fn map_write_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::conflict("Email"),
        _ => AppError::from(err),
    }
}

/// Case-insensitive substring match on name or email.
fn search_condition(term: &str) -> Condition {
    let pattern = format!("%{}%", term.to_lowercase());
    let matches = |column: user::Column| {
        Expr::expr(Func::lower(Expr::col(column)))
            .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE))
    };

    Condition::any()
        .add(matches(user::Column::Name))
        .add(matches(user::Column::Email))
}

#[async_trait]
impl UserRepository for UserStore {
    async fn create(&self, new_user: NewUser) -> AppResult<i64> {
        let now = chrono::Utc::now();
        let active_model = ActiveModel {
            name: Set(new_user.name),
            email: Set(new_user.email),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(map_write_error)?;
        Ok(model.id)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(User::from)
            .ok_or_not_found()
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(User::from))
    }

    async fn update(&self, user: &User) -> AppResult<i64> {
        let active = ActiveModel {
            id: Unchanged(user.id),
            name: Set(user.name.clone()),
            email: Set(user.email.clone()),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        match active.update(&self.db).await {
            Ok(model) => Ok(model.id),
            Err(DbErr::RecordNotUpdated) => Err(AppError::NotFound),
            Err(e) => Err(map_write_error(e)),
        }
    }

    async fn delete(&self, id: i64) -> AppResult<i64> {
        let result = UserEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(AppError::from)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(id)
    }

    async fn list(&self, query: &ListQuery) -> AppResult<(Vec<User>, u64)> {
        let search = match query.search.as_deref() {
            Some(raw) => sanitize_search_query(raw)?,
            None => None,
        };

        let mut select = UserEntity::find();
        if let Some(term) = search {
            select = select.filter(search_condition(&term));
        }

        let paginator = select
            .order_by_asc(user::Column::Id)
            .paginate(&self.db, query.page.limit());
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(query.page.page() - 1).await?;

        Ok((models.into_iter().map(User::from).collect(), total))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, QueryTrait};

    use super::*;

    #[test]
    fn search_is_case_insensitive_and_escaped() {
        let sql = UserEntity::find()
            .filter(search_condition(r"Jo_e%"))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#"LOWER("name") LIKE"#), "{sql}");
        assert!(sql.contains(r#"LOWER("email") LIKE"#), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert!(sql.contains("ESCAPE"), "{sql}");
        assert!(sql.contains("jo") && !sql.contains("Jo"), "{sql}");
    }
}
