//! User handlers. Each call is forwarded to user-service over gRPC.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};

use common::{AppResult, ValidatedJson};
use domain::{
    CreateUserRequest, ListUsersParams, ListUsersResponse, UpdateUserRequest, User,
    UserIdResponse,
};

use crate::extractors::ClientAddr;
use crate::state::AppState;

/// Create user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserIdResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ClientAddr(caller): ClientAddr,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserIdResponse>)> {
    let id = state
        .user_client
        .create_user(payload.name, payload.email, &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(UserIdResponse { id })))
}

/// Search users by name or email
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(ListUsersParams),
    responses(
        (status = 200, description = "One page of matching users", body = ListUsersResponse),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    ClientAddr(caller): ClientAddr,
    Query(params): Query<ListUsersParams>,
) -> AppResult<Json<ListUsersResponse>> {
    let (users, pagination) = state.user_client.list_users(params, &caller).await?;
    Ok(Json(ListUsersResponse { users, pagination }))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 400, description = "Invalid user id"),
        (status = 404, description = "User not found"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    ClientAddr(caller): ClientAddr,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    let user = state.user_client.get_user(id, &caller).await?;
    Ok(Json(user))
}

/// Update name and/or email
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserIdResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    ClientAddr(caller): ClientAddr,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> AppResult<Json<UserIdResponse>> {
    let id = state
        .user_client
        .update_user(id, payload.name, payload.email, &caller)
        .await?;
    Ok(Json(UserIdResponse { id }))
}

/// Permanently delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted", body = UserIdResponse),
        (status = 404, description = "User not found"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    ClientAddr(caller): ClientAddr,
    Path(id): Path<i64>,
) -> AppResult<Json<UserIdResponse>> {
    let id = state.user_client.delete_user(id, &caller).await?;
    Ok(Json(UserIdResponse { id }))
}
