//! User handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use common::{AppResult, ValidatedJson};
use domain::{
    CreateUserRequest, ListUsersParams, ListUsersResponse, UpdateUserRequest, User,
    UserIdResponse,
};

use super::RestState;

pub async fn create_user(
    State(state): State<RestState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserIdResponse>)> {
    let id = state
        .service
        .create_user(payload.name, payload.email)
        .await?;
    Ok((StatusCode::CREATED, Json(UserIdResponse { id })))
}

pub async fn get_user(
    State(state): State<RestState>,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    let user = state.service.get_user(id).await?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<RestState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> AppResult<Json<UserIdResponse>> {
    let id = state
        .service
        .update_user(id, payload.name, payload.email)
        .await?;
    Ok(Json(UserIdResponse { id }))
}

pub async fn delete_user(
    State(state): State<RestState>,
    Path(id): Path<i64>,
) -> AppResult<Json<UserIdResponse>> {
    let id = state.service.delete_user(id).await?;
    Ok(Json(UserIdResponse { id }))
}

pub async fn list_users(
    State(state): State<RestState>,
    Query(params): Query<ListUsersParams>,
) -> AppResult<Json<ListUsersResponse>> {
    let (users, pagination) = state.service.list_users(params.into()).await?;
    Ok(Json(ListUsersResponse { users, pagination }))
}
