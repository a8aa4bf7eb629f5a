use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::users::{CreateUserRequest, UpdateUserRequest};
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let users = state
        .services
        .users
        .list_users(query.page, query.per_page)
        .await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let account = state.services.users.get_user(id).await?;
    Ok(Json(account))
}

pub async fn create_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let account = state.services.users.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn update_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let account = state.services.users.update_user(id, request).await?;
    Ok(Json(account))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.users.deactivate_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
