use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::common::SearchParams;
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::parts::{CreatePartRequest, UpdatePartRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PartListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    #[serde(default)]
    pub include_inactive: bool,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

pub async fn list_parts(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PartListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let parts = state
        .services
        .parts
        .list_parts(query.page, query.per_page, query.include_inactive)
        .await?;
    Ok(Json(parts))
}

pub async fn search_parts(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SearchParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let parts = state.services.parts.search_parts(&query.q).await?;
    Ok(Json(parts))
}

pub async fn get_part(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let part = state.services.parts.get_part(id).await?;
    Ok(Json(part))
}

pub async fn create_part(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<CreatePartRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let part = state.services.parts.create_part(request).await?;
    Ok((StatusCode::CREATED, Json(part)))
}

pub async fn update_part(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePartRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let part = state.services.parts.update_part(id, request).await?;
    Ok(Json(part))
}

pub async fn deactivate_part(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.parts.deactivate_part(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
