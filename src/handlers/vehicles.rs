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
use crate::services::vehicles::VehicleInput;
use crate::AppState;

pub async fn list_vehicles(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let vehicles = state
        .services
        .vehicles
        .list_vehicles(query.page, query.per_page)
        .await?;
    Ok(Json(vehicles))
}

pub async fn get_vehicle(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let vehicle = state.services.vehicles.get_vehicle(id).await?;
    Ok(Json(vehicle))
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(input): Json<VehicleInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let vehicle = state.services.vehicles.create_vehicle(input).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<VehicleInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let vehicle = state.services.vehicles.update_vehicle(id, input).await?;
    Ok(Json(vehicle))
}

pub async fn delete_vehicle(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.vehicles.delete_vehicle(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
