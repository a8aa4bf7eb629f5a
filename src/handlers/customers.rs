use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::common::{PaginationParams, SearchParams};
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::customers::CustomerInput;
use crate::AppState;

pub async fn list_customers(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let customers = state
        .services
        .customers
        .list_customers(query.page, query.per_page)
        .await?;
    Ok(Json(customers))
}

pub async fn search_customers(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SearchParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let customers = state.services.customers.search_customers(&query.q).await?;
    Ok(Json(customers))
}

pub async fn get_customer(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state.services.customers.get_customer(id).await?;
    Ok(Json(customer))
}

pub async fn get_customer_vehicles(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let vehicles = state.services.customers.get_customer_vehicles(id).await?;
    Ok(Json(vehicles))
}

pub async fn create_customer(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(input): Json<CustomerInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state.services.customers.create_customer(input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CustomerInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state.services.customers.update_customer(id, input).await?;
    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.customers.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
