use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::invoices::{CreateInvoiceRequest, InvoiceFilter, UpdateInvoiceRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InvoiceListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub customer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub payment_status: Option<String>,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct LastInvoiceQuery {
    pub vehicle_id: Uuid,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<InvoiceListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let filter = InvoiceFilter {
        customer_id: query.customer_id,
        vehicle_id: query.vehicle_id,
        payment_status: query.payment_status,
    };
    let invoices = state
        .services
        .invoices
        .list_invoices(query.page, query.per_page, filter)
        .await?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state.services.invoices.get_invoice(id).await?;
    Ok(Json(invoice))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let recorded_by = user.id().ok();
    let invoice = state
        .services
        .invoices
        .create_invoice(request, recorded_by)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let recorded_by = user.id().ok();
    let invoice = state
        .services
        .invoices
        .update_invoice(id, request, recorded_by)
        .await?;
    Ok(Json(invoice))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.invoices.delete_invoice(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Most recent invoice for a vehicle; 404 when the vehicle has none.
pub async fn last_invoice(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<LastInvoiceQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state
        .services
        .invoices
        .last_invoice_for_vehicle(query.vehicle_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("No invoices for vehicle {}", query.vehicle_id))
        })?;
    Ok(Json(invoice))
}

pub async fn print_invoice(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let payload = state.services.invoices.print_invoice(id).await?;
    Ok(Json(payload))
}
