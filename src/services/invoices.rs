use crate::{
    db::DbPool,
    entities::customer::{self, Entity as CustomerEntity},
    entities::invoice::{self, ActiveModel as InvoiceActiveModel, Entity as InvoiceEntity},
    entities::invoice_item::{self, Entity as InvoiceItemEntity},
    entities::part::{self, Entity as PartEntity},
    entities::vehicle::{self, Entity as VehicleEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Line-item classification; drives the parts/labor subtotal partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ItemType {
    Part,
    Labor,
}

/// Payment state of an invoice header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    Partial,
    Pending,
}

fn parse_payment_status(raw: Option<&str>) -> Result<PaymentStatus, ServiceError> {
    match raw {
        None => Ok(PaymentStatus::Unpaid),
        Some(value) => PaymentStatus::from_str(value.trim().to_ascii_lowercase().as_str())
            .map_err(|_| ServiceError::InvalidStatus(format!("Unknown payment status: {value}"))),
    }
}

/// Lenient monetary/quantity field: accepts a JSON number or a numeric
/// string; anything else (missing, null, garbage) coerces to zero.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(coerce_decimal(value.as_ref()))
}

fn coerce_decimal(value: Option<&serde_json::Value>) -> Decimal {
    match value {
        Some(serde_json::Value::Number(n)) => {
            Decimal::from_str(&n.to_string()).unwrap_or(Decimal::ZERO)
        }
        Some(serde_json::Value::String(s)) => {
            Decimal::from_str(s.trim()).unwrap_or(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    }
}

/// Raw line item as submitted by a client. The client-side `amount` is not
/// even deserialized; the server recomputes it from quantity and rate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewInvoiceItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    #[schema(value_type = f64)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    #[schema(value_type = f64)]
    pub rate: Decimal,
    #[serde(default)]
    pub item_type: Option<String>,
}

/// Canonical line item after normalization; `amount` is always
/// `quantity * rate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub part_id: Option<Uuid>,
    pub description: String,
    pub category: String,
    pub quantity: Decimal,
    pub unit: String,
    pub rate: Decimal,
    pub amount: Decimal,
    pub item_type: ItemType,
}

/// Convert a raw client-submitted row into its canonical form. Defaults:
/// empty description becomes "Item", category "General", unit "No" (count),
/// item type part.
pub fn normalize_item(raw: &NewInvoiceItem) -> NormalizedItem {
    let description = raw
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("Item")
        .to_string();
    let category = raw
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("General")
        .to_string();
    let unit = raw
        .unit
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or("No")
        .to_string();
    let item_type = raw
        .item_type
        .as_deref()
        .map(|t| t.trim().to_ascii_lowercase())
        .and_then(|t| ItemType::from_str(&t).ok())
        .unwrap_or(ItemType::Part);

    NormalizedItem {
        part_id: None,
        description,
        category,
        quantity: raw.quantity,
        unit,
        rate: raw.rate,
        amount: raw.quantity * raw.rate,
        item_type,
    }
}

/// Derived monetary aggregates for an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub parts_total: Decimal,
    pub labor_total: Decimal,
    pub grand_total: Decimal,
    pub balance_amount: Decimal,
}

/// Aggregate normalized items into the invoice totals:
/// `grand_total = parts_total + labor_total - discount` and
/// `balance = grand_total - paid`.
pub fn compute_totals(items: &[NormalizedItem], discount: Decimal, paid: Decimal) -> InvoiceTotals {
    let mut parts_total = Decimal::ZERO;
    let mut labor_total = Decimal::ZERO;

    for item in items {
        match item.item_type {
            ItemType::Part => parts_total += item.amount,
            ItemType::Labor => labor_total += item.amount,
        }
    }

    let grand_total = parts_total + labor_total - discount;
    let balance_amount = grand_total - paid;

    InvoiceTotals {
        parts_total,
        labor_total,
        grand_total,
        balance_amount,
    }
}

/// Request/Response types for the invoice service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    #[serde(default)]
    pub invoice_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mileage: Option<i32>,
    #[serde(default)]
    pub mechanic_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    #[schema(value_type = f64)]
    pub paid_amount: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    #[schema(value_type = f64)]
    pub discount_amount: Decimal,
    #[validate(length(min = 1, message = "Invoice requires at least one line item"))]
    pub items: Vec<NewInvoiceItem>,
}

/// Updates replace the item set wholesale; the request shape is identical to
/// creation.
pub type UpdateInvoiceRequest = CreateInvoiceRequest;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceItemResponse {
    pub id: Uuid,
    pub part_id: Option<Uuid>,
    pub description: String,
    pub category: String,
    #[schema(value_type = f64)]
    pub quantity: Decimal,
    pub unit: String,
    #[schema(value_type = f64)]
    pub rate: Decimal,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub item_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub invoice_date: DateTime<Utc>,
    pub mileage: Option<i32>,
    pub mechanic_name: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub payment_status: String,
    #[schema(value_type = f64)]
    pub paid_amount: Decimal,
    #[schema(value_type = f64)]
    pub discount_amount: Decimal,
    #[schema(value_type = f64)]
    pub parts_total: Decimal,
    #[schema(value_type = f64)]
    pub labor_total: Decimal,
    #[schema(value_type = f64)]
    pub grand_total: Decimal,
    #[schema(value_type = f64)]
    pub balance_amount: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<InvoiceItemResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Fully expanded payload for the printable invoice view.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvoicePrintResponse {
    pub invoice: InvoiceResponse,
    #[schema(value_type = Object)]
    pub customer: customer::Model,
    #[schema(value_type = Object)]
    pub vehicle: vehicle::Model,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub customer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub payment_status: Option<String>,
}

/// Service for managing the invoice lifecycle: header persistence, catalog
/// resolution, line-item normalization and totals computation run as one
/// transactional unit per call.
#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl InvoiceService {
    /// Creates a new invoice service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new invoice. Header, items and totals commit atomically;
    /// any failure rolls the whole invoice back.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, vehicle_id = %request.vehicle_id))]
    pub async fn create_invoice(
        &self,
        request: CreateInvoiceRequest,
        recorded_by: Option<Uuid>,
    ) -> Result<InvoiceResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        self.ensure_references_exist(db, request.customer_id, request.vehicle_id)
            .await?;

        let payment_status = parse_payment_status(request.payment_status.as_deref())?;
        let now = Utc::now();
        let invoice_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for invoice creation");
            ServiceError::DatabaseError(e)
        })?;

        // Header first, with zero placeholder totals; the backfill below is
        // part of the same transaction.
        let header = InvoiceActiveModel {
            id: Set(invoice_id),
            customer_id: Set(request.customer_id),
            vehicle_id: Set(request.vehicle_id),
            invoice_date: Set(request.invoice_date.unwrap_or(now)),
            mileage: Set(request.mileage),
            mechanic_name: Set(request.mechanic_name.clone()),
            notes: Set(request.notes.clone()),
            payment_method: Set(request.payment_method.clone()),
            payment_status: Set(payment_status.to_string()),
            paid_amount: Set(request.paid_amount),
            discount_amount: Set(request.discount_amount),
            parts_total: Set(Decimal::ZERO),
            labor_total: Set(Decimal::ZERO),
            grand_total: Set(Decimal::ZERO),
            balance_amount: Set(Decimal::ZERO),
            created_by: Set(recorded_by),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let header = header.insert(&txn).await.map_err(|e| {
            error!(error = %e, invoice_id = %invoice_id, "Failed to insert invoice header");
            ServiceError::DatabaseError(e)
        })?;

        let (items, auto_created_parts) = self
            .write_items(&txn, invoice_id, &request.items, now)
            .await?;

        let totals = compute_totals(&items, request.discount_amount, request.paid_amount);
        let stored = self.write_totals(&txn, header, totals, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, invoice_id = %invoice_id, "Failed to commit invoice creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(invoice_id = %invoice_id, grand_total = %stored.grand_total, "Invoice created successfully");
        self.emit(Event::InvoiceCreated(invoice_id)).await;
        for part_id in auto_created_parts {
            self.emit(Event::PartAutoCreated {
                part_id,
                invoice_id,
            })
            .await;
        }

        self.fetch_response(db, stored).await
    }

    /// Updates an invoice. Existing line items are deleted wholesale and
    /// replaced by the submitted set; totals are recomputed in the same
    /// transaction.
    #[instrument(skip(self, request), fields(invoice_id = %invoice_id, recorded_by = ?recorded_by))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        request: UpdateInvoiceRequest,
        recorded_by: Option<Uuid>,
    ) -> Result<InvoiceResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        self.ensure_references_exist(db, request.customer_id, request.vehicle_id)
            .await?;

        let payment_status = parse_payment_status(request.payment_status.as_deref())?;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, invoice_id = %invoice_id, "Failed to start transaction for invoice update");
            ServiceError::DatabaseError(e)
        })?;

        let existing = InvoiceEntity::find_by_id(invoice_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Invoice not found".to_string()))?;

        let mut header: InvoiceActiveModel = existing.into();
        header.customer_id = Set(request.customer_id);
        header.vehicle_id = Set(request.vehicle_id);
        if let Some(invoice_date) = request.invoice_date {
            header.invoice_date = Set(invoice_date);
        }
        header.mileage = Set(request.mileage);
        header.mechanic_name = Set(request.mechanic_name.clone());
        header.notes = Set(request.notes.clone());
        header.payment_method = Set(request.payment_method.clone());
        header.payment_status = Set(payment_status.to_string());
        header.paid_amount = Set(request.paid_amount);
        header.discount_amount = Set(request.discount_amount);
        header.updated_at = Set(Some(now));

        let header = header.update(&txn).await.map_err(|e| {
            error!(error = %e, invoice_id = %invoice_id, "Failed to update invoice header");
            ServiceError::DatabaseError(e)
        })?;

        // Full replace: the previous item set is discarded, never patched.
        InvoiceItemEntity::delete_many()
            .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, invoice_id = %invoice_id, "Failed to delete existing invoice items");
                ServiceError::DatabaseError(e)
            })?;

        let (items, auto_created_parts) = self
            .write_items(&txn, invoice_id, &request.items, now)
            .await?;

        let totals = compute_totals(&items, request.discount_amount, request.paid_amount);
        let stored = self.write_totals(&txn, header, totals, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, invoice_id = %invoice_id, "Failed to commit invoice update transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(invoice_id = %invoice_id, grand_total = %stored.grand_total, "Invoice updated successfully");
        self.emit(Event::InvoiceUpdated(invoice_id)).await;
        for part_id in auto_created_parts {
            self.emit(Event::PartAutoCreated {
                part_id,
                invoice_id,
            })
            .await;
        }

        self.fetch_response(db, stored).await
    }

    /// Retrieves an invoice with its line items
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<InvoiceResponse, ServiceError> {
        let db = &*self.db_pool;

        let header = InvoiceEntity::find_by_id(invoice_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Invoice not found".to_string()))?;

        self.fetch_response(db, header).await
    }

    /// Lists invoices with pagination and optional filters
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        page: u64,
        per_page: u64,
        filter: InvoiceFilter,
    ) -> Result<InvoiceListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = InvoiceEntity::find().order_by_desc(invoice::Column::InvoiceDate);
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(invoice::Column::CustomerId.eq(customer_id));
        }
        if let Some(vehicle_id) = filter.vehicle_id {
            query = query.filter(invoice::Column::VehicleId.eq(vehicle_id));
        }
        if let Some(status) = filter.payment_status.as_deref() {
            let status = parse_payment_status(Some(status))?;
            query = query.filter(invoice::Column::PaymentStatus.eq(status.to_string()));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let headers = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut invoices = Vec::with_capacity(headers.len());
        for header in headers {
            invoices.push(self.fetch_response(db, header).await?);
        }

        Ok(InvoiceListResponse {
            invoices,
            total,
            page,
            per_page,
        })
    }

    /// Deletes an invoice and its items
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        // Explicit pre-delete of items; the storage-level cascade is a
        // backstop, not the contract.
        InvoiceItemEntity::delete_many()
            .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let result = InvoiceEntity::delete_by_id(invoice_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Invoice not found".to_string()));
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(invoice_id = %invoice_id, "Invoice deleted");
        self.emit(Event::InvoiceDeleted(invoice_id)).await;

        Ok(())
    }

    /// Most recent invoice for a vehicle; used by front-ends to prefill
    /// mileage and mechanic details.
    #[instrument(skip(self), fields(vehicle_id = %vehicle_id))]
    pub async fn last_invoice_for_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> Result<Option<InvoiceResponse>, ServiceError> {
        let db = &*self.db_pool;

        let header = InvoiceEntity::find()
            .filter(invoice::Column::VehicleId.eq(vehicle_id))
            .order_by_desc(invoice::Column::InvoiceDate)
            .order_by_desc(invoice::Column::CreatedAt)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match header {
            Some(header) => Ok(Some(self.fetch_response(db, header).await?)),
            None => Ok(None),
        }
    }

    /// Expanded payload for the printable view
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn print_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<InvoicePrintResponse, ServiceError> {
        let db = &*self.db_pool;

        let invoice = self.get_invoice(invoice_id).await?;

        let customer = CustomerEntity::find_by_id(invoice.customer_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Customer not found".to_string()))?;

        let vehicle = VehicleEntity::find_by_id(invoice.vehicle_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Vehicle not found".to_string()))?;

        Ok(InvoicePrintResponse {
            invoice,
            customer,
            vehicle,
        })
    }

    /// Reject the request before any write when a referenced customer or
    /// vehicle does not resolve.
    async fn ensure_references_exist(
        &self,
        db: &DbPool,
        customer_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<(), ServiceError> {
        CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Customer {customer_id} does not exist"))
            })?;

        VehicleEntity::find_by_id(vehicle_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Vehicle {vehicle_id} does not exist"))
            })?;

        Ok(())
    }

    /// Normalize and persist the submitted item rows, linking each part-type
    /// row to the catalog. Returns the normalized items (for totals) and the
    /// ids of any catalog entries created along the way.
    async fn write_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        invoice_id: Uuid,
        raw_items: &[NewInvoiceItem],
        now: DateTime<Utc>,
    ) -> Result<(Vec<NormalizedItem>, Vec<Uuid>), ServiceError> {
        let mut normalized = Vec::with_capacity(raw_items.len());
        let mut auto_created = Vec::new();
        let mut rows = Vec::with_capacity(raw_items.len());

        for raw in raw_items {
            let mut item = normalize_item(raw);
            if item.item_type == ItemType::Part {
                let (part_id, created) = resolve_part(conn, &item).await;
                item.part_id = part_id;
                if let (Some(part_id), true) = (part_id, created) {
                    auto_created.push(part_id);
                }
            }

            rows.push(invoice_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                invoice_id: Set(invoice_id),
                part_id: Set(item.part_id),
                description: Set(item.description.clone()),
                category: Set(item.category.clone()),
                quantity: Set(item.quantity),
                unit: Set(item.unit.clone()),
                rate: Set(item.rate),
                amount: Set(item.amount),
                item_type: Set(item.item_type.to_string()),
                created_at: Set(now),
            });
            normalized.push(item);
        }

        InvoiceItemEntity::insert_many(rows)
            .exec(conn)
            .await
            .map_err(|e| {
                error!(error = %e, invoice_id = %invoice_id, "Failed to insert invoice items");
                ServiceError::DatabaseError(e)
            })?;

        Ok((normalized, auto_created))
    }

    /// Backfill the computed totals onto the header.
    async fn write_totals<C: ConnectionTrait>(
        &self,
        conn: &C,
        header: invoice::Model,
        totals: InvoiceTotals,
        now: DateTime<Utc>,
    ) -> Result<invoice::Model, ServiceError> {
        let invoice_id = header.id;
        let mut active: InvoiceActiveModel = header.into();
        active.parts_total = Set(totals.parts_total);
        active.labor_total = Set(totals.labor_total);
        active.grand_total = Set(totals.grand_total);
        active.balance_amount = Set(totals.balance_amount);
        active.updated_at = Set(Some(now));

        active.update(conn).await.map_err(|e| {
            error!(error = %e, invoice_id = %invoice_id, "Failed to write invoice totals");
            ServiceError::DatabaseError(e)
        })
    }

    async fn fetch_response(
        &self,
        db: &DbPool,
        header: invoice::Model,
    ) -> Result<InvoiceResponse, ServiceError> {
        let items = InvoiceItemEntity::find()
            .filter(invoice_item::Column::InvoiceId.eq(header.id))
            .order_by_asc(invoice_item::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(model_to_response(header, items))
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send invoice event");
            }
        }
    }
}

/// Find an active catalog entry whose name matches the item description,
/// creating one from the item's own fields when nothing matches. Exact
/// case-insensitive matches win over substring matches; within a tier the
/// oldest entry wins. Returns `(part_id, created)`; a creation failure is
/// soft and leaves the item unlinked.
async fn resolve_part<C: ConnectionTrait>(conn: &C, item: &NormalizedItem) -> (Option<Uuid>, bool) {
    let needle = item.description.trim().to_lowercase();
    if needle.is_empty() {
        return (None, false);
    }

    let lowered_name = Func::lower(Expr::col((part::Entity, part::Column::Name)));

    let exact = PartEntity::find()
        .filter(part::Column::IsActive.eq(true))
        .filter(Expr::expr(lowered_name.clone()).eq(needle.clone()))
        .order_by_asc(part::Column::CreatedAt)
        .order_by_asc(part::Column::Id)
        .one(conn)
        .await;

    match exact {
        Ok(Some(found)) => return (Some(found.id), false),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, description = %item.description, "Catalog lookup failed; item proceeds unlinked");
            return (None, false);
        }
    }

    let substring = PartEntity::find()
        .filter(part::Column::IsActive.eq(true))
        .filter(Expr::expr(lowered_name).like(format!("%{}%", needle)))
        .order_by_asc(part::Column::CreatedAt)
        .order_by_asc(part::Column::Id)
        .one(conn)
        .await;

    match substring {
        Ok(Some(found)) => return (Some(found.id), false),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, description = %item.description, "Catalog lookup failed; item proceeds unlinked");
            return (None, false);
        }
    }

    // Create-if-missing: catalog entries appear as a side effect of
    // invoicing, seeded from the item's own fields.
    let new_entry = part::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(item.description.clone()),
        category: Set(item.category.clone()),
        rate: Set(item.rate),
        unit: Set(item.unit.clone()),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    };

    match new_entry.insert(conn).await {
        Ok(created) => {
            info!(part_id = %created.id, name = %created.name, "Catalog entry created while invoicing");
            (Some(created.id), true)
        }
        Err(e) => {
            warn!(error = %e, description = %item.description, "Catalog entry creation failed; item proceeds unlinked");
            (None, false)
        }
    }
}

fn model_to_response(header: invoice::Model, items: Vec<invoice_item::Model>) -> InvoiceResponse {
    InvoiceResponse {
        id: header.id,
        customer_id: header.customer_id,
        vehicle_id: header.vehicle_id,
        invoice_date: header.invoice_date,
        mileage: header.mileage,
        mechanic_name: header.mechanic_name,
        notes: header.notes,
        payment_method: header.payment_method,
        payment_status: header.payment_status,
        paid_amount: header.paid_amount,
        discount_amount: header.discount_amount,
        parts_total: header.parts_total,
        labor_total: header.labor_total,
        grand_total: header.grand_total,
        balance_amount: header.balance_amount,
        created_by: header.created_by,
        created_at: header.created_at,
        updated_at: header.updated_at,
        items: items
            .into_iter()
            .map(|item| InvoiceItemResponse {
                id: item.id,
                part_id: item.part_id,
                description: item.description,
                category: item.category,
                quantity: item.quantity,
                unit: item.unit,
                rate: item.rate,
                amount: item.amount,
                item_type: item.item_type,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw_item(
        description: &str,
        item_type: &str,
        quantity: Decimal,
        rate: Decimal,
    ) -> NewInvoiceItem {
        NewInvoiceItem {
            description: Some(description.to_string()),
            category: None,
            quantity,
            unit: None,
            rate,
            item_type: Some(item_type.to_string()),
        }
    }

    #[test]
    fn normalize_fills_defaults_and_recomputes_amount() {
        let raw = NewInvoiceItem {
            description: Some("  ".to_string()),
            category: None,
            quantity: dec!(3),
            unit: None,
            rate: dec!(12.50),
            item_type: None,
        };

        let item = normalize_item(&raw);
        assert_eq!(item.description, "Item");
        assert_eq!(item.category, "General");
        assert_eq!(item.unit, "No");
        assert_eq!(item.item_type, ItemType::Part);
        assert_eq!(item.amount, dec!(37.50));
    }

    #[test]
    fn normalize_respects_labor_type_case_insensitively() {
        let raw = raw_item("Engine work", "LABOR", dec!(2), dec!(100));
        assert_eq!(normalize_item(&raw).item_type, ItemType::Labor);

        let raw = raw_item("Engine work", "something-else", dec!(2), dec!(100));
        assert_eq!(normalize_item(&raw).item_type, ItemType::Part);
    }

    #[test]
    fn client_supplied_amount_is_not_part_of_the_wire_format() {
        // An `amount` key in the payload is simply dropped by deserialization;
        // the computed amount comes from quantity * rate alone.
        let raw: NewInvoiceItem = serde_json::from_value(serde_json::json!({
            "description": "Oil Filter",
            "quantity": 2,
            "rate": 150,
            "amount": 9999,
            "item_type": "part"
        }))
        .unwrap();

        let item = normalize_item(&raw);
        assert_eq!(item.amount, dec!(300));
    }

    #[test]
    fn lenient_decimal_accepts_numbers_strings_and_garbage() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "lenient_decimal")]
            value: Decimal,
        }

        let cases = [
            (serde_json::json!({ "value": 12.5 }), dec!(12.5)),
            (serde_json::json!({ "value": "42.75" }), dec!(42.75)),
            (serde_json::json!({ "value": " 7 " }), dec!(7)),
            (serde_json::json!({ "value": "not a number" }), Decimal::ZERO),
            (serde_json::json!({ "value": null }), Decimal::ZERO),
            (serde_json::json!({}), Decimal::ZERO),
            (serde_json::json!({ "value": [1, 2] }), Decimal::ZERO),
        ];

        for (input, expected) in cases {
            let probe: Probe = serde_json::from_value(input.clone()).unwrap();
            assert_eq!(probe.value, expected, "input: {input}");
        }
    }

    #[test]
    fn compute_totals_partitions_parts_and_labor() {
        let items = vec![
            normalize_item(&raw_item("Oil Filter", "part", dec!(2), dec!(150))),
            normalize_item(&raw_item("Labor", "labor", dec!(1), dec!(300))),
        ];

        let totals = compute_totals(&items, dec!(50), dec!(400));
        assert_eq!(totals.parts_total, dec!(300));
        assert_eq!(totals.labor_total, dec!(300));
        assert_eq!(totals.grand_total, dec!(550));
        assert_eq!(totals.balance_amount, dec!(150));
    }

    #[test]
    fn compute_totals_of_empty_item_set_is_negative_discount() {
        let totals = compute_totals(&[], dec!(10), Decimal::ZERO);
        assert_eq!(totals.parts_total, Decimal::ZERO);
        assert_eq!(totals.labor_total, Decimal::ZERO);
        assert_eq!(totals.grand_total, dec!(-10));
        assert_eq!(totals.balance_amount, dec!(-10));
    }

    #[test]
    fn compute_totals_overpayment_yields_negative_balance() {
        let items = vec![normalize_item(&raw_item(
            "Wiper blade",
            "part",
            dec!(1),
            dec!(20),
        ))];
        let totals = compute_totals(&items, Decimal::ZERO, dec!(50));
        assert_eq!(totals.grand_total, dec!(20));
        assert_eq!(totals.balance_amount, dec!(-30));
    }

    #[test]
    fn totals_invariants_hold_for_mixed_sets() {
        let items = vec![
            normalize_item(&raw_item("Brake pads", "part", dec!(4), dec!(89.99))),
            normalize_item(&raw_item("Coolant", "part", dec!(1.5), dec!(24))),
            normalize_item(&raw_item("Diagnostics", "labor", dec!(0.5), dec!(120))),
        ];
        let discount = dec!(15);
        let paid = dec!(100);

        let totals = compute_totals(&items, discount, paid);
        assert_eq!(
            totals.grand_total,
            totals.parts_total + totals.labor_total - discount
        );
        assert_eq!(totals.balance_amount, totals.grand_total - paid);
    }

    #[test]
    fn payment_status_parsing_defaults_and_rejects_unknown() {
        assert_eq!(parse_payment_status(None).unwrap(), PaymentStatus::Unpaid);
        assert_eq!(
            parse_payment_status(Some("Partial")).unwrap(),
            PaymentStatus::Partial
        );
        assert_eq!(
            parse_payment_status(Some("paid")).unwrap(),
            PaymentStatus::Paid
        );
        assert!(parse_payment_status(Some("settled")).is_err());
    }

    #[test]
    fn item_type_round_trips_through_storage_string() {
        assert_eq!(ItemType::Part.to_string(), "part");
        assert_eq!(ItemType::Labor.to_string(), "labor");
        assert_eq!(ItemType::from_str("labor").unwrap(), ItemType::Labor);
    }
}
