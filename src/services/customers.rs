use crate::{
    db::DbPool,
    entities::customer::{self, Entity as CustomerEntity},
    entities::invoice::{self, Entity as InvoiceEntity},
    entities::vehicle::{self, Entity as VehicleEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerInput {
    #[validate(length(min = 1, max = 120, message = "Customer name is required"))]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Customer email must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerListResponse {
    #[schema(value_type = Vec<Object>)]
    pub customers: Vec<customer::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing customers
#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CustomerService {
    /// Creates a new customer service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new customer
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_customer(
        &self,
        input: CustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let created = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            phone: Set(input.phone),
            email: Set(input.email),
            address: Set(input.address),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(customer_id = %created.id, "Customer created");
        self.emit(Event::CustomerCreated(created.id)).await;

        Ok(created)
    }

    /// Gets a customer by ID
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_customer(&self, customer_id: Uuid) -> Result<customer::Model, ServiceError> {
        let db = &*self.db_pool;
        CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Customer not found".to_string()))
    }

    /// Lists customers with pagination
    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<CustomerListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = CustomerEntity::find()
            .order_by_asc(customer::Column::Name)
            .paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let customers = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(CustomerListResponse {
            customers,
            total,
            page,
            per_page,
        })
    }

    /// Searches customers by name, phone or email
    #[instrument(skip(self))]
    pub async fn search_customers(&self, term: &str) -> Result<Vec<customer::Model>, ServiceError> {
        let db = &*self.db_pool;
        let search_pattern = format!("%{}%", term.trim());

        let customers = CustomerEntity::find()
            .filter(
                Condition::any()
                    .add(customer::Column::Name.like(&search_pattern))
                    .add(customer::Column::Phone.like(&search_pattern))
                    .add(customer::Column::Email.like(&search_pattern)),
            )
            .order_by_asc(customer::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(customers)
    }

    /// Updates an existing customer
    #[instrument(skip(self, input), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        input: CustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let existing = CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Customer not found".to_string()))?;

        let mut active: customer::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.phone = Set(input.phone);
        active.email = Set(input.email);
        active.address = Set(input.address);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(ServiceError::DatabaseError)?;
        self.emit(Event::CustomerUpdated(customer_id)).await;

        Ok(updated)
    }

    /// Deletes a customer. Refused while invoices still reference the
    /// customer; owned vehicles are removed with the customer.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let invoice_count = InvoiceEntity::find()
            .filter(invoice::Column::CustomerId.eq(customer_id))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if invoice_count > 0 {
            return Err(ServiceError::Conflict(format!(
                "Customer has {invoice_count} invoices and cannot be deleted"
            )));
        }

        VehicleEntity::delete_many()
            .filter(vehicle::Column::CustomerId.eq(customer_id))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let result = CustomerEntity::delete_by_id(customer_id)
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Customer not found".to_string()));
        }

        info!(customer_id = %customer_id, "Customer deleted");
        self.emit(Event::CustomerDeleted(customer_id)).await;

        Ok(())
    }

    /// Gets the vehicles owned by a customer
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_customer_vehicles(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<vehicle::Model>, ServiceError> {
        let db = &*self.db_pool;

        CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Customer not found".to_string()))?;

        let vehicles = VehicleEntity::find()
            .filter(vehicle::Column::CustomerId.eq(customer_id))
            .order_by_asc(vehicle::Column::RegistrationNo)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(vehicles)
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send customer event");
            }
        }
    }
}
