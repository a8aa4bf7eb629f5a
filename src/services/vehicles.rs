use crate::{
    db::DbPool,
    entities::customer::Entity as CustomerEntity,
    entities::invoice::{self, Entity as InvoiceEntity},
    entities::vehicle::{self, Entity as VehicleEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct VehicleInput {
    pub customer_id: Uuid,
    #[validate(length(min = 1, max = 40, message = "Registration number is required"))]
    pub registration_no: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub mileage: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VehicleListResponse {
    #[schema(value_type = Vec<Object>)]
    pub vehicles: Vec<vehicle::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing vehicles
#[derive(Clone)]
pub struct VehicleService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl VehicleService {
    /// Creates a new vehicle service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers a vehicle for a customer
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id, registration_no = %input.registration_no))]
    pub async fn create_vehicle(&self, input: VehicleInput) -> Result<vehicle::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        CustomerEntity::find_by_id(input.customer_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Customer {} does not exist",
                    input.customer_id
                ))
            })?;

        let created = vehicle::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(input.customer_id),
            registration_no: Set(input.registration_no.trim().to_string()),
            make: Set(input.make),
            model: Set(input.model),
            year: Set(input.year),
            mileage: Set(input.mileage),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(vehicle_id = %created.id, "Vehicle registered");
        self.emit(Event::VehicleCreated(created.id)).await;

        Ok(created)
    }

    /// Gets a vehicle by ID
    #[instrument(skip(self), fields(vehicle_id = %vehicle_id))]
    pub async fn get_vehicle(&self, vehicle_id: Uuid) -> Result<vehicle::Model, ServiceError> {
        let db = &*self.db_pool;
        VehicleEntity::find_by_id(vehicle_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Vehicle not found".to_string()))
    }

    /// Lists vehicles with pagination
    #[instrument(skip(self))]
    pub async fn list_vehicles(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<VehicleListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = VehicleEntity::find()
            .order_by_asc(vehicle::Column::RegistrationNo)
            .paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let vehicles = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(VehicleListResponse {
            vehicles,
            total,
            page,
            per_page,
        })
    }

    /// Updates a vehicle
    #[instrument(skip(self, input), fields(vehicle_id = %vehicle_id))]
    pub async fn update_vehicle(
        &self,
        vehicle_id: Uuid,
        input: VehicleInput,
    ) -> Result<vehicle::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let existing = VehicleEntity::find_by_id(vehicle_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Vehicle not found".to_string()))?;

        CustomerEntity::find_by_id(input.customer_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Customer {} does not exist",
                    input.customer_id
                ))
            })?;

        let mut active: vehicle::ActiveModel = existing.into();
        active.customer_id = Set(input.customer_id);
        active.registration_no = Set(input.registration_no.trim().to_string());
        active.make = Set(input.make);
        active.model = Set(input.model);
        active.year = Set(input.year);
        active.mileage = Set(input.mileage);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(ServiceError::DatabaseError)?;
        self.emit(Event::VehicleUpdated(vehicle_id)).await;

        Ok(updated)
    }

    /// Deletes a vehicle. Refused while invoices still reference it.
    #[instrument(skip(self), fields(vehicle_id = %vehicle_id))]
    pub async fn delete_vehicle(&self, vehicle_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let invoice_count = InvoiceEntity::find()
            .filter(invoice::Column::VehicleId.eq(vehicle_id))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if invoice_count > 0 {
            return Err(ServiceError::Conflict(format!(
                "Vehicle has {invoice_count} invoices and cannot be deleted"
            )));
        }

        let result = VehicleEntity::delete_by_id(vehicle_id)
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Vehicle not found".to_string()));
        }

        info!(vehicle_id = %vehicle_id, "Vehicle deleted");
        self.emit(Event::VehicleDeleted(vehicle_id)).await;

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send vehicle event");
            }
        }
    }
}
