use crate::{
    db::DbPool,
    entities::part::{self, Entity as PartEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
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
pub struct CreatePartRequest {
    #[validate(length(min = 1, max = 160, message = "Part name is required"))]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub rate: Decimal,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePartRequest {
    #[validate(length(min = 1, max = 160, message = "Part name is required"))]
    pub name: String,
    pub category: String,
    #[schema(value_type = f64)]
    pub rate: Decimal,
    pub unit: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PartListResponse {
    #[schema(value_type = Vec<Object>)]
    pub parts: Vec<part::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for managing the parts catalog. Entries may also appear through
/// invoicing (create-if-missing); this service owns the explicit side.
#[derive(Clone)]
pub struct PartService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PartService {
    /// Creates a new part service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a catalog entry
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_part(&self, request: CreatePartRequest) -> Result<part::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let entry = part::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            category: Set(request
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or("General")
                .to_string()),
            rate: Set(request.rate),
            unit: Set(request
                .unit
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .unwrap_or("No")
                .to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let created = entry.insert(db).await.map_err(ServiceError::DatabaseError)?;

        info!(part_id = %created.id, "Catalog entry created");
        self.emit(Event::PartCreated(created.id)).await;

        Ok(created)
    }

    /// Retrieves a catalog entry by id
    #[instrument(skip(self), fields(part_id = %part_id))]
    pub async fn get_part(&self, part_id: Uuid) -> Result<part::Model, ServiceError> {
        let db = &*self.db_pool;
        PartEntity::find_by_id(part_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Part not found".to_string()))
    }

    /// Lists catalog entries with pagination
    #[instrument(skip(self))]
    pub async fn list_parts(
        &self,
        page: u64,
        per_page: u64,
        include_inactive: bool,
    ) -> Result<PartListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = PartEntity::find().order_by_asc(part::Column::Name);
        if !include_inactive {
            query = query.filter(part::Column::IsActive.eq(true));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let parts = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(PartListResponse {
            parts,
            total,
            page,
            per_page,
        })
    }

    /// Case-insensitive name search across active catalog entries
    #[instrument(skip(self))]
    pub async fn search_parts(&self, term: &str) -> Result<Vec<part::Model>, ServiceError> {
        let db = &*self.db_pool;
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(vec![]);
        }

        let lowered_name = Func::lower(Expr::col((part::Entity, part::Column::Name)));
        let parts = PartEntity::find()
            .filter(part::Column::IsActive.eq(true))
            .filter(Expr::expr(lowered_name).like(format!("%{}%", needle)))
            .order_by_asc(part::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(parts)
    }

    /// Updates a catalog entry
    #[instrument(skip(self, request), fields(part_id = %part_id))]
    pub async fn update_part(
        &self,
        part_id: Uuid,
        request: UpdatePartRequest,
    ) -> Result<part::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let existing = PartEntity::find_by_id(part_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Part not found".to_string()))?;

        let was_active = existing.is_active;

        let mut active: part::ActiveModel = existing.into();
        active.name = Set(request.name.trim().to_string());
        active.category = Set(request.category);
        active.rate = Set(request.rate);
        active.unit = Set(request.unit);
        active.is_active = Set(request.is_active);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(ServiceError::DatabaseError)?;

        if was_active && !updated.is_active {
            self.emit(Event::PartDeactivated(part_id)).await;
        } else {
            self.emit(Event::PartUpdated(part_id)).await;
        }

        Ok(updated)
    }

    /// Deactivates a catalog entry. Rows are never hard-deleted because
    /// historical invoice items reference them.
    #[instrument(skip(self), fields(part_id = %part_id))]
    pub async fn deactivate_part(&self, part_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = PartEntity::find_by_id(part_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Part not found".to_string()))?;

        let mut active: part::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await.map_err(ServiceError::DatabaseError)?;

        info!(part_id = %part_id, "Catalog entry deactivated");
        self.emit(Event::PartDeactivated(part_id)).await;

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send catalog event");
            }
        }
    }
}
