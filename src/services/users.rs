use crate::{
    auth::{AuthService, ROLES},
    db::DbPool,
    entities::user::{self, Entity as UserEntity},
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
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 120, message = "User name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 120, message = "User name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub role: String,
    pub is_active: bool,
}

/// User payload with the password hash stripped
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: Option<chrono::DateTime<Utc>>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn ensure_known_role(role: &str) -> Result<(), ServiceError> {
    if ROLES.contains_key(role) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "Unknown role: {role}"
        )))
    }
}

/// Service for administering staff accounts
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl UserService {
    /// Creates a new user service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a staff account
    #[instrument(skip(self, request), fields(email = %request.email, role = %request.role))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        ensure_known_role(&request.role)?;

        let db = &*self.db_pool;

        let existing = UserEntity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A user with email {} already exists",
                request.email
            )));
        }

        let password_hash = AuthService::hash_password(&request.password)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;

        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            email: Set(request.email.trim().to_lowercase()),
            password_hash: Set(password_hash),
            role: Set(request.role),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(user_id = %created.id, "User created");
        self.emit(Event::UserCreated(created.id)).await;

        Ok(created.into())
    }

    /// Gets a user by ID
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        let db = &*self.db_pool;
        UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .map(UserResponse::from)
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Lists users with pagination
    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<UserListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = UserEntity::find()
            .order_by_asc(user::Column::Name)
            .paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let users = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(UserListResponse {
            users: users.into_iter().map(UserResponse::from).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Updates a staff account; the password only changes when one is
    /// supplied.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        ensure_known_role(&request.role)?;

        let db = &*self.db_pool;
        let existing = UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let was_active = existing.is_active;

        let mut active: user::ActiveModel = existing.into();
        active.name = Set(request.name.trim().to_string());
        active.email = Set(request.email.trim().to_lowercase());
        active.role = Set(request.role);
        active.is_active = Set(request.is_active);
        if let Some(password) = request.password.as_deref() {
            let password_hash = AuthService::hash_password(password)
                .map_err(|e| ServiceError::HashError(e.to_string()))?;
            active.password_hash = Set(password_hash);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(ServiceError::DatabaseError)?;

        if was_active && !updated.is_active {
            self.emit(Event::UserDeactivated(user_id)).await;
        } else {
            self.emit(Event::UserUpdated(user_id)).await;
        }

        Ok(updated.into())
    }

    /// Deactivates a staff account. Accounts are never hard-deleted;
    /// invoices keep their created_by reference.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn deactivate_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let mut active: user::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await.map_err(ServiceError::DatabaseError)?;

        info!(user_id = %user_id, "User deactivated");
        self.emit(Event::UserDeactivated(user_id)).await;

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send user event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_are_rejected() {
        assert!(ensure_known_role("admin").is_ok());
        assert!(ensure_known_role("mechanic").is_ok());
        assert!(ensure_known_role("owner").is_err());
    }
}
