//! Autoshop API Library
//!
//! This crate provides the core functionality for the Autoshop API
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as cap;
use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

// Enhanced API routes function
pub fn api_v1_routes() -> Router<AppState> {
    // Invoice routes with capability gating
    let invoices_read = Router::new()
        .route("/invoices", get(handlers::invoices::list_invoices))
        .route("/invoices/last", get(handlers::invoices::last_invoice))
        .route("/invoices/:id", get(handlers::invoices::get_invoice))
        .route(
            "/invoices/:id/print",
            get(handlers::invoices::print_invoice),
        )
        .with_capability(cap::INVOICES_READ);

    let invoices_create = Router::new()
        .route(
            "/invoices",
            axum::routing::post(handlers::invoices::create_invoice),
        )
        .with_capability(cap::INVOICES_CREATE);

    let invoices_update = Router::new()
        .route(
            "/invoices/:id",
            axum::routing::put(handlers::invoices::update_invoice),
        )
        .with_capability(cap::INVOICES_UPDATE);

    let invoices_delete = Router::new()
        .route(
            "/invoices/:id",
            axum::routing::delete(handlers::invoices::delete_invoice),
        )
        .with_capability(cap::INVOICES_DELETE);

    // Parts catalog routes with capability gating
    let parts_read = Router::new()
        .route("/parts", get(handlers::parts::list_parts))
        .route("/parts/search", get(handlers::parts::search_parts))
        .route("/parts/:id", get(handlers::parts::get_part))
        .with_capability(cap::PARTS_READ);

    let parts_manage = Router::new()
        .route("/parts", axum::routing::post(handlers::parts::create_part))
        .route(
            "/parts/:id",
            axum::routing::put(handlers::parts::update_part),
        )
        .route(
            "/parts/:id",
            axum::routing::delete(handlers::parts::deactivate_part),
        )
        .with_capability(cap::PARTS_MANAGE);

    // Customer routes with capability gating
    let customers_read = Router::new()
        .route("/customers", get(handlers::customers::list_customers))
        .route(
            "/customers/search",
            get(handlers::customers::search_customers),
        )
        .route("/customers/:id", get(handlers::customers::get_customer))
        .route(
            "/customers/:id/vehicles",
            get(handlers::customers::get_customer_vehicles),
        )
        .with_capability(cap::CUSTOMERS_READ);

    let customers_manage = Router::new()
        .route(
            "/customers",
            axum::routing::post(handlers::customers::create_customer),
        )
        .route(
            "/customers/:id",
            axum::routing::put(handlers::customers::update_customer),
        )
        .route(
            "/customers/:id",
            axum::routing::delete(handlers::customers::delete_customer),
        )
        .with_capability(cap::CUSTOMERS_MANAGE);

    // Vehicle routes with capability gating
    let vehicles_read = Router::new()
        .route("/vehicles", get(handlers::vehicles::list_vehicles))
        .route("/vehicles/:id", get(handlers::vehicles::get_vehicle))
        .with_capability(cap::VEHICLES_READ);

    let vehicles_manage = Router::new()
        .route(
            "/vehicles",
            axum::routing::post(handlers::vehicles::create_vehicle),
        )
        .route(
            "/vehicles/:id",
            axum::routing::put(handlers::vehicles::update_vehicle),
        )
        .route(
            "/vehicles/:id",
            axum::routing::delete(handlers::vehicles::delete_vehicle),
        )
        .with_capability(cap::VEHICLES_MANAGE);

    // Staff administration routes (admin only via users:manage)
    let users_manage = Router::new()
        .route("/users", get(handlers::users::list_users))
        .route("/users", axum::routing::post(handlers::users::create_user))
        .route("/users/:id", get(handlers::users::get_user))
        .route(
            "/users/:id",
            axum::routing::put(handlers::users::update_user),
        )
        .route(
            "/users/:id",
            axum::routing::delete(handlers::users::deactivate_user),
        )
        .with_capability(cap::USERS_MANAGE);

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Invoices API (auth + capabilities)
        .merge(invoices_read)
        .merge(invoices_create)
        .merge(invoices_update)
        .merge(invoices_delete)
        // Parts catalog API (auth + capabilities)
        .merge(parts_read)
        .merge(parts_manage)
        // Customers API (auth + capabilities)
        .merge(customers_read)
        .merge(customers_manage)
        // Vehicles API (auth + capabilities)
        .merge(vehicles_read)
        .merge(vehicles_manage)
        // Staff administration API (auth + capabilities)
        .merge(users_manage)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "build_time": build_time,
        "service": "autoshop-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    // Check database connectivity
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": if db_status == "healthy" { "healthy" } else { "unhealthy" },
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }
}
