use std::sync::Arc;
use std::time::Duration;

use autoshop_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::user,
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application state backed by a
/// throwaway SQLite database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub auth_service: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        // Minimal configuration suitable for tests; each instance gets its
        // own database file so tests can run concurrently.
        let db_file = std::env::temp_dir().join(format!(
            "autoshop_test_{}.db",
            Uuid::new_v4().simple()
        ));
        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(86_400),
        );
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::<AppState>::new()
            .route("/", get(|| async { "autoshop-api up" }))
            .nest("/api/v1", autoshop_api::api_v1_routes())
            .nest(
                "/auth",
                autoshop_api::auth::auth_routes().with_state(auth_service.clone()),
            )
            .layer(axum::middleware::from_fn_with_state(
                auth_service.clone(),
                |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
                 mut req: axum::http::Request<Body>,
                 next: axum::middleware::Next| async move {
                    req.extensions_mut().insert(auth);
                    next.run(req).await
                },
            ))
            .layer(axum::middleware::from_fn(
                autoshop_api::tracing::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            auth_service,
            _event_task: event_task,
        }
    }

    /// Seed a staff account directly and return a bearer token for it.
    pub async fn seed_user_with_role(&self, role: &str) -> String {
        let password_hash =
            AuthService::hash_password("test-password-123").expect("hashing should work");
        let account = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Test {role}")),
            email: Set(format!("{role}-{}@autoshop.test", Uuid::new_v4().simple())),
            password_hash: Set(password_hash),
            role: Set(role.to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed user");

        self.auth_service
            .generate_token(&account)
            .expect("failed to mint token")
            .access_token
    }

    /// Issue a request with optional JSON body and bearer token; returns
    /// status and parsed JSON body (Null for empty bodies).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("failed to build request"),
            None => builder.body(Body::empty()).expect("failed to build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request should not error");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body))
            .await
    }

    #[allow(dead_code)]
    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Seed a customer and a vehicle, returning their ids.
    pub async fn seed_customer_and_vehicle(&self, token: &str) -> (String, String) {
        let (status, customer) = self
            .post(
                "/api/v1/customers",
                token,
                serde_json::json!({ "name": "Jordan Driver", "phone": "555-0100" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "customer seed failed: {customer}");
        let customer_id = customer["id"].as_str().expect("customer id").to_string();

        let (status, vehicle) = self
            .post(
                "/api/v1/vehicles",
                token,
                serde_json::json!({
                    "customer_id": customer_id,
                    "registration_no": "WS-1234",
                    "make": "Toyota",
                    "model": "Corolla",
                    "year": 2019,
                    "mileage": 43000
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "vehicle seed failed: {vehicle}");
        let vehicle_id = vehicle["id"].as_str().expect("vehicle id").to_string();

        (customer_id, vehicle_id)
    }
}
