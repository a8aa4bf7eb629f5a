mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/invoices", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::POST, "/api/v1/customers", None, Some(json!({ "name": "X" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_bearer_token_is_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/v1/invoices", "not-a-real-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_issues_usable_tokens_and_rejects_bad_passwords() {
    let app = TestApp::new().await;
    // Seed an account through the service layer so the login flow runs
    // against a real argon2 hash
    let admin_token = app.seed_user_with_role("admin").await;
    let (status, account) = app
        .post(
            "/api/v1/users",
            &admin_token,
            json!({
                "name": "Front Desk",
                "email": "desk@autoshop.test",
                "password": "desk-password-9",
                "role": "frontdesk"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "user create failed: {account}");

    let (status, tokens) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "desk@autoshop.test", "password": "desk-password-9" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "login failed: {tokens}");
    let access_token = tokens["access_token"].as_str().expect("access token");

    let (status, _) = app.get("/api/v1/customers", access_token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "desk@autoshop.test", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn capabilities_gate_mutating_routes_by_role() {
    let app = TestApp::new().await;
    let admin_token = app.seed_user_with_role("admin").await;
    let mechanic_token = app.seed_user_with_role("mechanic").await;
    let frontdesk_token = app.seed_user_with_role("frontdesk").await;

    let (customer_id, vehicle_id) = app.seed_customer_and_vehicle(&admin_token).await;

    // A mechanic can create an invoice
    let (status, invoice) = app
        .post(
            "/api/v1/invoices",
            &mechanic_token,
            json!({
                "customer_id": customer_id,
                "vehicle_id": vehicle_id,
                "items": [ { "description": "Oil", "quantity": 1, "rate": 10 } ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "mechanic create failed: {invoice}");
    let invoice_id = invoice["id"].as_str().unwrap();

    // ... but cannot delete one
    let (status, _) = app
        .delete(&format!("/api/v1/invoices/{invoice_id}"), &mechanic_token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // ... and cannot administer users
    let (status, _) = app.get("/api/v1/users", &mechanic_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Front desk manages customers but not the parts catalog
    let (status, _) = app
        .post(
            "/api/v1/customers",
            &frontdesk_token,
            json!({ "name": "Walk-in" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(
            "/api/v1/parts",
            &frontdesk_token,
            json!({ "name": "Air Filter", "rate": 35 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin holds every capability, including the delete the mechanic lacked
    let (status, _) = app
        .delete(&format!("/api/v1/invoices/{invoice_id}"), &admin_token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn deactivated_users_cannot_refresh_tokens() {
    let app = TestApp::new().await;
    let admin_token = app.seed_user_with_role("admin").await;

    let (_, account) = app
        .post(
            "/api/v1/users",
            &admin_token,
            json!({
                "name": "Departing Mechanic",
                "email": "leaving@autoshop.test",
                "password": "temp-password-1",
                "role": "mechanic"
            }),
        )
        .await;
    let user_id = account["id"].as_str().unwrap();

    let (_, tokens) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "leaving@autoshop.test", "password": "temp-password-1" })),
        )
        .await;
    let refresh_token = tokens["refresh_token"].as_str().unwrap();

    // Deactivate the account, then try to refresh
    let (status, _) = app
        .delete(&format!("/api/v1/users/{user_id}"), &admin_token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
