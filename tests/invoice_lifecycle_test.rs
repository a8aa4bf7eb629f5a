mod common;

use std::str::FromStr;

use autoshop_api::services::invoices::{CreateInvoiceRequest, NewInvoiceItem};
use axum::http::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, DatabaseBackend, EntityTrait, Statement};
use serde_json::{json, Value};
use uuid::Uuid;

use common::TestApp;

fn decimal_field(value: &Value, field: &str) -> Decimal {
    let raw = &value[field];
    if let Some(s) = raw.as_str() {
        Decimal::from_str(s).unwrap_or_else(|_| panic!("{field} is not a decimal: {raw}"))
    } else if raw.is_number() {
        Decimal::from_str(&raw.to_string()).unwrap()
    } else {
        panic!("{field} missing from payload: {value}")
    }
}

fn oil_change_payload(customer_id: &str, vehicle_id: &str) -> Value {
    json!({
        "customer_id": customer_id,
        "vehicle_id": vehicle_id,
        "mileage": 43500,
        "mechanic_name": "Sam",
        "payment_status": "partial",
        "paid_amount": 400,
        "discount_amount": 50,
        "items": [
            {
                "description": "Oil Filter",
                "item_type": "part",
                "quantity": 2,
                "rate": 150,
                // Tampered client-side amount; the server must ignore it
                "amount": 9999
            },
            {
                "description": "Labor",
                "item_type": "labor",
                "quantity": 1,
                "rate": 300,
                "amount": 1
            }
        ]
    })
}

#[tokio::test]
async fn create_invoice_computes_totals_and_ignores_client_amounts() {
    let app = TestApp::new().await;
    let token = app.seed_user_with_role("manager").await;
    let (customer_id, vehicle_id) = app.seed_customer_and_vehicle(&token).await;

    let (status, invoice) = app
        .post(
            "/api/v1/invoices",
            &token,
            oil_change_payload(&customer_id, &vehicle_id),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {invoice}");

    // Totals follow the invariants, not the client-supplied amounts
    assert_eq!(decimal_field(&invoice, "parts_total"), dec!(300));
    assert_eq!(decimal_field(&invoice, "labor_total"), dec!(300));
    assert_eq!(decimal_field(&invoice, "grand_total"), dec!(550));
    assert_eq!(decimal_field(&invoice, "balance_amount"), dec!(150));

    // Every persisted item carries amount == quantity * rate
    let items = invoice["items"].as_array().expect("items array");
    assert_eq!(items.len(), 2);
    for item in items {
        let quantity = decimal_field(item, "quantity");
        let rate = decimal_field(item, "rate");
        assert_eq!(decimal_field(item, "amount"), quantity * rate);
    }

    // The part-type line was linked to the catalog; labor was not
    let part_line = items
        .iter()
        .find(|i| i["item_type"] == "part")
        .expect("part line");
    assert!(part_line["part_id"].is_string());
    let labor_line = items
        .iter()
        .find(|i| i["item_type"] == "labor")
        .expect("labor line");
    assert!(labor_line["part_id"].is_null());
}

#[tokio::test]
async fn catalog_resolution_is_idempotent_across_invoices() {
    let app = TestApp::new().await;
    let token = app.seed_user_with_role("manager").await;
    let (customer_id, vehicle_id) = app.seed_customer_and_vehicle(&token).await;

    let (status, first) = app
        .post(
            "/api/v1/invoices",
            &token,
            oil_change_payload(&customer_id, &vehicle_id),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Exactly one catalog entry was created for the unmatched description,
    // seeded from the item's own fields
    let (status, parts) = app.get("/api/v1/parts/search?q=oil%20filter", &token).await;
    assert_eq!(status, StatusCode::OK);
    let parts = parts.as_array().expect("parts array");
    assert_eq!(parts.len(), 1, "expected one catalog entry: {parts:?}");
    assert_eq!(parts[0]["name"], "Oil Filter");
    assert_eq!(parts[0]["category"], "General");
    assert_eq!(decimal_field(&parts[0], "rate"), dec!(150));

    // Resolving the same description again (different case) reuses the entry
    let (status, second) = app
        .post(
            "/api/v1/invoices",
            &token,
            json!({
                "customer_id": customer_id,
                "vehicle_id": vehicle_id,
                "items": [
                    { "description": "OIL FILTER", "item_type": "part", "quantity": 1, "rate": 150 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let first_part_id = first["items"][0]["part_id"].as_str().unwrap();
    let second_part_id = second["items"][0]["part_id"].as_str().unwrap();
    assert_eq!(first_part_id, second_part_id);

    let (_, parts) = app.get("/api/v1/parts/search?q=oil%20filter", &token).await;
    assert_eq!(parts.as_array().unwrap().len(), 1, "no duplicate was created");
}

#[tokio::test]
async fn update_replaces_items_wholesale_and_recomputes_totals() {
    let app = TestApp::new().await;
    let token = app.seed_user_with_role("manager").await;
    let (customer_id, vehicle_id) = app.seed_customer_and_vehicle(&token).await;

    let (_, created) = app
        .post(
            "/api/v1/invoices",
            &token,
            oil_change_payload(&customer_id, &vehicle_id),
        )
        .await;
    let invoice_id = created["id"].as_str().unwrap();

    let (status, updated) = app
        .put(
            &format!("/api/v1/invoices/{invoice_id}"),
            &token,
            json!({
                "customer_id": customer_id,
                "vehicle_id": vehicle_id,
                "payment_status": "unpaid",
                "paid_amount": 0,
                "discount_amount": 0,
                "items": [
                    { "description": "Brake Pads", "item_type": "part", "quantity": "4", "rate": "89.99" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "update failed: {updated}");

    // None of the pre-update items remain
    let items = updated["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["description"], "Brake Pads");

    // Totals were recomputed from the replacement set
    assert_eq!(decimal_field(&updated, "parts_total"), dec!(359.96));
    assert_eq!(decimal_field(&updated, "labor_total"), dec!(0));
    assert_eq!(decimal_field(&updated, "grand_total"), dec!(359.96));
    assert_eq!(decimal_field(&updated, "balance_amount"), dec!(359.96));

    // A fresh read agrees with the update response
    let (_, fetched) = app
        .get(&format!("/api/v1/invoices/{invoice_id}"), &token)
        .await;
    assert_eq!(fetched["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal_field(&fetched, "grand_total"), dec!(359.96));
}

#[tokio::test]
async fn validation_rejects_bad_requests_before_any_write() {
    let app = TestApp::new().await;
    let token = app.seed_user_with_role("manager").await;
    let (customer_id, vehicle_id) = app.seed_customer_and_vehicle(&token).await;

    // Empty item list
    let (status, body) = app
        .post(
            "/api/v1/invoices",
            &token,
            json!({
                "customer_id": customer_id,
                "vehicle_id": vehicle_id,
                "items": []
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");

    // Unknown vehicle reference
    let (status, _) = app
        .post(
            "/api/v1/invoices",
            &token,
            json!({
                "customer_id": customer_id,
                "vehicle_id": Uuid::new_v4(),
                "items": [ { "description": "Oil", "quantity": 1, "rate": 10 } ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown payment status
    let (status, _) = app
        .post(
            "/api/v1/invoices",
            &token,
            json!({
                "customer_id": customer_id,
                "vehicle_id": vehicle_id,
                "payment_status": "settled",
                "items": [ { "description": "Oil", "quantity": 1, "rate": 10 } ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was persisted by the rejected requests
    let (_, listing) = app.get("/api/v1/invoices", &token).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn failed_item_insert_rolls_back_the_header() {
    let app = TestApp::new().await;
    let token = app.seed_user_with_role("manager").await;
    let (customer_id, vehicle_id) = app.seed_customer_and_vehicle(&token).await;

    // Break the items table so the bulk insert fails after the header insert
    app.state
        .db
        .execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "DROP TABLE invoice_items;".to_string(),
        ))
        .await
        .expect("drop should succeed");

    let request = CreateInvoiceRequest {
        customer_id: Uuid::parse_str(&customer_id).unwrap(),
        vehicle_id: Uuid::parse_str(&vehicle_id).unwrap(),
        invoice_date: None,
        mileage: None,
        mechanic_name: None,
        notes: None,
        payment_method: None,
        payment_status: None,
        paid_amount: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        items: vec![NewInvoiceItem {
            description: Some("Oil Filter".to_string()),
            category: None,
            quantity: dec!(1),
            unit: None,
            rate: dec!(150),
            item_type: Some("part".to_string()),
        }],
    };

    let result = app
        .state
        .services
        .invoices
        .create_invoice(request, None)
        .await;
    assert!(result.is_err(), "creation must fail without an items table");

    // The header created in the same call must not remain queryable
    let headers = autoshop_api::entities::invoice::Entity::find()
        .all(&*app.state.db)
        .await
        .expect("header table is intact");
    assert!(headers.is_empty(), "orphaned header survived the rollback");
}

#[tokio::test]
async fn delete_removes_invoice_and_items() {
    let app = TestApp::new().await;
    let token = app.seed_user_with_role("admin").await;
    let (customer_id, vehicle_id) = app.seed_customer_and_vehicle(&token).await;

    let (_, created) = app
        .post(
            "/api/v1/invoices",
            &token,
            oil_change_payload(&customer_id, &vehicle_id),
        )
        .await;
    let invoice_id = created["id"].as_str().unwrap();

    let (status, _) = app
        .delete(&format!("/api/v1/invoices/{invoice_id}"), &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .get(&format!("/api/v1/invoices/{invoice_id}"), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let orphans = autoshop_api::entities::invoice_item::Entity::find()
        .all(&*app.state.db)
        .await
        .unwrap();
    assert!(orphans.is_empty(), "items must not outlive their invoice");
}

#[tokio::test]
async fn last_invoice_and_print_views() {
    let app = TestApp::new().await;
    let token = app.seed_user_with_role("manager").await;
    let (customer_id, vehicle_id) = app.seed_customer_and_vehicle(&token).await;

    // No invoices yet for this vehicle
    let (status, _) = app
        .get(
            &format!("/api/v1/invoices/last?vehicle_id={vehicle_id}"),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, first) = app
        .post(
            "/api/v1/invoices",
            &token,
            oil_change_payload(&customer_id, &vehicle_id),
        )
        .await;
    let (_, second) = app
        .post(
            "/api/v1/invoices",
            &token,
            json!({
                "customer_id": customer_id,
                "vehicle_id": vehicle_id,
                "invoice_date": "2026-04-02T10:00:00Z",
                "items": [
                    { "description": "Coolant", "item_type": "part", "quantity": 1, "rate": 24 }
                ]
            }),
        )
        .await;
    assert!(first["id"].is_string() && second["id"].is_string());

    let (status, last) = app
        .get(
            &format!("/api/v1/invoices/last?vehicle_id={vehicle_id}"),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // The invoice with the most recent invoice_date wins
    let expected_last = if first["invoice_date"].as_str() > second["invoice_date"].as_str() {
        &first
    } else {
        &second
    };
    assert_eq!(last["id"], expected_last["id"]);

    // Print payload expands customer and vehicle
    let invoice_id = first["id"].as_str().unwrap();
    let (status, print) = app
        .get(&format!("/api/v1/invoices/{invoice_id}/print"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(print["invoice"]["id"], first["id"]);
    assert_eq!(print["customer"]["name"], "Jordan Driver");
    assert_eq!(print["vehicle"]["registration_no"], "WS-1234");
}
