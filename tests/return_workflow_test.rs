//! End-to-end tests for the return workflow over HTTP.
//!
//! Tests cover:
//! - Submission, warehouse approval and manager approval with the credit PO
//! - Rejection and terminal statuses
//! - Role gating and per-user visibility
//! - Listing filters and their warnings
//! - CSV export and analytics

mod common;

use std::str::FromStr;

use axum::http::{header, Method, StatusCode};
use common::{response_bytes, response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn return_payload(items: &[(&str, &str)]) -> Value {
    json!({
        "date_submitted": "2024-05-06",
        "order_number": "SO-1001",
        "customer_name": "Harbor Deli",
        "date_shipped": "2024-05-01",
        "return_type": "Credit",
        "additional_notes": "Short-dated, customer refused",
        "items": items
            .iter()
            .enumerate()
            .map(|(i, (price, qty))| json!({
                "product_code": format!("P-{}", i + 1),
                "product_desc": "Smoked ham, sliced",
                "price_per_unit": price,
                "quantity": qty,
                "reason_for_return": "Damaged"
            }))
            .collect::<Vec<_>>(),
    })
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

async fn submit(app: &TestApp, items: &[(&str, &str)]) -> i64 {
    let response = app
        .request_as(
            &app.sales,
            Method::POST,
            "/api/v1/returns",
            Some(return_payload(items)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    body["data"]["return"]["id"].as_i64().expect("return id")
}

async fn status_of(app: &TestApp, id: i64) -> String {
    let response = app
        .request_as(&app.manager, Method::GET, &format!("/api/v1/returns/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    body["data"]["return"]["status"]
        .as_str()
        .expect("status")
        .to_string()
}

// ==================== Happy path ====================

#[tokio::test]
async fn submission_through_manager_approval_produces_credit_po() {
    let app = TestApp::new().await;

    let response = app
        .request_as(
            &app.sales,
            Method::POST,
            "/api/v1/returns",
            Some(return_payload(&[("5.00", "5")])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["return"]["status"], "Pending");
    assert_eq!(body["data"]["return"]["rep_name"], "Sam Sales");
    assert_eq!(decimal(&body["data"]["total_credit"]), dec!(25.00));
    assert_eq!(decimal(&body["data"]["items"][0]["credit_amount"]), dec!(25.00));
    let id = body["data"]["return"]["id"].as_i64().unwrap();

    let response = app
        .request_as(
            &app.warehouse,
            Method::POST,
            &format!("/api/v1/returns/{id}/approve-warehouse"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["return"]["status"], "WH Approved");
    assert_eq!(body["data"]["previous_status"], "Pending");
    assert_eq!(body["data"]["return"]["wh_approved_by"], app.warehouse.id);

    let response = app
        .request_as(
            &app.manager,
            Method::POST,
            &format!("/api/v1/returns/{id}/approve-manager"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(headers["x-return-status"], "Approved");
    assert_eq!(headers["x-total-credit"], "25.00");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(&format!("credit_po_{id}.pdf")));
    let pdf = response_bytes(response).await;
    assert!(pdf.starts_with(b"%PDF"));

    let response = app
        .request_as(&app.sales, Method::GET, &format!("/api/v1/returns/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let record = &body["data"]["return"];
    assert_eq!(record["status"], "Approved");
    assert_eq!(record["wh_approved_by"], app.warehouse.id);
    assert_eq!(record["mgr_approved_by"], app.manager.id);
    assert!(record["mgr_approved_at"].is_string());
    assert_eq!(decimal(&body["data"]["total_credit"]), dec!(25.00));
}

#[tokio::test]
async fn credit_is_rounded_per_item_and_summed() {
    let app = TestApp::new().await;
    let response = app
        .request_as(
            &app.sales,
            Method::POST,
            "/api/v1/returns",
            Some(return_payload(&[("12.345", "1"), ("0.125", "3"), ("3.33", "0.5")])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let items = body["data"]["items"].as_array().unwrap();
    let credits: Vec<Decimal> = items.iter().map(|i| decimal(&i["credit_amount"])).collect();
    assert_eq!(credits, vec![dec!(12.35), dec!(0.38), dec!(1.67)]);
    assert_eq!(decimal(&body["data"]["total_credit"]), dec!(14.40));
}

#[tokio::test]
async fn return_form_pdf_is_available_at_any_status() {
    let app = TestApp::new().await;
    let id = submit(&app, &[("2.50", "4")]).await;

    let response = app
        .request_as(&app.sales, Method::GET, &format!("/api/v1/returns/{id}/pdf"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("inline"));
    assert!(disposition.contains(&format!("return_{id}.pdf")));
    assert!(response_bytes(response).await.starts_with(b"%PDF"));
}

// ==================== Illegal transitions ====================

#[tokio::test]
async fn manager_cannot_skip_warehouse_step() {
    let app = TestApp::new().await;
    let id = submit(&app, &[("5.00", "5")]).await;

    let response = app
        .request_as(
            &app.manager,
            Method::POST,
            &format!("/api/v1/returns/{id}/approve-manager"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(status_of(&app, id).await, "Pending");
}

#[tokio::test]
async fn second_warehouse_approval_conflicts() {
    let app = TestApp::new().await;
    let id = submit(&app, &[("1.00", "1")]).await;
    let uri = format!("/api/v1/returns/{id}/approve-warehouse");

    let first = app.request_as(&app.warehouse, Method::POST, &uri, None).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.request_as(&app.warehouse, Method::POST, &uri, None).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(status_of(&app, id).await, "WH Approved");
}

#[tokio::test]
async fn rejection_keeps_warehouse_stamp_and_is_final() {
    let app = TestApp::new().await;
    let id = submit(&app, &[("4.00", "2")]).await;

    app.request_as(
        &app.warehouse,
        Method::POST,
        &format!("/api/v1/returns/{id}/approve-warehouse"),
        None,
    )
    .await;

    let response = app
        .request_as(
            &app.manager,
            Method::POST,
            &format!("/api/v1/returns/{id}/reject"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let record = &body["data"]["return"];
    assert_eq!(record["status"], "Rejected");
    assert_eq!(record["approved_by"], app.manager.id);
    assert_eq!(record["wh_approved_by"], app.warehouse.id);
    assert!(record["mgr_approved_by"].is_null());

    for action in ["approve-manager", "reject"] {
        let response = app
            .request_as(
                &app.manager,
                Method::POST,
                &format!("/api/v1/returns/{id}/{action}"),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT, "{action}");
    }
}

#[tokio::test]
async fn unknown_return_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request_as(
            &app.warehouse,
            Method::POST,
            "/api/v1/returns/999/approve-warehouse",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ==================== Access control ====================

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/returns", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn roles_are_enforced_per_action() {
    let app = TestApp::new().await;
    let id = submit(&app, &[("5.00", "1")]).await;

    let cases = [
        (&app.sales, format!("/api/v1/returns/{id}/approve-warehouse")),
        (&app.manager, format!("/api/v1/returns/{id}/approve-warehouse")),
        (&app.warehouse, format!("/api/v1/returns/{id}/approve-manager")),
        (&app.sales, format!("/api/v1/returns/{id}/reject")),
    ];
    for (user, uri) in cases {
        let response = app.request_as(user, Method::POST, &uri, None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {uri}", user.role);
    }

    let response = app
        .request_as(
            &app.warehouse,
            Method::POST,
            "/api/v1/returns",
            Some(return_payload(&[("1.00", "1")])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(status_of(&app, id).await, "Pending");
}

#[tokio::test]
async fn sales_users_only_see_their_own_returns() {
    let app = TestApp::new().await;
    let id = submit(&app, &[("5.00", "1")]).await;

    let response = app
        .request_as(&app.other_sales, Method::GET, &format!("/api/v1/returns/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request_as(&app.other_sales, Method::GET, "/api/v1/returns", None)
        .await;
    let body = response_json(response).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let response = app
        .request_as(&app.warehouse, Method::GET, "/api/v1/returns", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn submission_without_items_is_rejected() {
    let app = TestApp::new().await;
    let mut payload = return_payload(&[]);
    payload["items"] = json!([]);
    let response = app
        .request_as(&app.sales, Method::POST, "/api/v1/returns", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_as(
            &app.sales,
            Method::POST,
            "/api/v1/returns",
            Some(return_payload(&[("5.00", "0")])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_amounts_are_a_bad_request() {
    let app = TestApp::new().await;
    for (price, qty) in [
        ("40000000000000000000000000000", "2"),
        ("1000000000.01", "1"),
        ("1", "1000001"),
    ] {
        let response = app
            .request_as(
                &app.sales,
                Method::POST,
                "/api/v1/returns",
                Some(return_payload(&[(price, qty)])),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{price} x {qty}");
    }

    let response = app
        .request_as(&app.manager, Method::GET, "/api/v1/returns", None)
        .await;
    let body = response_json(response).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn money_fields_keep_two_decimal_places() {
    let app = TestApp::new().await;
    let id = submit(&app, &[("12.50", "1"), ("3", "2")]).await;

    let response = app
        .request_as(&app.sales, Method::GET, &format!("/api/v1/returns/{id}"), None)
        .await;
    let body = response_json(response).await;
    let items = &body["data"]["items"];
    assert_eq!(items[0]["price_per_unit"], "12.50");
    assert_eq!(items[0]["credit_amount"], "12.50");
    assert_eq!(items[1]["price_per_unit"], "3.00");
    assert_eq!(items[1]["credit_amount"], "6.00");
    assert_eq!(body["data"]["total_credit"], "18.50");
}

// ==================== Listing ====================

#[tokio::test]
async fn listing_filters_by_bucket_and_reports_bad_dates() {
    let app = TestApp::new().await;
    let kept = submit(&app, &[("1.00", "1")]).await;
    let rejected = submit(&app, &[("1.00", "1")]).await;
    app.request_as(
        &app.warehouse,
        Method::POST,
        &format!("/api/v1/returns/{rejected}/reject"),
        None,
    )
    .await;

    let response = app
        .request_as(&app.manager, Method::GET, "/api/v1/returns?status=rejected", None)
        .await;
    let body = response_json(response).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![rejected]);

    let response = app
        .request_as(
            &app.manager,
            Method::GET,
            "/api/v1/returns?status=pending&from=2024-13-40&to=2024-05-06",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![kept]);
    assert_eq!(body["warnings"][0], "From date must be YYYY-MM-DD");

    let response = app
        .request_as(&app.manager, Method::GET, "/api/v1/returns?to=2024-05-05", None)
        .await;
    let body = response_json(response).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    assert!(body.get("warnings").is_none());
}

#[tokio::test]
async fn approval_queue_lists_undecided_returns_oldest_first() {
    let app = TestApp::new().await;
    let first = submit(&app, &[("1.00", "1")]).await;
    let second = submit(&app, &[("1.00", "1")]).await;
    let decided = submit(&app, &[("1.00", "1")]).await;
    app.request_as(
        &app.warehouse,
        Method::POST,
        &format!("/api/v1/returns/{decided}/reject"),
        None,
    )
    .await;
    app.request_as(
        &app.warehouse,
        Method::POST,
        &format!("/api/v1/returns/{second}/approve-warehouse"),
        None,
    )
    .await;

    let response = app
        .request_as(&app.manager, Method::GET, "/api/v1/approvals", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![first, second]);

    let response = app
        .request_as(&app.sales, Method::GET, "/api/v1/approvals", None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ==================== Export and analytics ====================

#[tokio::test]
async fn csv_export_has_one_row_per_item() {
    let app = TestApp::new().await;
    submit(&app, &[("5.00", "5"), ("1.10", "2")]).await;

    let response = app
        .request_as(&app.manager, Method::GET, "/api/v1/returns/export.csv", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let csv = String::from_utf8(response_bytes(response).await).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("return_id,date_created,date_submitted"));
    assert!(lines[1].contains("sam@acme.test"));
    assert!(lines[1].contains("\"Short-dated, customer refused\""));

    let response = app
        .request_as(&app.warehouse, Method::GET, "/api/v1/returns/export.csv", None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn analytics_summary_counts_every_status() {
    let app = TestApp::new().await;
    submit(&app, &[("5.00", "5")]).await;
    let rejected = submit(&app, &[("2.00", "1")]).await;
    app.request_as(
        &app.warehouse,
        Method::POST,
        &format!("/api/v1/returns/{rejected}/reject"),
        None,
    )
    .await;

    let response = app
        .request_as(&app.warehouse, Method::GET, "/api/v1/analytics/summary", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let summary = &body["data"];
    assert_eq!(summary["total_returns"], 2);
    assert_eq!(decimal(&summary["total_credit"]), dec!(27.00));
    assert_eq!(summary["by_status"].as_array().unwrap().len(), 4);

    let response = app
        .request_as(&app.sales, Method::GET, "/api/v1/analytics/summary", None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ==================== Service endpoints ====================

#[tokio::test]
async fn status_and_health_are_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
