//! Mail relay delivery against a mock HTTP relay.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{response_json, test_config, TestApp};
use return_desk::notifications::{
    Attachment, NoticeEvent, NotificationError, Notifier, MailRelayNotifier, ReturnNotice,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("api:key-123")
const BASIC_AUTH: &str = "Basic YXBpOmtleS0xMjM=";

fn notice() -> ReturnNotice {
    ReturnNotice {
        recipient: "sam@acme.test".to_string(),
        subject: "Return #7 - Manager".to_string(),
        body: "Your return was approved.".to_string(),
        event: NoticeEvent::Manager,
        attachment: Some(Attachment::pdf("credit_po_7.pdf", b"%PDF-1.3 test".to_vec())),
    }
}

fn relay(server: &MockServer) -> MailRelayNotifier {
    MailRelayNotifier::new(
        format!("{}/messages", server.uri()),
        "key-123",
        "Returns <returns@acme.test>",
        Duration::from_secs(5),
    )
    .expect("relay client")
}

#[tokio::test]
async fn relay_receives_form_with_attachment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_string_contains("Return #7 - Manager"))
        .and(body_string_contains("sam@acme.test"))
        .and(body_string_contains("credit_po_7.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "<msg-1>"})))
        .expect(1)
        .mount(&server)
        .await;

    relay(&server).send(&notice()).await.expect("delivered");
}

#[tokio::test]
async fn relay_refusal_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = relay(&server).send(&notice()).await;
    assert_matches!(
        result,
        Err(NotificationError::Rejected { status: 401, ref body }) if body == "Forbidden"
    );
}

#[tokio::test]
async fn workflow_mails_each_step_through_the_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.mail.enabled = true;
    cfg.mail.relay_url = Some(format!("{}/messages", server.uri()));
    cfg.mail.api_key = Some("key-123".to_string());
    let app = TestApp::with_config(cfg).await;

    let response = app
        .request_as(
            &app.sales,
            Method::POST,
            "/api/v1/returns",
            Some(json!({
                "order_number": "SO-77",
                "customer_name": "Harbor Deli",
                "items": [{"product_code": "HAM-1", "price_per_unit": "5.00", "quantity": "5"}]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["notifications"]["sent"], 2);
    // No date was given, so the submission date defaulted with a warning.
    assert_eq!(body["warnings"][0], "Submission date must be YYYY-MM-DD");
    let id = body["data"]["return"]["id"].as_i64().unwrap();

    let response = app
        .request_as(
            &app.warehouse,
            Method::POST,
            &format!("/api/v1/returns/{id}/approve-warehouse"),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["notifications"]["sent"], 1);

    let response = app
        .request_as(
            &app.manager,
            Method::POST,
            &format!("/api/v1/returns/{id}/approve-manager"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-notices-sent"], "1");

    let requests = server.received_requests().await.expect("recorded requests");
    assert_eq!(requests.len(), 4);
    let last = String::from_utf8_lossy(&requests[3].body).to_string();
    assert!(last.contains(&format!("Return #{id} - Manager")));
    assert!(last.contains(&format!("credit_po_{id}.pdf")));
    assert!(last.contains("$25.00"));
}

#[tokio::test]
async fn relay_outage_does_not_fail_the_transition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.mail.enabled = true;
    cfg.mail.relay_url = Some(format!("{}/messages", server.uri()));
    cfg.mail.api_key = Some("key-123".to_string());
    let app = TestApp::with_config(cfg).await;

    let response = app
        .request_as(
            &app.sales,
            Method::POST,
            "/api/v1/returns",
            Some(json!({
                "date_submitted": "2024-05-06",
                "order_number": "SO-78",
                "customer_name": "Harbor Deli",
                "items": [{"product_code": "HAM-1", "price_per_unit": "1.00", "quantity": "1"}]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["return"]["status"], "Pending");
    assert_eq!(body["data"]["notifications"]["failed"], 2);
    assert_eq!(body["warnings"].as_array().unwrap().len(), 2);
}
