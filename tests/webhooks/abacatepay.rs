//! Tests for POST /webhook/abacatepay.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Value, json};
use tower::ServiceExt;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn flat_body(status: &str, token: &str) -> String {
    json!({ "status": status, "externalId": token }).to_string()
}

async fn deliver(ctx: &TestContext, query: &str, body: String) -> (StatusCode, Value) {
    let response = ctx.app().oneshot(webhook_request(query, body)).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

fn status_of(ctx: &TestContext, token: &str) -> OrderStatus {
    queries::get_order(&ctx.conn(), token).unwrap().unwrap().status
}

#[tokio::test]
async fn test_confirmed_payment_approves_once() {
    let ctx = TestContext::new();
    let order = create_test_order(&ctx.conn(), Plan::Basic, email_contact("a@b.com"));
    let body = flat_body("CONFIRMED", &order.token);

    let (status, json) = deliver(&ctx, "", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);
    assert_eq!(json["outcome"], "approved");

    let approved = queries::get_order(&ctx.conn(), &order.token).unwrap().unwrap();
    assert_eq!(approved.status, OrderStatus::Approved);
    assert!(approved.approved_at.is_some());

    // Identical redelivery
    let (status, json) = deliver(&ctx, "", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "already_approved");
    assert_eq!(status_of(&ctx, &order.token), OrderStatus::Approved);

    assert_eq!(ctx.notifier.count(), 1, "notification must not be sent twice");
}

#[tokio::test]
async fn test_notification_carries_page_url_and_email() {
    let ctx = TestContext::new();
    let order = create_test_order(&ctx.conn(), Plan::Premium, email_contact("ana@example.com"));

    deliver(&ctx, "", flat_body("PAID", &order.token)).await;

    let sent = ctx.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, order.token);
    assert_eq!(sent[0].1, format!("{}/p/{}", BASE_URL, order.token));
    assert_eq!(sent[0].2.as_deref(), Some("ana@example.com"));
}

#[tokio::test]
async fn test_pending_status_does_not_approve() {
    let ctx = TestContext::new();
    let order = create_test_order(&ctx.conn(), Plan::Basic, email_contact("a@b.com"));

    let (status, json) = deliver(&ctx, "", flat_body("PENDING", &order.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "not_paid");
    assert_eq!(status_of(&ctx, &order.token), OrderStatus::Pending);
    assert_eq!(ctx.notifier.count(), 0);
}

#[tokio::test]
async fn test_status_is_normalized() {
    let ctx = TestContext::new();
    let order = create_test_order(&ctx.conn(), Plan::Basic, email_contact("a@b.com"));

    let (_, json) = deliver(&ctx, "", flat_body("  paid ", &order.token)).await;
    assert_eq!(json["outcome"], "approved");
}

#[tokio::test]
async fn test_nested_billing_payload() {
    let ctx = TestContext::new();
    let order = create_test_order(&ctx.conn(), Plan::Basic, email_contact("a@b.com"));

    let body = json!({
        "event": "billing.paid",
        "devMode": false,
        "data": {
            "billing": {
                "id": "bill_123",
                "status": "PAID",
                "amount": 2990,
                "products": [{ "externalId": order.token, "quantity": 1 }]
            }
        }
    })
    .to_string();

    let (status, json) = deliver(&ctx, "", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "approved");
    assert_eq!(status_of(&ctx, &order.token), OrderStatus::Approved);
}

#[tokio::test]
async fn test_unknown_order_is_acknowledged() {
    let ctx = TestContext::new();
    let order = create_test_order(&ctx.conn(), Plan::Basic, email_contact("a@b.com"));

    let (status, json) = deliver(&ctx, "", flat_body("PAID", &gen_token())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "unknown_order");

    assert_eq!(ctx.order_count(), 1);
    assert_eq!(status_of(&ctx, &order.token), OrderStatus::Pending);
    assert_eq!(ctx.notifier.count(), 0);
}

#[tokio::test]
async fn test_unpaid_status_for_unknown_order_is_reported() {
    let ctx = TestContext::new();

    let (status, json) = deliver(&ctx, "", flat_body("PENDING", &gen_token())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "unknown_order");
    assert_eq!(ctx.order_count(), 0);
    assert_eq!(ctx.notifier.count(), 0);
}

#[tokio::test]
async fn test_missing_token_is_acknowledged() {
    let ctx = TestContext::new();

    let (status, json) = deliver(&ctx, "", json!({ "status": "PAID" }).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "missing_token");
}

#[tokio::test]
async fn test_invalid_json_is_acknowledged() {
    let ctx = TestContext::new();

    let (status, json) = deliver(&ctx, "", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["received"], true);
    assert_eq!(json["outcome"], "invalid_payload");
}

#[tokio::test]
async fn test_secret_mismatch_is_rejected_without_mutation() {
    let mut ctx = TestContext::new();
    ctx.state.webhook_secret = Some("s3cret".to_string());
    let order = create_test_order(&ctx.conn(), Plan::Basic, email_contact("a@b.com"));

    for query in ["", "?webhookSecret=wrong"] {
        let (status, _) = deliver(&ctx, query, flat_body("PAID", &order.token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "query {query:?}");
    }
    assert_eq!(status_of(&ctx, &order.token), OrderStatus::Pending);

    let (status, json) = deliver(&ctx, "?webhookSecret=s3cret", flat_body("PAID", &order.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "approved");
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_webhook() {
    let ctx = TestContext::with_notifier(RecordingNotifier {
        fail: true,
        ..Default::default()
    });
    let order = create_test_order(&ctx.conn(), Plan::Basic, email_contact("a@b.com"));

    let (status, json) = deliver(&ctx, "", flat_body("PAID", &order.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "approved");
    assert_eq!(status_of(&ctx, &order.token), OrderStatus::Approved);
    assert_eq!(ctx.notifier.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deliveries_approve_exactly_once() {
    let ctx = TestContext::new();
    let order = create_test_order(&ctx.conn(), Plan::Basic, email_contact("a@b.com"));

    let notice = Arc::new(PaymentNotice {
        token: Some(order.token.clone()),
        status: Some("PAID".to_string()),
    });

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = ctx.state.clone();
        let notice = notice.clone();
        handles.push(tokio::spawn(async move {
            process_payment_notice(&state, &notice).await.unwrap()
        }));
    }

    let mut approved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            WebhookOutcome::Approved => approved += 1,
            WebhookOutcome::AlreadyApproved => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(approved, 1);
    assert_eq!(ctx.notifier.count(), 1);
    assert_eq!(status_of(&ctx, &order.token), OrderStatus::Approved);
}
