use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use fulfillment_engine::{
    db_types::{OrderStatusType, PaymentStatus, WebhookEvent, WebhookSource},
    events::EventProducers,
    fe_api::webhook_ledger_api::DEFAULT_MAX_STORED_PAYLOAD,
    helpers::{DeploymentMode, SignatureVerifier, SignedFields},
    LowStockPolicy,
    OrderFlowApi,
    OrderManagement,
    PaymentWebhookApi,
    SqliteDatabase,
    WebhookEventQueryFilter,
    WebhookLedger,
    WebhookLedgerApi,
};
use ofg_common::Secret;
use serde_json::{json, Value};

use super::{
    helpers::{operator_request, public_request, seeded_database, OPERATOR_TOKEN},
    mocks::MockLedger,
};
use crate::{
    config::RouteConfig,
    data_objects::DeliveryResponse,
    routes::{PaymentCallbackRoute, PaymentWebhookRoute, WebhookEventsRoute},
};

const SECRET: &str = "whsec_endpoint_test";
const TIMESTAMP: &str = "2026-03-01T10:00:00Z";

fn verifier() -> SignatureVerifier {
    SignatureVerifier::new(Secret::new(SECRET.to_string()), DeploymentMode::Test)
}

fn sign(status: &str, amount: &str) -> String {
    let fields = SignedFields { payment_ref: "QRPH-1-42", status, amount, timestamp: TIMESTAMP };
    verifier().sign(&fields).expect("Error signing fields")
}

fn configure(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let producers = EventProducers::default();
        let api = PaymentWebhookApi::new(
            verifier(),
            WebhookLedgerApi::new(db.clone(), DEFAULT_MAX_STORED_PAYLOAD),
            OrderFlowApi::new(db, producers.clone(), LowStockPolicy::default()),
            producers,
        );
        let route_config = RouteConfig { use_x_forwarded_for: true, ..RouteConfig::default() };
        cfg.service(PaymentWebhookRoute::<SqliteDatabase>::new())
            .service(PaymentCallbackRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(route_config))
            .app_data(web::Data::new(api));
    }
}

fn webhook(body: String) -> TestRequest {
    TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(("Content-Type", "application/json"))
        .insert_header(("X-Forwarded-For", "203.0.113.7"))
        .set_payload(body)
}

fn outcome(body: &str) -> DeliveryResponse {
    serde_json::from_str(body).expect("Response is not a delivery response")
}

#[actix_web::test]
async fn signed_webhook_pays_the_order() {
    let db = seeded_database().await;
    let body = json!({
        "payment_ref": "QRPH-1-42",
        "transaction_id": "tx-42",
        "status": "success",
        "amount": 1500,
        "timestamp": TIMESTAMP,
        "signature": sign("success", "1500.00"),
    });
    let (status, body) = public_request(webhook(body.to_string()), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome(&body).outcome, "applied");

    let order = db.order_by_payment_ref("QRPH-1-42").await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.status, OrderStatusType::Processing);
    let events = db.search_webhook_events(WebhookEventQueryFilter::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].remote_ip.as_deref(), Some("203.0.113.7"));
    assert!(events[0].processed);
}

#[actix_web::test]
async fn bad_signatures_are_unauthorized() {
    let db = seeded_database().await;
    // Signed for 1.00, claims 1500
    let body = json!({
        "payment_ref": "QRPH-1-42",
        "status": "success",
        "amount": "1500.00",
        "timestamp": TIMESTAMP,
        "signature": sign("success", "1.00"),
    });
    let (status, body) = public_request(webhook(body.to_string()), configure(db.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let res = outcome(&body);
    assert!(!res.received);
    assert_eq!(res.outcome, "signature_invalid");

    let order = db.order_by_payment_ref("QRPH-1-42").await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    let filter = WebhookEventQueryFilter::default().with_signature_valid(false);
    let events = db.search_webhook_events(filter).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[actix_web::test]
async fn unreadable_amounts_fail_verification() {
    let db = seeded_database().await;
    for amount in ["abc", "1,500", "1500.001"] {
        let body = json!({
            "payment_ref": "QRPH-1-42",
            "status": "success",
            "amount": amount,
            "timestamp": TIMESTAMP,
            "signature": sign("success", "1500.00"),
        });
        let (status, body) = public_request(webhook(body.to_string()), configure(db.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "amount {amount}: {body}");
        assert_eq!(outcome(&body).outcome, "signature_invalid");
    }
    let order = db.order_by_payment_ref("QRPH-1-42").await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    let filter = WebhookEventQueryFilter::default().with_signature_valid(false);
    let events = db.search_webhook_events(filter).await.unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.payment_ref.as_deref() == Some("QRPH-1-42") && e.claimed_amount.is_none()));
}

#[actix_web::test]
async fn malformed_bodies_are_bad_requests() {
    let db = seeded_database().await;
    let (status, body) = public_request(webhook(r#"{"status": "success"}"#.into()), configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(outcome(&body).outcome, "malformed");

    let (status, _) = public_request(webhook("not json at all".into()), configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let events = db.search_webhook_events(WebhookEventQueryFilter::default()).await.unwrap();
    assert_eq!(events.len(), 2, "Malformed deliveries are still audited");
}

#[actix_web::test]
async fn unknown_orders_are_acknowledged() {
    let db = seeded_database().await;
    let fields = SignedFields { payment_ref: "QRPH-9-99", status: "success", amount: "10.00", timestamp: TIMESTAMP };
    let body = json!({
        "payment_ref": "QRPH-9-99",
        "status": "success",
        "amount": 10,
        "timestamp": TIMESTAMP,
        "signature": verifier().sign(&fields).unwrap(),
    });
    let (status, body) = public_request(webhook(body.to_string()), configure(db)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome(&body).outcome, "unknown_order");
}

#[actix_web::test]
async fn callback_after_webhook_is_a_duplicate() {
    let db = seeded_database().await;
    let body = json!({
        "reference": "QRPH-1-42",
        "status": "success",
        "amount": 1500,
        "timestamp": TIMESTAMP,
        "signature": sign("success", "1500.00"),
    });
    let (status, _) = public_request(webhook(body.to_string()), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!(
        "/payments/callback?ref=QRPH-1-42&txn_id=tx-42&status=success&amount=1500.00&ts={}&sig={}",
        TIMESTAMP.replace(':', "%3A"),
        sign("success", "1500.00")
    );
    let (status, body) = public_request(TestRequest::get().uri(&uri), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["outcome"], "duplicate");

    let events = db
        .search_webhook_events(WebhookEventQueryFilter::default().with_payment_ref("QRPH-1-42"))
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events.iter().filter(|e| e.processed).count(), 1);
    assert!(events.iter().any(|e| e.source == WebhookSource::Callback && e.duplicate));
}

#[actix_web::test]
async fn audit_log_search() {
    let _ = env_logger::try_init();
    let req = TestRequest::get()
        .uri("/api/webhooks/events?payment_ref=QRPH-1-42&source=callback&signature_valid=false&limit=5");
    let (status, body) = operator_request(req, Some(OPERATOR_TOKEN), None, configure_audit).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let events: Vec<WebhookEvent> = serde_json::from_str(&body).expect("Response is not an event list");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, "signature_invalid");
}

#[actix_web::test]
async fn audit_log_rejects_bad_filters() {
    let _ = env_logger::try_init();
    let req = TestRequest::get().uri("/api/webhooks/events?source=carrier_pigeon");
    let (status, _) = operator_request(req, Some(OPERATOR_TOKEN), None, configure_audit).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn configure_audit(cfg: &mut ServiceConfig) {
    let mut ledger = MockLedger::new();
    ledger
        .expect_search_webhook_events()
        .withf(|f| {
            f.payment_ref.as_deref() == Some("QRPH-1-42") &&
                f.source == Some(WebhookSource::Callback) &&
                f.signature_valid == Some(false) &&
                f.processed.is_none() &&
                f.limit == Some(5)
        })
        .returning(|_| {
            Ok(vec![WebhookEvent {
                id: 3,
                source: WebhookSource::Callback,
                event_type: None,
                payment_ref: Some("QRPH-1-42".into()),
                transaction_id: Some("tx-42".into()),
                claimed_status: Some("success".into()),
                claimed_amount: None,
                signature_valid: false,
                processed: false,
                duplicate: false,
                outcome: "signature_invalid".into(),
                remote_ip: Some("203.0.113.7".into()),
                payload: "ref=QRPH-1-42&status=success".into(),
                received_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 5).unwrap(),
            }])
        });
    cfg.service(WebhookEventsRoute::<MockLedger>::new())
        .app_data(web::Data::new(WebhookLedgerApi::new(ledger, DEFAULT_MAX_STORED_PAYLOAD)));
}
