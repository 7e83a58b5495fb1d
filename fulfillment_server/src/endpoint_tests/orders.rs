use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use fulfillment_engine::{
    db_types::{Order, OrderId, OrderItem, OrderStatusType, PaymentStatus, StatusHistoryEntry},
    OrderQueryApi,
};
use ofg_common::Money;
use serde_json::Value;

use super::{
    helpers::{operator_request, OPERATOR_TOKEN},
    mocks::{MockErr, MockOrderStore},
};
use crate::routes::{OrderByIdRoute, OrderHistoryRoute};

#[actix_web::test]
async fn fetch_order_with_items() {
    let _ = env_logger::try_init();
    let req = TestRequest::get().uri("/api/orders/42");
    let (status, body) = operator_request(req, Some(OPERATOR_TOKEN), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).expect("Response is not JSON");
    assert_eq!(order["id"], 42);
    assert_eq!(order["payment_ref"], "QRPH-1-42");
    assert_eq!(order["status"], "processing");
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["total"], 150_000);
    assert_eq!(order["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(order["items"][0]["quantity"], 2);
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init();
    let req = TestRequest::get().uri("/api/orders/7");
    let (status, body) = operator_request(req, Some(OPERATOR_TOKEN), None, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"Not found. Order #7 does not exist"}"#);
}

#[actix_web::test]
async fn fetch_order_history() {
    let _ = env_logger::try_init();
    let req = TestRequest::get().uri("/api/orders/42/history");
    let (status, body) = operator_request(req, Some(OPERATOR_TOKEN), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let history: Vec<StatusHistoryEntry> = serde_json::from_str(&body).expect("Response is not a history list");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, OrderStatusType::Pending);
    assert_eq!(history[1].status, OrderStatusType::Processing);
    assert_eq!(history[1].changed_by, None);
}

#[actix_web::test]
async fn backend_failures_are_server_errors() {
    let _ = env_logger::try_init();
    let req = TestRequest::get().uri("/api/orders/13");
    let (status, body) = operator_request(req, Some(OPERATOR_TOKEN), None, configure).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("disk on fire"), "Unexpected body: {body}");
}

#[actix_web::test]
async fn order_ids_must_be_numeric() {
    let _ = env_logger::try_init();
    let req = TestRequest::get().uri("/api/orders/QRPH-1-42");
    let (status, _) = operator_request(req, Some(OPERATOR_TOKEN), None, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn configure(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_order_by_id().returning(|id| match id.value() {
        42 => Ok(Some(order_42())),
        13 => Err(MockErr("disk on fire".into())),
        _ => Ok(None),
    });
    store.expect_order_items().returning(|order_id| {
        Ok(vec![OrderItem {
            id: 1,
            order_id,
            position: 0,
            product_id: 1,
            quantity: 2,
            unit_price: Money::from_major(750),
        }])
    });
    store.expect_status_history().returning(|order_id| {
        let entry = |id, status, payment_status| StatusHistoryEntry {
            id,
            order_id,
            status,
            payment_status,
            changed_by: None,
            note: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        };
        Ok(vec![
            entry(1, OrderStatusType::Pending, PaymentStatus::Pending),
            entry(2, OrderStatusType::Processing, PaymentStatus::Paid),
        ])
    });
    cfg.service(OrderByIdRoute::<MockOrderStore>::new())
        .service(OrderHistoryRoute::<MockOrderStore>::new())
        .app_data(web::Data::new(OrderQueryApi::new(store)));
}

fn order_42() -> Order {
    let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 55, 0).unwrap();
    Order {
        id: OrderId(42),
        customer_id: "ana".into(),
        customer_email: Some("ana@example.com".into()),
        status: OrderStatusType::Processing,
        payment_status: PaymentStatus::Paid,
        total: Money::from_major(1500),
        payment_ref: "QRPH-1-42".into(),
        tracking_number: None,
        carrier: None,
        shipped_at: None,
        delivered_at: None,
        created_at: created,
        updated_at: created,
    }
}
