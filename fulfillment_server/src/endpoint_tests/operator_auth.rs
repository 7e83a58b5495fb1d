use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use fulfillment_engine::{
    db_types::{ChangeType, InventoryChange, Order, OrderId, OrderStatusType},
    events::EventProducers,
    InventoryApi,
    LowStockPolicy,
    OrderFlowApi,
    OrderManagement,
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{operator_request, seeded_database, OPERATOR_TOKEN};
use crate::{
    auth::ANONYMOUS_OPERATOR,
    config::RouteConfig,
    routes::{AdjustStockRoute, PlaceOrderRoute, UpdateOrderStatusRoute},
};

fn configure(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let producers = EventProducers::default();
        cfg.service(AdjustStockRoute::<SqliteDatabase>::new())
            .service(PlaceOrderRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(RouteConfig::default()))
            .app_data(web::Data::new(OrderFlowApi::new(db.clone(), producers.clone(), LowStockPolicy::default())))
            .app_data(web::Data::new(InventoryApi::new(db, producers, LowStockPolicy::default())));
    }
}

fn adjust(delta: i64) -> TestRequest {
    TestRequest::post().uri("/api/inventory/1/adjust").set_json(json!({ "delta": delta, "note": "recount" }))
}

fn move_order(body: serde_json::Value) -> TestRequest {
    TestRequest::patch().uri("/api/orders/1/status").set_json(body)
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let _ = env_logger::try_init();
    let db = seeded_database().await;
    let (status, body) = operator_request(adjust(5), None, None, configure(db.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "No operator token found.");
    let product = db.product_by_id(1).await.unwrap().unwrap();
    assert_eq!(product.stock, 18, "Nothing may change without a token");
}

#[actix_web::test]
async fn wrong_token_is_unauthorized() {
    let _ = env_logger::try_init();
    let db = seeded_database().await;
    let (status, body) = operator_request(adjust(5), Some("op-test-tokem"), None, configure(db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Invalid operator token.");
}

#[actix_web::test]
async fn adjustments_are_attributed_to_the_operator() {
    let _ = env_logger::try_init();
    let db = seeded_database().await;
    let (status, body) = operator_request(adjust(5), Some(OPERATOR_TOKEN), Some("op-7"), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let change: InventoryChange = serde_json::from_str(&body).expect("Response is not a stock change");
    assert_eq!(change.change_type, ChangeType::Manual);
    assert_eq!((change.previous_stock, change.new_stock), (18, 23));
    assert_eq!(change.changed_by.as_deref(), Some("op-7"));
    assert_eq!(change.note.as_deref(), Some("recount"));

    let (status, body) = operator_request(adjust(-50), Some(OPERATOR_TOKEN), None, configure(db)).await;
    assert_eq!(status, StatusCode::OK);
    let change: InventoryChange = serde_json::from_str(&body).unwrap();
    assert_eq!(change.new_stock, 0);
    assert_eq!(change.change_amount, -23);
    assert_eq!(change.changed_by.as_deref(), Some(ANONYMOUS_OPERATOR));
}

#[actix_web::test]
async fn operators_cannot_log_restorations() {
    let _ = env_logger::try_init();
    let db = seeded_database().await;
    let req =
        TestRequest::post().uri("/api/inventory/1/adjust").set_json(json!({ "delta": 2, "change_type": "restore" }));
    let (status, _) = operator_request(req, Some(OPERATOR_TOKEN), None, configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = TestRequest::post().uri("/api/inventory/1/adjust").set_json(json!({ "delta": 0 }));
    let (status, _) = operator_request(req, Some(OPERATOR_TOKEN), None, configure(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn orders_with_overflowing_totals_are_rejected() {
    let _ = env_logger::try_init();
    let db = seeded_database().await;
    let body = json!({
        "customer_id": "ben",
        "payment_ref": "QRPH-2-77",
        "items": [{ "product_id": 1, "quantity": 1_000_000_000i64, "unit_price": "100000000000.00" }],
    });
    let req = TestRequest::post().uri("/api/orders").set_json(body);
    let (status, body) = operator_request(req, Some(OPERATOR_TOKEN), None, configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(db.order_by_payment_ref("QRPH-2-77").await.unwrap().is_none());
    let product = db.product_by_id(1).await.unwrap().unwrap();
    assert_eq!(product.stock, 18);
}

#[actix_web::test]
async fn shipping_requires_a_tracking_number() {
    let _ = env_logger::try_init();
    let db = seeded_database().await;
    let id = Some("op-7");
    let (status, _) =
        operator_request(move_order(json!({"status": "processing"})), Some(OPERATOR_TOKEN), id, configure(db.clone()))
            .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        operator_request(move_order(json!({"status": "shipped"})), Some(OPERATOR_TOKEN), id, configure(db.clone()))
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("tracking number"));

    let req = move_order(json!({"status": "shipped", "tracking_number": "LBC123", "carrier": "LBC"}));
    let (status, body) = operator_request(req, Some(OPERATOR_TOKEN), id, configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Response is not an order");
    assert_eq!(order.status, OrderStatusType::Shipped);
    assert_eq!(order.tracking_number.as_deref(), Some("LBC123"));

    let history = db.status_history(OrderId(1)).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[1..].iter().all(|h| h.changed_by.as_deref() == Some("op-7")));
}

#[actix_web::test]
async fn forbidden_moves_are_conflicts() {
    let _ = env_logger::try_init();
    let db = seeded_database().await;
    let req = move_order(json!({"status": "delivered"}));
    let (status, body) = operator_request(req, Some(OPERATOR_TOKEN), None, configure(db.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("cannot move from pending to delivered"), "Unexpected body: {body}");
    let req = move_order(json!({"status": "pending"}));
    let (status, _) = operator_request(req, Some(OPERATOR_TOKEN), None, configure(db)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
