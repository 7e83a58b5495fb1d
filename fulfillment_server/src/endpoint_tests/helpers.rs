use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use fulfillment_engine::{
    db_types::{NewOrder, NewOrderItem, NewProduct},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    LowStockPolicy,
    OrderFlowApi,
    SqliteDatabase,
};
use log::debug;
use ofg_common::{Money, Secret};

use crate::{auth::OPERATOR_TOKEN_HEADER, middleware::OperatorAuthFactory};

pub const OPERATOR_TOKEN: &str = "op-test-token";

/// Calls a route that sits outside the operator scope.
pub async fn public_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    (status, body)
}

/// Calls a route in the `/api` scope, behind the operator token middleware. `token` goes in the operator token
/// header if given.
pub async fn operator_request<F>(
    mut req: TestRequest,
    token: Option<&str>,
    operator_id: Option<&str>,
    configure: F,
) -> (StatusCode, String)
where
    F: FnOnce(&mut ServiceConfig),
{
    if let Some(token) = token {
        req = req.insert_header((OPERATOR_TOKEN_HEADER, token));
    }
    if let Some(id) = operator_id {
        req = req.insert_header((crate::auth::OPERATOR_ID_HEADER, id));
    }
    let scope = web::scope("/api")
        .wrap(OperatorAuthFactory::new(Secret::new(OPERATOR_TOKEN.to_string())))
        .configure(configure);
    let service = test::init_service(App::new().service(scope)).await;
    debug!("Making operator request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
            (status, body)
        },
        // Middleware errors are not turned into responses until they reach the HTTP dispatcher
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}

/// A migrated throw-away database with product 1 (20 units) and a pending order `QRPH-1-42` for 2 units at 750.00.
pub async fn seeded_database() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    let product = NewProduct { id: Some(1), name: "Barako beans 1kg".into(), stock: 20, low_stock_threshold: None };
    db.insert_product(product).await.expect("Error inserting product");
    let orders = OrderFlowApi::new(db.clone(), EventProducers::default(), LowStockPolicy::default());
    let order = NewOrder::new("ana", "QRPH-1-42", vec![NewOrderItem::new(1, 2, Money::from_major(750))])
        .with_email("ana@example.com");
    orders.place_order(order).await.expect("Error placing order");
    db
}
