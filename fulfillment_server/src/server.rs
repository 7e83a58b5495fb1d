use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use fulfillment_engine::{
    events::{EventHandlers, EventHooks, EventProducers, LogMessageSender, NotificationDispatcher},
    helpers::SignatureVerifier,
    InventoryApi,
    NotificationApi,
    OrderFlowApi,
    OrderQueryApi,
    PaymentWebhookApi,
    SqliteDatabase,
    WebhookLedgerApi,
};
use futures::future::join_all;
use log::{info, warn};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::OperatorAuthFactory,
    routes::{
        health,
        AdjustStockRoute,
        MarkNotificationReadRoute,
        NotificationsRoute,
        OrderByIdRoute,
        OrderHistoryRoute,
        PaymentCallbackRoute,
        PaymentWebhookRoute,
        PlaceOrderRoute,
        StockChangesRoute,
        UpdateOrderStatusRoute,
        WebhookEventsRoute,
    },
};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let mut hooks = EventHooks::default();
    let dispatcher = NotificationDispatcher::new(db.clone(), LogMessageSender, config.delivery.clone());
    hooks.add_handler(dispatcher.into_hook());
    let handlers = EventHandlers::new(config.event_buffer_size, hooks);
    let producers = handlers.producers();
    let handles = handlers.start_handlers();
    info!("📬️ Notification dispatcher is running");
    let srv = create_server_instance(config, db, producers)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    // The workers have dropped their producers by now, so the handlers finish once their queues are empty
    info!("📬️ Waiting for queued notifications to go out");
    if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, join_all(handles)).await.is_err() {
        warn!("📬️ Some notifications were still queued at shutdown and have been dropped");
    }
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let verifier = SignatureVerifier::new(config.webhook_secret.clone(), config.environment);
    let route_config = config.route_config();
    let srv = HttpServer::new(move || {
        let ledger_api = WebhookLedgerApi::new(db.clone(), config.max_stored_payload);
        let webhook_api = PaymentWebhookApi::new(
            verifier.clone(),
            WebhookLedgerApi::new(db.clone(), config.max_stored_payload),
            OrderFlowApi::new(db.clone(), producers.clone(), config.low_stock),
            producers.clone(),
        );
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone(), config.low_stock);
        let inventory_api = InventoryApi::new(db.clone(), producers.clone(), config.low_stock);
        let query_api = OrderQueryApi::new(db.clone());
        let notification_api = NotificationApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ofg::access_log"))
            .app_data(web::Data::new(route_config))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(inventory_api))
            .app_data(web::Data::new(query_api))
            .app_data(web::Data::new(notification_api));
        // Routes that require the operator token
        let operator_scope = web::scope("/api")
            .wrap(OperatorAuthFactory::new(config.operator_token.clone()))
            .service(PlaceOrderRoute::<SqliteDatabase>::new())
            .service(OrderHistoryRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(WebhookEventsRoute::<SqliteDatabase>::new())
            .service(AdjustStockRoute::<SqliteDatabase>::new())
            .service(StockChangesRoute::<SqliteDatabase>::new())
            .service(MarkNotificationReadRoute::<SqliteDatabase>::new())
            .service(NotificationsRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(PaymentWebhookRoute::<SqliteDatabase>::new())
            .service(PaymentCallbackRoute::<SqliteDatabase>::new())
            .service(operator_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
