//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two should lean on the engine APIs
//! and the request objects in [`crate::data_objects`]. Keep this module neat and tidy 🙏
//!
//! Handlers never block. All database work is async, so a worker thread keeps serving other requests while a handler
//! waits on SQLite.
//!
//! There are two kinds of route:
//! * The provider channels, `/payments/webhook` and `/payments/callback`. These are public. Trust comes from the
//!   notification signature, which the engine checks.
//! * The operator API under `/api`. These require the operator token (see [`crate::middleware::OperatorAuthFactory`]).
use std::str::FromStr;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use fulfillment_engine::{
    db_types::{OrderId, OrderStatusType, Recipient, WebhookSource},
    helpers::{CallbackParams, MalformedEvent, WebhookPayload},
    DeliveryOutcome,
    FulfillmentDatabase,
    InboundDelivery,
    InventoryApi,
    NotificationApi,
    NotificationManagement,
    OrderFlowApi,
    OrderManagement,
    OrderQueryApi,
    PaymentWebhookApi,
    WebhookEventQueryFilter,
    WebhookLedger,
    WebhookLedgerApi,
};
use log::*;

use crate::{
    auth::OperatorIdentity,
    config::RouteConfig,
    data_objects::{
        DeliveryResponse,
        JsonResponse,
        NewOrderRequest,
        NotificationQuery,
        StatusUpdateRequest,
        StockAdjustmentRequest,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// `route!(name => Method "/path" impl TraitA, TraitB)` defines `NameRoute<B>`, which registers `name::<B>` where
// `B: TraitA + TraitB`.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//-----------------------------------------   Provider channels  ----------------------------------------------
route!(payment_webhook => Post "/payments/webhook" impl FulfillmentDatabase, OrderManagement, WebhookLedger);
/// The provider's webhook channel.
///
/// The body is JSON with `payment_ref` (or `reference`, or `transaction_id`), `status`, `amount`, `timestamp`,
/// `signature` and an optional `event_type`. The raw body is kept for the audit log exactly as received.
///
/// ## Returns
/// * 401 if the signature does not check out. Nothing is applied.
/// * 400 if the identifying fields are missing.
/// * 200 for everything else, including duplicates, unknown orders and processing errors. Anything the provider
///   should not retry is absorbed here, and operators are alerted instead.
pub async fn payment_webhook<B>(
    req: HttpRequest,
    body: web::Bytes,
    config: web::Data<RouteConfig>,
    api: web::Data<PaymentWebhookApi<B>>,
) -> HttpResponse
where
    B: FulfillmentDatabase + OrderManagement + WebhookLedger,
{
    let remote_ip = get_remote_ip(&req, config.use_x_forwarded_for, config.use_forwarded).map(|ip| ip.to_string());
    debug!("💻️ Received payment webhook from {}", remote_ip.as_deref().unwrap_or("unknown address"));
    let delivery = InboundDelivery {
        source: WebhookSource::Webhook,
        remote_ip,
        raw_payload: String::from_utf8_lossy(&body).into_owned(),
        notification: WebhookPayload::from_body(&body),
    };
    let outcome = api.process(delivery).await;
    delivery_response(&outcome)
}

route!(payment_callback => Get "/payments/callback" impl FulfillmentDatabase, OrderManagement, WebhookLedger);
/// The provider's redirect channel: `?ref=&txn_id=&status=&amount=&ts=&sig=`.
///
/// The query string goes through the same pipeline as a webhook body, and is answered the same way.
pub async fn payment_callback<B>(
    req: HttpRequest,
    config: web::Data<RouteConfig>,
    api: web::Data<PaymentWebhookApi<B>>,
) -> HttpResponse
where
    B: FulfillmentDatabase + OrderManagement + WebhookLedger,
{
    let remote_ip = get_remote_ip(&req, config.use_x_forwarded_for, config.use_forwarded).map(|ip| ip.to_string());
    debug!("💻️ Received payment callback from {}", remote_ip.as_deref().unwrap_or("unknown address"));
    let notification = web::Query::<CallbackParams>::from_query(req.query_string())
        .map_err(|e| MalformedEvent::new(None, format!("Unreadable callback query. {e}")))
        .and_then(|params| params.into_inner().normalize());
    let delivery = InboundDelivery {
        source: WebhookSource::Callback,
        remote_ip,
        raw_payload: req.query_string().to_string(),
        notification,
    };
    let outcome = api.process(delivery).await;
    delivery_response(&outcome)
}

fn delivery_response(outcome: &DeliveryOutcome) -> HttpResponse {
    let body = DeliveryResponse::from(outcome);
    match outcome {
        DeliveryOutcome::Malformed(_) => HttpResponse::BadRequest().json(body),
        DeliveryOutcome::SignatureInvalid => HttpResponse::Unauthorized().json(body),
        _ => HttpResponse::Ok().json(body),
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(place_order => Post "/orders" impl FulfillmentDatabase, OrderManagement);
/// Order intake. The storefront places orders here before sending the customer to the provider.
///
/// Stock for every item is taken when the order is placed. The order starts out `pending`, awaiting payment.
pub async fn place_order<B>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase + OrderManagement,
{
    let order = body.into_inner().into_new_order().map_err(ServerError::InvalidRequestBody)?;
    debug!("💻️ New order request for {} from {}", order.payment_ref, order.customer_id);
    let order = api.place_order(order).await.map_err(|e| {
        debug!("💻️ Could not place order. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<i64>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let order = api.order(order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_history => Get "/orders/{order_id}/history" impl OrderManagement);
/// The order's status history, oldest first.
pub async fn order_history<B: OrderManagement>(
    path: web::Path<i64>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET history for order {order_id}");
    let history = api.history(order_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(update_order_status => Patch "/orders/{order_id}/status" impl FulfillmentDatabase, OrderManagement);
/// Administrative status change.
///
/// Operators move orders along `processing → shipped → delivered`, or cancel them. The operator named in the
/// `ofg_operator_id` header is recorded as the author of the change.
/// *Note*: the HTTP method used for this endpoint is PATCH.
///
/// ## Parameters
/// * `status` - The target status.
/// * `tracking_number`, `carrier` - Recorded when shipping. The tracking number is mandatory for `shipped` unless
///   `OFG_REQUIRE_TRACKING_NUMBER` is false.
/// * `note` - Free text, kept in the history.
///
/// ## Returns
/// The updated order. Moves the state machine does not allow, and moves to the current status, are answered with 409.
pub async fn update_order_status<B>(
    path: web::Path<i64>,
    operator: OperatorIdentity,
    body: web::Json<StatusUpdateRequest>,
    config: web::Data<RouteConfig>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase + OrderManagement,
{
    let order_id = OrderId::from(path.into_inner());
    let request = body.into_inner();
    info!("💻️ {} requests order {order_id} be moved to {}", operator.as_str(), request.status);
    if request.status == OrderStatusType::Shipped && config.require_tracking_number && !request.has_tracking_number() {
        warn!("💻️ Order {order_id} cannot be marked as shipped without a tracking number");
        return Err(ServerError::InvalidRequestBody("A tracking number is required to ship an order.".into()));
    }
    let (status, change) = request.into_change(operator.as_str());
    let order = api.modify_status_for_order(order_id, status, change).await.map_err(|e| {
        debug!("💻️ Could not change the status of order {order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

//-------------------------------------------   Webhook audit  -------------------------------------------------
route!(webhook_events => Get "/webhooks/events" impl WebhookLedger);
/// Search the webhook audit log. Every delivery is in there, including rejected ones.
///
/// All query parameters are optional: `payment_ref`, `source` (webhook|callback), `signature_valid`, `processed`,
/// `duplicate`, `since`, `until` (RFC 3339) and `limit`. Results are newest first.
pub async fn webhook_events<B: WebhookLedger>(
    query: web::Query<WebhookEventQueryFilter>,
    api: web::Data<WebhookLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = query.into_inner();
    debug!("💻️ Webhook audit log search: {filter:?}");
    let events = api.search(filter).await?;
    Ok(HttpResponse::Ok().json(events))
}

//---------------------------------------------   Inventory  --------------------------------------------------
route!(adjust_stock => Post "/inventory/{product_id}/adjust" impl FulfillmentDatabase, OrderManagement);
/// Manual or bulk stock adjustment. Decrements stop at zero, and the returned change shows what was actually taken.
pub async fn adjust_stock<B>(
    path: web::Path<i64>,
    operator: OperatorIdentity,
    body: web::Json<StockAdjustmentRequest>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: FulfillmentDatabase + OrderManagement,
{
    let product_id = path.into_inner();
    let request = body.into_inner();
    let change_type = request.change_type().map_err(ServerError::InvalidRequestBody)?;
    info!("💻️ {} adjusts stock of product {product_id} by {}", operator.as_str(), request.delta);
    let change = api
        .adjust(product_id, request.delta, change_type, Some(operator.as_str().to_string()), request.note)
        .await
        .map_err(|e| {
            debug!("💻️ Could not adjust stock for product {product_id}. {e}");
            e
        })?;
    Ok(HttpResponse::Ok().json(change))
}

route!(stock_changes => Get "/inventory/{product_id}/changes" impl OrderManagement);
pub async fn stock_changes<B: OrderManagement>(
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ GET stock changes for product {product_id}");
    let changes = api.history(product_id).await?;
    Ok(HttpResponse::Ok().json(changes))
}

//-------------------------------------------   Notifications  ------------------------------------------------
route!(notifications => Get "/notifications/{recipient}" impl NotificationManagement);
/// In-app notifications, newest first. `{recipient}` is a customer id, or `operators` for the operator group.
/// Pass `unread_only=true` to skip notifications that have been read.
pub async fn notifications<B: NotificationManagement>(
    path: web::Path<String>,
    query: web::Query<NotificationQuery>,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let recipient =
        Recipient::from_str(&path.into_inner()).map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    debug!("💻️ GET notifications for {recipient}");
    let notifications = api.notifications_for(&recipient, query.unread_only).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

route!(mark_notification_read => Post "/notifications/{id}/read" impl NotificationManagement);
pub async fn mark_notification_read<B: NotificationManagement>(
    path: web::Path<i64>,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ Marking notification {id} as read");
    api.mark_read(id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Notification {id} marked as read."))))
}
