use std::str::FromStr;

use cucumber::{then, when};
use fulfillment_engine::{
    db_types::{ChangeType, NotificationType, OrderStatusType, Recipient, StatusChange, WebhookSource},
    helpers::{CallbackParams, SignedFields, WebhookPayload},
    FulfillmentError,
    InboundDelivery,
    OrderManagement,
    WebhookEventQueryFilter,
};
use serde_json::json;

use crate::cucumber::{world::TEST_TIMESTAMP, FulfillmentWorld};

const PROVIDER_IP: &str = "203.0.113.7";

fn sign(world: &FulfillmentWorld, payment_ref: &str, status: &str, amount: &str) -> String {
    let fields = SignedFields { payment_ref, status, amount, timestamp: TEST_TIMESTAMP };
    world.system().verifier.sign(&fields).expect("Error signing test notification")
}

async fn send_webhook(world: &mut FulfillmentWorld, status: &str, payment_ref: &str, amount: &str, signature: String) {
    let body = json!({
        "payment_ref": payment_ref,
        "transaction_id": format!("tx-{payment_ref}"),
        "status": status,
        "amount": amount,
        "timestamp": TEST_TIMESTAMP,
        "signature": signature,
        "event_type": "payment.updated",
    })
    .to_string();
    let delivery = InboundDelivery {
        source: WebhookSource::Webhook,
        remote_ip: Some(PROVIDER_IP.into()),
        notification: WebhookPayload::from_body(body.as_bytes()),
        raw_payload: body,
    };
    let outcome = world.system().webhooks.process(delivery).await;
    world.last_outcome = Some(outcome);
}

#[when(expr = "the provider sends a signed '{word}' webhook for '{word}' with amount {word}")]
async fn signed_webhook(world: &mut FulfillmentWorld, status: String, payment_ref: String, amount: String) {
    let signature = sign(world, &payment_ref, &status, &amount);
    send_webhook(world, &status, &payment_ref, &amount, signature).await;
}

#[when(expr = "the provider sends a '{word}' webhook for '{word}' with amount {word} signed for amount {word}")]
async fn tampered_webhook(
    world: &mut FulfillmentWorld,
    status: String,
    payment_ref: String,
    amount: String,
    signed: String,
) {
    let signature = sign(world, &payment_ref, &status, &signed);
    send_webhook(world, &status, &payment_ref, &amount, signature).await;
}

#[when(expr = "the provider redirects with a signed '{word}' callback for '{word}' with amount {word}")]
async fn signed_callback(world: &mut FulfillmentWorld, status: String, payment_ref: String, amount: String) {
    let signature = sign(world, &payment_ref, &status, &amount);
    let params = CallbackParams {
        payment_ref: Some(payment_ref.clone()),
        txn_id: Some(format!("tx-{payment_ref}")),
        status: Some(status.clone()),
        amount: Some(amount.clone()),
        ts: Some(TEST_TIMESTAMP.into()),
        sig: Some(signature.clone()),
        event_type: None,
    };
    let raw_payload = format!("ref={payment_ref}&status={status}&amount={amount}&ts={TEST_TIMESTAMP}&sig={signature}");
    let delivery = InboundDelivery {
        source: WebhookSource::Callback,
        remote_ip: Some(PROVIDER_IP.into()),
        raw_payload,
        notification: params.normalize(),
    };
    let outcome = world.system().webhooks.process(delivery).await;
    world.last_outcome = Some(outcome);
}

#[when(expr = "a webhook arrives with body {string}")]
async fn raw_webhook(world: &mut FulfillmentWorld, body: String) {
    let delivery = InboundDelivery {
        source: WebhookSource::Webhook,
        remote_ip: Some(PROVIDER_IP.into()),
        notification: WebhookPayload::from_body(body.as_bytes()),
        raw_payload: body,
    };
    let outcome = world.system().webhooks.process(delivery).await;
    world.last_outcome = Some(outcome);
}

#[when(expr = "operator '{word}' moves order '{word}' to '{word}'")]
async fn move_order(world: &mut FulfillmentWorld, operator: String, payment_ref: String, status: String) {
    let status = OrderStatusType::from_str(&status).expect("Not a valid order status");
    change_status(world, &payment_ref, status, StatusChange::by(operator)).await;
}

#[when(expr = "operator '{word}' ships order '{word}' with tracking number '{word}' via '{word}'")]
async fn ship_order(
    world: &mut FulfillmentWorld,
    operator: String,
    payment_ref: String,
    tracking: String,
    carrier: String,
) {
    let change = StatusChange::by(operator).with_tracking(tracking, Some(carrier));
    change_status(world, &payment_ref, OrderStatusType::Shipped, change).await;
}

async fn change_status(world: &mut FulfillmentWorld, payment_ref: &str, status: OrderStatusType, change: StatusChange) {
    let order = world.system().order(payment_ref).await;
    let result = world.system().orders.modify_status_for_order(order.id, status, change).await;
    world.last_error = result.err();
}

#[when(expr = "operator '{word}' adjusts product {int} by {int}")]
async fn adjust_stock(world: &mut FulfillmentWorld, operator: String, product_id: i64, delta: i64) {
    let result = world.system().inventory.adjust(product_id, delta, ChangeType::Manual, Some(operator), None).await;
    world.last_error = result.err();
}

#[then(expr = "the delivery outcome is '{word}'")]
async fn check_outcome(world: &mut FulfillmentWorld, code: String) {
    assert_eq!(world.last_outcome().code(), code, "Unexpected outcome: {}", world.last_outcome());
}

#[then(expr = "order '{word}' has status '{word}' and payment status '{word}'")]
async fn check_order_status(world: &mut FulfillmentWorld, payment_ref: String, status: String, payment: String) {
    let order = world.system().order(&payment_ref).await;
    assert_eq!(order.status.as_str(), status);
    assert_eq!(order.payment_status.as_str(), payment);
}

#[then(expr = "order '{word}' has {int} history entries")]
async fn check_history(world: &mut FulfillmentWorld, payment_ref: String, count: usize) {
    let order = world.system().order(&payment_ref).await;
    let history = world.system().queries.history(order.id).await.expect("Error fetching history");
    assert_eq!(history.len(), count, "{history:#?}");
}

#[then(expr = "order '{word}' was shipped with tracking number '{word}'")]
async fn check_tracking(world: &mut FulfillmentWorld, payment_ref: String, tracking: String) {
    let order = world.system().order(&payment_ref).await;
    assert_eq!(order.tracking_number.as_deref(), Some(tracking.as_str()));
    assert!(order.shipped_at.is_some());
}

#[then(expr = "the request is rejected as '{word}'")]
async fn check_rejected(world: &mut FulfillmentWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The request succeeded");
    let actual = match err {
        FulfillmentError::TransitionForbidden { .. } => "forbidden",
        FulfillmentError::TransitionNoOp(_) => "no-op",
        FulfillmentError::ConcurrentModification(_) => "conflict",
        FulfillmentError::InvalidQuantity(_) => "invalid-quantity",
        FulfillmentError::ProductNotFound(_) => "unknown-product",
        _ => "other",
    };
    assert_eq!(actual, kind, "Unexpected error: {err}");
}

#[then("the request succeeded")]
async fn check_succeeded(world: &mut FulfillmentWorld) {
    assert!(world.last_error.is_none(), "Unexpected error: {:?}", world.last_error);
}

#[then(expr = "product {int} has {int} units in stock")]
async fn check_stock(world: &mut FulfillmentWorld, product_id: i64, stock: i64) {
    let product =
        world.system().db.product_by_id(product_id).await.expect("Error fetching product").expect("No product");
    assert_eq!(product.stock, stock);
}

#[then(expr = "product {int} has {int} '{word}' stock change(s)")]
async fn check_change_count(world: &mut FulfillmentWorld, product_id: i64, count: usize, change_type: String) {
    let change_type = ChangeType::from_str(&change_type).expect("Not a valid change type");
    let changes = world.system().inventory.history(product_id).await.expect("Error fetching stock changes");
    let matching = changes.iter().filter(|c| c.change_type == change_type).count();
    assert_eq!(matching, count, "{changes:#?}");
}

#[then(expr = "the latest stock change for product {int} is {int} by '{word}'")]
async fn check_latest_change(world: &mut FulfillmentWorld, product_id: i64, amount: i64, actor: String) {
    let changes = world.system().inventory.history(product_id).await.expect("Error fetching stock changes");
    let latest = changes.first().expect("No stock changes");
    assert_eq!(latest.change_amount, amount);
    assert_eq!(latest.new_stock, latest.previous_stock + latest.change_amount);
    assert_eq!(latest.changed_by.as_deref(), Some(actor.as_str()));
}

#[then(expr = "the ledger has {int} entries for '{word}', {int} of them applied")]
async fn check_ledger(world: &mut FulfillmentWorld, count: usize, payment_ref: String, applied: usize) {
    let filter = WebhookEventQueryFilter::default().with_payment_ref(payment_ref);
    let entries = world.system().ledger.search(filter).await.expect("Error searching ledger");
    assert_eq!(entries.len(), count, "{entries:#?}");
    assert_eq!(entries.iter().filter(|e| e.processed).count(), applied);
}

#[then(expr = "the latest ledger entry has a {word} signature")]
async fn check_ledger_signature(world: &mut FulfillmentWorld, validity: String) {
    let entries = world.system().ledger.search(WebhookEventQueryFilter::default().with_limit(1)).await.expect("Error");
    let entry = entries.first().expect("The ledger is empty");
    assert_eq!(entry.signature_valid, validity == "valid");
    assert_eq!(entry.remote_ip.as_deref(), Some(PROVIDER_IP));
}

fn notification_type(name: &str) -> NotificationType {
    match name {
        "order_update" => NotificationType::OrderUpdate,
        "payment_failed" => NotificationType::PaymentFailed,
        "low_stock" => NotificationType::LowStock,
        "webhook_anomaly" => NotificationType::WebhookAnomaly,
        other => panic!("Unknown notification type {other}"),
    }
}

#[then(expr = "customer '{word}' has {int} notification(s)")]
async fn check_customer_notifications(world: &mut FulfillmentWorld, customer: String, count: usize) {
    let found = world.system().wait_for_notifications(&Recipient::Customer(customer), count).await;
    assert_eq!(found.len(), count, "{found:#?}");
}

#[then(expr = "customer '{word}' was told {string}")]
async fn check_customer_told(world: &mut FulfillmentWorld, customer: String, text: String) {
    let found = world.system().wait_for_notifications(&Recipient::Customer(customer), 1).await;
    assert!(found.iter().any(|n| n.title.contains(&text) || n.message.contains(&text)), "{found:#?}");
}

#[then(expr = "the operators have {int} '{word}' alert(s)")]
async fn check_operator_alerts(world: &mut FulfillmentWorld, count: usize, kind: String) {
    let kind = notification_type(&kind);
    let mut found = world.system().wait_for_notifications(&Recipient::Operators, count).await;
    found.retain(|n| n.notification_type == kind);
    assert_eq!(found.len(), count, "{found:#?}");
}
