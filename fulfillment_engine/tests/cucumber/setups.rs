use cucumber::given;
use fulfillment_engine::db_types::{NewOrder, NewOrderItem, NewProduct};
use ofg_common::Money;

use crate::cucumber::{FulfillmentSystem, FulfillmentWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut FulfillmentWorld) {
    let system = FulfillmentSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "product {int} '{word}' with {int} units in stock")]
async fn product_in_stock(world: &mut FulfillmentWorld, id: i64, name: String, stock: i64) {
    insert_product(world, id, name, stock, None).await;
}

#[given(expr = "product {int} '{word}' with {int} units in stock and an alert threshold of {int}")]
async fn product_with_threshold(world: &mut FulfillmentWorld, id: i64, name: String, stock: i64, threshold: i64) {
    insert_product(world, id, name, stock, Some(threshold)).await;
}

async fn insert_product(world: &mut FulfillmentWorld, id: i64, name: String, stock: i64, threshold: Option<i64>) {
    let product = NewProduct { id: Some(id), name, stock, low_stock_threshold: threshold };
    world.system().db.insert_product(product).await.expect("Error inserting product");
}

#[given(expr = "a pending order '{word}' for customer '{word}' with {int} units of product {int} at {word}")]
async fn pending_order(
    world: &mut FulfillmentWorld,
    payment_ref: String,
    customer: String,
    qty: i64,
    pid: i64,
    price: String,
) {
    let price = price.parse::<Money>().expect("Not a valid price");
    let order = NewOrder::new(customer.clone(), payment_ref, vec![NewOrderItem::new(pid, qty, price)])
        .with_email(format!("{customer}@example.com"));
    world.system().orders.place_order(order).await.expect("Error placing order");
}
