use cucumber::given;
use marketplace_engine::{
    db_types::{NewPayee, NewProduct, PayeeType},
    CatalogManagement,
};
use mkt_common::Rate;

use crate::cucumber::{market_world::MarketSystem, MarketWorld};

#[given("a fresh marketplace")]
async fn fresh_database(world: &mut MarketWorld) {
    let system = MarketSystem::new().await;
    world.system = Some(system);
}

async fn add_payee(world: &mut MarketWorld, payee_type: PayeeType, name: String, percent: Option<i64>) {
    let mut payee = NewPayee::new(name.clone());
    if let Some(p) = percent {
        payee = payee.with_rate(Rate::from_percent(p));
    }
    let payee = world.system().db.create_payee(payee_type, payee).await.expect("Error creating payee");
    world.payees.insert(name, payee.id);
}

#[given(expr = "a seller {string} with a {int}% commission rate")]
async fn seller_with_rate(world: &mut MarketWorld, name: String, percent: i64) {
    add_payee(world, PayeeType::Seller, name, Some(percent)).await;
}

#[given(expr = "a seller {string} with no commission rate")]
async fn seller_without_rate(world: &mut MarketWorld, name: String) {
    add_payee(world, PayeeType::Seller, name, None).await;
}

#[given(expr = "a delivery agent {string} with a {int}% commission rate")]
async fn agent_with_rate(world: &mut MarketWorld, name: String, percent: i64) {
    add_payee(world, PayeeType::DeliveryAgent, name, Some(percent)).await;
}

#[given(expr = "a product {string} sold by {string} with {int} in stock")]
async fn product(world: &mut MarketWorld, sku: String, seller: String, stock: i64) {
    let seller_id = world.payee(&seller);
    let product = NewProduct::new(sku.clone(), sku.clone(), seller_id).with_stock(stock);
    let product = world.catalog().add_product(product).await.expect("Error creating product");
    world.products.insert(sku, product.id);
}

#[given(expr = "the default commission rate is {int}%")]
async fn default_rate(world: &mut MarketWorld, percent: i64) {
    world.catalog().set_default_commission_rate(Rate::from_percent(percent)).await.expect("Error saving setting");
}

#[given(expr = "delivery commissions are charged at {word} per km")]
async fn distance_mode(world: &mut MarketWorld, rate: String) {
    let rate = rate.parse::<Rate>().expect("Not a valid rate");
    world.catalog().use_distance_delivery_commissions(rate).await.expect("Error saving setting");
}
