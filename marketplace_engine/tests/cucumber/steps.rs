use cucumber::{then, when};
use marketplace_engine::{
    db_types::{NewOrder, OrderStatusType, PayeeType},
    LedgerManagement,
    MarketplaceDatabase,
    MarketplaceError,
};
use mkt_common::{Distance, Money};

use crate::cucumber::MarketWorld;

fn parse_status(status: &str) -> OrderStatusType {
    status.parse().unwrap_or_else(|e| panic!("{e}"))
}

fn parse_money(amount: &str) -> Money {
    amount.parse().unwrap_or_else(|e| panic!("{amount} is not an amount. {e}"))
}

#[when(expr = "customer {string} starts order {string}")]
async fn start_order(world: &mut MarketWorld, customer: String, number: String) {
    world.draft = Some(NewOrder::new(number, customer));
}

#[when(expr = "the order contains {int} x {string} at {word}")]
async fn add_item(world: &mut MarketWorld, quantity: i64, sku: String, price: String) {
    let product_id = world.product(&sku);
    let draft = world.draft.take().expect("No order has been started");
    world.draft = Some(draft.with_item(product_id, quantity, parse_money(&price)));
}

#[when(expr = "the order is delivered by {string} over {word} km")]
async fn add_delivery(world: &mut MarketWorld, agent: String, distance: String) {
    let agent_id = world.payee(&agent);
    let distance = distance.parse::<Distance>().expect("Not a valid distance");
    let draft = world.draft.take().expect("No order has been started");
    world.draft = Some(draft.with_delivery(agent_id, Some(distance)));
}

#[when("the order is placed")]
async fn place_order(world: &mut MarketWorld) {
    let draft = world.draft.take().expect("No order has been started");
    let number = draft.order_number.clone();
    let order = world.flow().place_order(draft).await.expect("Error placing order");
    world.orders.insert(number, order.id);
}

#[when(expr = "order {string} moves through {string}")]
async fn move_through(world: &mut MarketWorld, number: String, path: String) {
    let id = world.order_id(&number);
    for status in path.split(',').map(parse_status) {
        let outcome = world
            .flow()
            .apply_order_transition(id, status)
            .await
            .unwrap_or_else(|e| panic!("Could not move order {number} to {status}. {e}"));
        world.last_outcome = Some(outcome);
    }
}

#[when(expr = "I try to move order {string} to {string}")]
async fn try_move(world: &mut MarketWorld, number: String, status: String) {
    let id = world.order_id(&number);
    match world.flow().apply_order_transition(id, parse_status(&status)).await {
        Ok(outcome) => {
            world.last_outcome = Some(outcome);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "order {string} is settled again")]
async fn settle_again(world: &mut MarketWorld, number: String) {
    let id = world.order_id(&number);
    let outcome = world.flow().settle_on_delivery(id).await.expect("Error settling order");
    assert!(outcome.already_settled, "A settled order must not be settled twice");
}

#[when(expr = "seller {string} is removed")]
async fn remove_seller(world: &mut MarketWorld, name: String) {
    let id = world.payee(&name);
    sqlx::query("DELETE FROM sellers WHERE id = $1")
        .bind(id)
        .execute(world.system().db.pool())
        .await
        .expect("Error removing seller");
}

#[when(expr = "seller {string} is restored")]
async fn restore_seller(world: &mut MarketWorld, name: String) {
    let id = world.payee(&name);
    sqlx::query("INSERT INTO sellers (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(&name)
        .execute(world.system().db.pool())
        .await
        .expect("Error restoring seller");
}

#[when("the reconciliation worker runs")]
async fn run_reconciliation(world: &mut MarketWorld) {
    world.reconciler().run_once().await.expect("Reconciliation failed");
}

#[then(expr = "order {string} is {string}")]
async fn order_status(world: &mut MarketWorld, number: String, status: String) {
    let order = world.order(&number).await;
    assert_eq!(order.status, parse_status(&status));
}

#[then(expr = "the transition fails, allowing {string}")]
async fn transition_failed(world: &mut MarketWorld, allowed: String) {
    let expected = allowed.split(',').map(parse_status).collect::<Vec<_>>();
    match world.last_error.take() {
        Some(MarketplaceError::InvalidTransition(e)) => assert_eq!(e.allowed, expected),
        Some(e) => panic!("Unexpected error: {e}"),
        None => panic!("The transition did not fail"),
    }
}

#[then(expr = "the transition fails for lack of stock")]
async fn out_of_stock(world: &mut MarketWorld) {
    let err = world.last_error.take().expect("The transition did not fail");
    assert!(matches!(err, MarketplaceError::InsufficientStock { .. }), "Unexpected error: {err}");
}

#[then(expr = "{string} has {int} available and {int} reserved")]
async fn stock_levels(world: &mut MarketWorld, sku: String, available: i64, reserved: i64) {
    let record = world.inventory().inventory(world.product(&sku)).await.expect("Error fetching inventory");
    assert_eq!(record.available_stock(), available);
    assert_eq!(record.reserved_stock, reserved);
}

#[then(expr = "order {string} has {int} commission records")]
async fn commission_count(world: &mut MarketWorld, number: String, count: usize) {
    let records = world.commissions().commissions_for_order(world.order_id(&number)).await.expect("Error");
    assert_eq!(records.len(), count);
}

async fn check_balance(world: &MarketWorld, payee_type: PayeeType, name: &str, amount: &str) {
    let id = world.payee(name);
    let expected = parse_money(amount);
    let ledger = world.commissions().ledger_balance(payee_type, id).await.expect("Error fetching ledger balance");
    assert_eq!(ledger, expected, "Ledger balance for {name}");
    let payee = world.system().db.fetch_payee(payee_type, id).await.expect("Error").expect("Payee has disappeared");
    assert_eq!(payee.balance, expected, "Cached balance for {name}");
}

#[then(expr = "seller {string} has a balance of {word}")]
async fn seller_balance(world: &mut MarketWorld, name: String, amount: String) {
    check_balance(world, PayeeType::Seller, &name, &amount).await;
}

#[then(expr = "delivery agent {string} has a balance of {word}")]
async fn agent_balance(world: &mut MarketWorld, name: String, amount: String) {
    check_balance(world, PayeeType::DeliveryAgent, &name, &amount).await;
}

#[then(expr = "seller {string} has {int} wallet transactions")]
async fn wallet_count(world: &mut MarketWorld, name: String, count: usize) {
    let txs = world
        .system()
        .db
        .fetch_wallet_transactions(PayeeType::Seller, world.payee(&name))
        .await
        .expect("Error fetching wallet transactions");
    assert_eq!(txs.len(), count);
}

#[then(expr = "there are {int} open settlement exceptions")]
async fn open_exceptions(world: &mut MarketWorld, count: usize) {
    let open = world.system().db.open_settlement_exceptions().await.expect("Error fetching exceptions");
    assert_eq!(open.len(), count);
}
