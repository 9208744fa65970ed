use std::time::Duration;

use marketplace_engine::{
    db_types::{OrderStatusType::*, PayeeType},
    test_utils::fixtures::TestMarket,
    LedgerManagement,
    MarketplaceDatabase,
};
use marketplace_worker::{config::WorkerConfig, reconciliation_worker::start_reconciliation_worker, worker::reconciliation_api};
use mkt_common::Money;

#[tokio::test]
async fn worker_replays_skipped_items() {
    let market = TestMarket::new().await;
    let alice = market.seller("Alice", Some(10)).await;
    let bob = market.seller("Bob", Some(10)).await;
    let p1 = market.product("sku-1", alice.id, None, 10).await;
    let p2 = market.product("sku-2", bob.id, None, 10).await;
    let order = market.order("ord-100", &[(p1.id, 1, 1000), (p2.id, 1, 500)]).await;
    let flow = market.flow();
    for status in [Pending, Processed, Shipped, OutForDelivery] {
        flow.apply_order_transition(order.id, status).await.unwrap();
    }
    sqlx::query("DELETE FROM sellers WHERE id = $1").bind(bob.id).execute(market.db.pool()).await.unwrap();
    flow.apply_order_transition(order.id, Delivered).await.unwrap();
    sqlx::query("INSERT INTO sellers (id, name) VALUES ($1, 'Bob')").bind(bob.id).execute(market.db.pool()).await.unwrap();

    let config = WorkerConfig { database_url: market.url.clone(), ..Default::default() };
    let api = reconciliation_api(market.db.clone(), &config);
    let worker = start_reconciliation_worker(api, Duration::from_millis(20));
    let mut open = usize::MAX;
    for _ in 0..100 {
        open = market.db.open_settlement_exceptions().await.unwrap().len();
        if open == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    worker.abort();
    assert_eq!(open, 0);
    assert_eq!(market.db.ledger_balance(PayeeType::Seller, bob.id).await.unwrap(), Money::from_major(450));
    market.cleanup().await;
}
