use marketplace_engine::{
    db_types::{NewCategory, NewPayee, NewProduct, OrderStatusType::*, PayeeType},
    test_utils::fixtures::TestMarket,
    CatalogManagement,
    InventoryManagement,
    LedgerManagement,
    MarketplaceDatabase,
    SqliteDatabase,
};
use mkt_common::Rate;

/// Every write must be visible to a different connection as soon as the call returns.
#[tokio::test]
async fn writes_are_visible_to_other_connections() {
    let market = TestMarket::new().await;
    let writer = &market.db;
    let reader = SqliteDatabase::new_with_url(&market.url, 1).await.unwrap();

    let alice = writer.create_payee(PayeeType::Seller, NewPayee::new("Alice")).await.unwrap();
    let seen = reader.fetch_payee(PayeeType::Seller, alice.id).await.unwrap().expect("Alice is visible");
    assert_eq!(seen.commission_rate, None);

    writer.set_payee_rate(PayeeType::Seller, alice.id, Some(Rate::from_percent(7))).await.unwrap();
    let seen = reader.fetch_payee(PayeeType::Seller, alice.id).await.unwrap().unwrap();
    assert_eq!(seen.commission_rate, Some(Rate::from_percent(7)));

    let category = writer.create_category(NewCategory::new("Books")).await.unwrap();
    writer.set_category_rate(category.id, Some(Rate::from_percent(15))).await.unwrap();

    // The product insert runs in its own transaction on the reader and needs the seller row
    let book = NewProduct::new("book", "book", alice.id).in_category(category.id).with_stock(2);
    let product = reader.create_product(book).await.unwrap();
    let inputs = reader.fetch_seller_rate_inputs(product.id, alice.id).await.unwrap();
    assert_eq!(inputs.seller_rate, Some(Rate::from_percent(7)));
    assert_eq!(inputs.category_chain[0].commission_rate, Some(Rate::from_percent(15)));

    writer.restock(product.id, 3).await.unwrap();
    assert_eq!(reader.fetch_inventory(product.id).await.unwrap().unwrap().current_stock, 5);
    writer.reserve_stock(product.id, 4).await.unwrap();
    assert_eq!(reader.fetch_inventory(product.id).await.unwrap().unwrap().reserved_stock, 4);
    writer.release_stock(product.id, 1).await.unwrap();
    assert_eq!(reader.fetch_inventory(product.id).await.unwrap().unwrap().reserved_stock, 3);

    let order = market.order("ord-100", &[(product.id, 1, 20)]).await;
    writer.set_payment_reference(order.id, "pay-1").await.unwrap();
    let seen = reader.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(seen.payment_reference.as_deref(), Some("pay-1"));

    let flag = writer.flag_for_reconciliation(order.id, Pending, "database is locked").await.unwrap();
    let flags = reader.open_reconciliation_flags().await.unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].id, flag.id);
    writer.resolve_reconciliation_flag(flag.id).await.unwrap();
    assert!(reader.open_reconciliation_flags().await.unwrap().is_empty());

    // And the reader can write straight after, without finding the database locked
    reader.flag_for_reconciliation(order.id, Processed, "database is locked").await.unwrap();
    assert_eq!(writer.open_reconciliation_flags().await.unwrap().len(), 1);

    let mut reader = reader;
    reader.close().await.unwrap();
    market.cleanup().await;
}
