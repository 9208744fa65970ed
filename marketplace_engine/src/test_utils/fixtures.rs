use mkt_common::{Money, Rate};

use crate::{
    db_types::{NewCategory, NewOrder, NewPayee, NewProduct, Order, Payee, PayeeType, Product},
    events::EventProducers,
    test_utils::prepare_env::{drop_database, prepare_test_env, random_db_path},
    traits::{CatalogManagement, MarketplaceDatabase},
    OrderFlowApi,
    SqliteDatabase,
};

/// A fresh marketplace database with helpers for populating it.
#[derive(Debug)]
pub struct TestMarket {
    pub url: String,
    pub db: SqliteDatabase,
}

impl TestMarket {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        Self { url, db }
    }

    pub fn flow(&self) -> OrderFlowApi<SqliteDatabase, SqliteDatabase> {
        self.flow_with_producers(EventProducers::default())
    }

    pub fn flow_with_producers(&self, producers: EventProducers) -> OrderFlowApi<SqliteDatabase, SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), self.db.clone(), producers)
    }

    pub async fn seller(&self, name: &str, percent: Option<i64>) -> Payee {
        self.payee(PayeeType::Seller, name, percent).await
    }

    pub async fn delivery_agent(&self, name: &str, percent: Option<i64>) -> Payee {
        self.payee(PayeeType::DeliveryAgent, name, percent).await
    }

    async fn payee(&self, payee_type: PayeeType, name: &str, percent: Option<i64>) -> Payee {
        let mut payee = NewPayee::new(name);
        if let Some(p) = percent {
            payee = payee.with_rate(Rate::from_percent(p));
        }
        self.db.create_payee(payee_type, payee).await.expect("Error creating payee")
    }

    pub async fn category(&self, name: &str, parent: Option<i64>, percent: Option<i64>) -> i64 {
        let mut category = NewCategory::new(name);
        if let Some(parent) = parent {
            category = category.with_parent(parent);
        }
        if let Some(p) = percent {
            category = category.with_rate(Rate::from_percent(p));
        }
        self.db.create_category(category).await.expect("Error creating category").id
    }

    pub async fn product(&self, sku: &str, seller_id: i64, category_id: Option<i64>, stock: i64) -> Product {
        let mut product = NewProduct::new(sku, sku, seller_id).with_stock(stock);
        if let Some(category_id) = category_id {
            product = product.in_category(category_id);
        }
        self.db.create_product(product).await.expect("Error creating product")
    }

    /// Places an order. Items are `(product_id, quantity, unit price in major units)`.
    pub async fn order(&self, number: &str, items: &[(i64, i64, i64)]) -> Order {
        let order = items.iter().fold(NewOrder::new(number, "customer-1"), |order, (product_id, qty, price)| {
            order.with_item(*product_id, *qty, Money::from_major(*price))
        });
        self.db.place_order(order).await.expect("Error placing order")
    }

    pub async fn cleanup(mut self) {
        let _ = self.db.close().await;
        drop_database(&self.url).await;
    }
}
