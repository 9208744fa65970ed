use std::collections::HashMap;

use cucumber::World;
use marketplace_engine::{
    db_types::{NewOrder, Order, OrderId},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    CatalogApi,
    CommissionApi,
    InventoryApi,
    MarketplaceDatabase,
    MarketplaceError,
    OrderFlowApi,
    ReconciliationApi,
    SqliteDatabase,
    TransitionOutcome,
};

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<MarketSystem>,
    /// Seller and delivery agent ids by name
    pub payees: HashMap<String, i64>,
    /// Product ids by SKU
    pub products: HashMap<String, i64>,
    pub orders: HashMap<String, OrderId>,
    /// The order being built by the current scenario
    pub draft: Option<NewOrder>,
    pub last_outcome: Option<TransitionOutcome>,
    pub last_error: Option<MarketplaceError>,
}

#[derive(Debug)]
pub struct MarketSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub flow: OrderFlowApi<SqliteDatabase, SqliteDatabase>,
}

impl MarketSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let flow = OrderFlowApi::new(db.clone(), db.clone(), Default::default());
        Self { url, db, flow }
    }

    pub async fn close(&mut self) {
        let _ = self.db.close().await;
    }
}

impl MarketWorld {
    pub fn system(&self) -> &MarketSystem {
        self.system.as_ref().expect("The marketplace has not been set up")
    }

    pub fn flow(&self) -> &OrderFlowApi<SqliteDatabase, SqliteDatabase> {
        &self.system().flow
    }

    pub fn catalog(&self) -> CatalogApi<SqliteDatabase> {
        CatalogApi::new(self.system().db.clone())
    }

    pub fn commissions(&self) -> CommissionApi<SqliteDatabase, SqliteDatabase> {
        let db = self.system().db.clone();
        CommissionApi::new(db.clone(), db)
    }

    pub fn inventory(&self) -> InventoryApi<SqliteDatabase> {
        InventoryApi::new(self.system().db.clone())
    }

    pub fn reconciler(&self) -> ReconciliationApi<SqliteDatabase, SqliteDatabase> {
        ReconciliationApi::new(self.flow().clone())
    }

    pub fn payee(&self, name: &str) -> i64 {
        *self.payees.get(name).unwrap_or_else(|| panic!("Nobody called {name} has been set up"))
    }

    pub fn product(&self, sku: &str) -> i64 {
        *self.products.get(sku).unwrap_or_else(|| panic!("No product {sku} has been set up"))
    }

    pub fn order_id(&self, number: &str) -> OrderId {
        *self.orders.get(number).unwrap_or_else(|| panic!("Order {number} has not been placed"))
    }

    pub async fn order(&self, number: &str) -> Order {
        let id = self.order_id(number);
        self.flow().order(id).await.expect("Error fetching order").expect("Order has disappeared")
    }
}
