//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! Every mutating method opens one transaction, runs the low-level functions in [`super::db`] against it and commits
//! at the end. Returning early with an error drops the transaction, which rolls it back.
use std::fmt::Debug;

use log::*;
use mkt_common::{Money, Rate};
use sqlx::SqlitePool;

use super::db::{catalog, commissions, db_url, inventory, ledger, new_pool, orders, reconciliation, settings, wallets};
use crate::{
    commission::SellerRateInputs,
    db_types::{
        Category,
        CommissionRecord,
        InventoryRecord,
        LineItem,
        NewCategory,
        NewOrder,
        NewPayee,
        NewProduct,
        Order,
        OrderId,
        OrderStatusType,
        Payee,
        PayeeType,
        Product,
        ReconciliationFlag,
        SettlementException,
        WalletTransaction,
    },
    order_status::{plan_transition, OrderEffect},
    settings::{CommissionSettings, SettingsProvider},
    traits::{
        BalanceReconciliation,
        CatalogManagement,
        InventoryManagement,
        LedgerManagement,
        MarketplaceDatabase,
        MarketplaceError,
        ReversalOutcome,
        SettlementOutcome,
        TransitionOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn place_order(&self, order: NewOrder) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {} [{}] placed. Total {}", order.id, order.order_number, order.total);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_line_items(&self, order_id: OrderId) -> Result<Vec<LineItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_line_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn apply_transition(
        &self,
        order_id: OrderId,
        requested: OrderStatusType,
        settings: &CommissionSettings,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        let plan = plan_transition(order.status, requested)?;
        let items = orders::fetch_line_items(order_id, &mut tx).await?;
        let mut settlement = None;
        let mut reversal = None;
        for effect in &plan.effects {
            match effect {
                OrderEffect::ReserveInventory => {
                    for item in &items {
                        inventory::reserve(item.product_id, item.quantity, &mut tx).await?;
                    }
                },
                OrderEffect::ReleaseInventory => {
                    for item in &items {
                        inventory::release(item.product_id, item.quantity, &mut tx).await?;
                    }
                },
                OrderEffect::CommitInventory => {
                    for item in &items {
                        inventory::commit(item.product_id, item.quantity, &mut tx).await?;
                    }
                },
                OrderEffect::SettleCommissions => {
                    settlement = Some(ledger::settle_order(&order, settings, &mut tx).await?);
                },
                OrderEffect::ReverseCommissions => {
                    reversal = Some(ledger::reverse_order(&order, &mut tx).await?);
                },
                OrderEffect::InvalidateTracking => {},
            }
        }
        let new_order = orders::compare_and_set_status(order_id, order.status, requested, &mut tx).await?.ok_or_else(
            || MarketplaceError::SettlementUnavailable(format!("Order {order_id} was modified by another writer")),
        )?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} moved from {} to {}", plan.from, plan.to);
        let mut outcome = TransitionOutcome::new(order, new_order, plan);
        outcome.settlement = settlement;
        outcome.reversal = reversal;
        Ok(outcome)
    }

    async fn settle_on_delivery(
        &self,
        order_id: OrderId,
        settings: &CommissionSettings,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if order.status != OrderStatusType::Delivered {
            return Err(MarketplaceError::OrderNotSettleable { order_id, status: order.status });
        }
        let outcome = ledger::settle_order(&order, settings, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn reverse_commissions(&self, order_id: OrderId) -> Result<ReversalOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        let outcome = ledger::reverse_order(&order, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn replay_skipped_items(
        &self,
        order_id: OrderId,
        settings: &CommissionSettings,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if order.status != OrderStatusType::Delivered {
            return Err(MarketplaceError::OrderNotSettleable { order_id, status: order.status });
        }
        let outcome = ledger::replay_exceptions(&order, settings, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn flag_for_reconciliation(
        &self,
        order_id: OrderId,
        requested: OrderStatusType,
        reason: &str,
    ) -> Result<ReconciliationFlag, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let flag = reconciliation::upsert_flag(order_id, requested, reason, &mut tx).await?;
        tx.commit().await?;
        Ok(flag)
    }

    async fn resolve_reconciliation_flag(&self, flag_id: i64) -> Result<(), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        if !reconciliation::resolve_flag(flag_id, &mut tx).await? {
            debug!("🗃️ Reconciliation flag {flag_id} was already resolved, or does not exist");
        }
        tx.commit().await?;
        Ok(())
    }

    async fn open_reconciliation_flags(&self) -> Result<Vec<ReconciliationFlag>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let flags = reconciliation::fetch_open_flags(&mut conn).await?;
        Ok(flags)
    }

    async fn open_settlement_exceptions(&self) -> Result<Vec<SettlementException>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let exceptions = reconciliation::fetch_open_exceptions(&mut conn).await?;
        Ok(exceptions)
    }

    async fn close_settlement_exceptions(&self, order_id: OrderId) -> Result<usize, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let closed = reconciliation::close_open_exceptions(order_id, &mut tx).await?;
        tx.commit().await?;
        if closed > 0 {
            debug!("🗃️ Closed {closed} settlement exceptions on order {order_id}");
        }
        Ok(usize::try_from(closed).unwrap_or(usize::MAX))
    }

    async fn assign_delivery_agent(&self, order_id: OrderId, agent_id: i64) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if order.status == OrderStatusType::Delivered || order.status.is_terminal() {
            return Err(MarketplaceError::InvalidOrder(format!(
                "Order {order_id} is {}, so its delivery agent can no longer change",
                order.status
            )));
        }
        catalog::fetch_payee(PayeeType::DeliveryAgent, agent_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::DeliveryAgentNotFound(agent_id))?;
        let order = orders::update_delivery_agent(order_id, agent_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::OrderNotFound(order_id))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<Order, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_payment_reference(order_id, reference, &mut tx)
            .await?
            .ok_or(MarketplaceError::OrderNotFound(order_id))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn close(&mut self) -> Result<(), MarketplaceError> {
        self.pool.close().await;
        Ok(())
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn fetch_inventory(&self, product_id: i64) -> Result<Option<InventoryRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let record = inventory::fetch_inventory(product_id, &mut conn).await?;
        Ok(record)
    }

    async fn restock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let record = inventory::restock(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn reserve_stock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let record = inventory::reserve(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn release_stock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let record = inventory::release(product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn fetch_payee(&self, payee_type: PayeeType, payee_id: i64) -> Result<Option<Payee>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let payee = catalog::fetch_payee(payee_type, payee_id, &mut conn).await?;
        Ok(payee)
    }

    async fn fetch_commissions_for_order(&self, order_id: OrderId) -> Result<Vec<CommissionRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let records = commissions::fetch_for_order(order_id, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_commissions_for_payee(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<Vec<CommissionRecord>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let records = commissions::fetch_for_payee(payee_type, payee_id, &mut conn).await?;
        Ok(records)
    }

    async fn fetch_wallet_transactions(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<Vec<WalletTransaction>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let txs = wallets::fetch_for_payee(payee_type, payee_id, &mut conn).await?;
        Ok(txs)
    }

    async fn ledger_balance(&self, payee_type: PayeeType, payee_id: i64) -> Result<Money, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let balance = wallets::ledger_balance(payee_type, payee_id, &mut conn).await?;
        Ok(balance)
    }

    async fn fetch_settlement_exceptions(&self, order_id: OrderId) -> Result<Vec<SettlementException>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let exceptions = reconciliation::fetch_exceptions_for_order(order_id, &mut conn).await?;
        Ok(exceptions)
    }

    async fn reconcile_balance(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<BalanceReconciliation, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let payee = catalog::fetch_payee(payee_type, payee_id, &mut tx)
            .await?
            .ok_or_else(|| catalog::payee_not_found(payee_type, payee_id))?;
        let ledger_balance = wallets::ledger_balance(payee_type, payee_id, &mut tx).await?;
        let result = BalanceReconciliation { payee_id, payee_type, cached_balance: payee.balance, ledger_balance };
        if !result.is_consistent() {
            warn!(
                "💰️ {payee_type} {payee_id} has a cached balance of {} but the ledger says {}. Rewriting the cache",
                result.cached_balance, result.ledger_balance
            );
            catalog::overwrite_balance(payee_type, payee_id, ledger_balance, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(result)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn create_payee(&self, payee_type: PayeeType, payee: NewPayee) -> Result<Payee, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let payee = catalog::insert_payee(payee_type, payee, &mut tx).await?;
        tx.commit().await?;
        Ok(payee)
    }

    async fn set_payee_rate(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
        rate: Option<Rate>,
    ) -> Result<Payee, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let payee = catalog::update_payee_rate(payee_type, payee_id, rate, &mut tx)
            .await?
            .ok_or_else(|| catalog::payee_not_found(payee_type, payee_id))?;
        tx.commit().await?;
        Ok(payee)
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let category = catalog::insert_category(category, &mut tx).await?;
        tx.commit().await?;
        Ok(category)
    }

    async fn set_category_rate(&self, category_id: i64, rate: Option<Rate>) -> Result<Category, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let category = catalog::update_category_rate(category_id, rate, &mut tx)
            .await?
            .ok_or(MarketplaceError::CategoryNotFound(category_id))?;
        tx.commit().await?;
        Ok(category)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let product = catalog::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let product = catalog::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_seller_rate_inputs(
        &self,
        product_id: i64,
        seller_id: i64,
    ) -> Result<SellerRateInputs, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_seller_rate_inputs(product_id, seller_id, &mut conn).await
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        settings::upsert_setting(key, value, &mut tx).await?;
        tx.commit().await?;
        debug!("🪛️ System setting {key} set to {value}");
        Ok(())
    }
}

impl SettingsProvider for SqliteDatabase {
    async fn commission_settings(&self) -> Result<CommissionSettings, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let rows = settings::fetch_settings(&mut conn).await?;
        trace!("🪛️ Loaded {} system settings", rows.len());
        Ok(CommissionSettings::from_pairs(rows))
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MarketplaceError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketplaceError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
