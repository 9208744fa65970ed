use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use marketplace_engine::{
    db_types::{
        CommissionRecord,
        InventoryRecord,
        LineItem,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        Payee,
        PayeeType,
        ReconciliationFlag,
        SettlementException,
        WalletTransaction,
    },
    settings::CommissionSettings,
    BalanceReconciliation,
    InventoryManagement,
    LedgerManagement,
    MarketplaceDatabase,
    MarketplaceError,
    ReversalOutcome,
    SettlementOutcome,
    SqliteDatabase,
    TransitionOutcome,
};
use mkt_common::Money;

/// A SQLite backend whose next `busy_transitions` calls to `apply_transition` fail as if the database were locked.
#[derive(Clone)]
pub struct ContendedDatabase {
    inner: SqliteDatabase,
    busy_transitions: Arc<AtomicUsize>,
    transition_calls: Arc<AtomicUsize>,
}

impl ContendedDatabase {
    pub fn new(inner: SqliteDatabase, busy_transitions: usize) -> Self {
        Self {
            inner,
            busy_transitions: Arc::new(AtomicUsize::new(busy_transitions)),
            transition_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn transition_calls(&self) -> usize {
        self.transition_calls.load(Ordering::SeqCst)
    }

    pub fn set_busy_transitions(&self, count: usize) {
        self.busy_transitions.store(count, Ordering::SeqCst);
    }
}

impl MarketplaceDatabase for ContendedDatabase {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn place_order(&self, order: NewOrder) -> Result<Order, MarketplaceError> {
        self.inner.place_order(order).await
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, MarketplaceError> {
        self.inner.fetch_order(order_id).await
    }

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, MarketplaceError> {
        self.inner.fetch_order_by_number(order_number).await
    }

    async fn fetch_line_items(&self, order_id: OrderId) -> Result<Vec<LineItem>, MarketplaceError> {
        self.inner.fetch_line_items(order_id).await
    }

    async fn apply_transition(
        &self,
        order_id: OrderId,
        requested: OrderStatusType,
        settings: &CommissionSettings,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        self.transition_calls.fetch_add(1, Ordering::SeqCst);
        let busy = self.busy_transitions.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
        if busy {
            return Err(MarketplaceError::SettlementUnavailable("database is locked".into()));
        }
        self.inner.apply_transition(order_id, requested, settings).await
    }

    async fn settle_on_delivery(
        &self,
        order_id: OrderId,
        settings: &CommissionSettings,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        self.inner.settle_on_delivery(order_id, settings).await
    }

    async fn reverse_commissions(&self, order_id: OrderId) -> Result<ReversalOutcome, MarketplaceError> {
        self.inner.reverse_commissions(order_id).await
    }

    async fn replay_skipped_items(
        &self,
        order_id: OrderId,
        settings: &CommissionSettings,
    ) -> Result<SettlementOutcome, MarketplaceError> {
        self.inner.replay_skipped_items(order_id, settings).await
    }

    async fn flag_for_reconciliation(
        &self,
        order_id: OrderId,
        requested: OrderStatusType,
        reason: &str,
    ) -> Result<ReconciliationFlag, MarketplaceError> {
        self.inner.flag_for_reconciliation(order_id, requested, reason).await
    }

    async fn resolve_reconciliation_flag(&self, flag_id: i64) -> Result<(), MarketplaceError> {
        self.inner.resolve_reconciliation_flag(flag_id).await
    }

    async fn open_reconciliation_flags(&self) -> Result<Vec<ReconciliationFlag>, MarketplaceError> {
        self.inner.open_reconciliation_flags().await
    }

    async fn open_settlement_exceptions(&self) -> Result<Vec<SettlementException>, MarketplaceError> {
        self.inner.open_settlement_exceptions().await
    }

    async fn close_settlement_exceptions(&self, order_id: OrderId) -> Result<usize, MarketplaceError> {
        self.inner.close_settlement_exceptions(order_id).await
    }

    async fn assign_delivery_agent(&self, order_id: OrderId, agent_id: i64) -> Result<Order, MarketplaceError> {
        self.inner.assign_delivery_agent(order_id, agent_id).await
    }

    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<Order, MarketplaceError> {
        self.inner.set_payment_reference(order_id, reference).await
    }
}

impl InventoryManagement for ContendedDatabase {
    async fn fetch_inventory(&self, product_id: i64) -> Result<Option<InventoryRecord>, MarketplaceError> {
        self.inner.fetch_inventory(product_id).await
    }

    async fn restock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError> {
        self.inner.restock(product_id, quantity).await
    }

    async fn reserve_stock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError> {
        self.inner.reserve_stock(product_id, quantity).await
    }

    async fn release_stock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError> {
        self.inner.release_stock(product_id, quantity).await
    }
}

impl LedgerManagement for ContendedDatabase {
    async fn fetch_payee(&self, payee_type: PayeeType, payee_id: i64) -> Result<Option<Payee>, MarketplaceError> {
        self.inner.fetch_payee(payee_type, payee_id).await
    }

    async fn fetch_commissions_for_order(&self, order_id: OrderId) -> Result<Vec<CommissionRecord>, MarketplaceError> {
        self.inner.fetch_commissions_for_order(order_id).await
    }

    async fn fetch_commissions_for_payee(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<Vec<CommissionRecord>, MarketplaceError> {
        self.inner.fetch_commissions_for_payee(payee_type, payee_id).await
    }

    async fn fetch_wallet_transactions(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<Vec<WalletTransaction>, MarketplaceError> {
        self.inner.fetch_wallet_transactions(payee_type, payee_id).await
    }

    async fn ledger_balance(&self, payee_type: PayeeType, payee_id: i64) -> Result<Money, MarketplaceError> {
        self.inner.ledger_balance(payee_type, payee_id).await
    }

    async fn fetch_settlement_exceptions(&self, order_id: OrderId) -> Result<Vec<SettlementException>, MarketplaceError> {
        self.inner.fetch_settlement_exceptions(order_id).await
    }

    async fn reconcile_balance(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<BalanceReconciliation, MarketplaceError> {
        self.inner.reconcile_balance(payee_type, payee_id).await
    }
}
