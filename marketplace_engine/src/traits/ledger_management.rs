use mkt_common::Money;

use crate::{
    db_types::{CommissionRecord, OrderId, Payee, PayeeType, SettlementException, WalletTransaction},
    traits::{BalanceReconciliation, MarketplaceError},
};

/// Read access to the ledger, plus the balance reconciliation check.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    async fn fetch_payee(&self, payee_type: PayeeType, payee_id: i64) -> Result<Option<Payee>, MarketplaceError>;

    async fn fetch_commissions_for_order(&self, order_id: OrderId) -> Result<Vec<CommissionRecord>, MarketplaceError>;

    async fn fetch_commissions_for_payee(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<Vec<CommissionRecord>, MarketplaceError>;

    /// All wallet transactions for the payee, oldest first.
    async fn fetch_wallet_transactions(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<Vec<WalletTransaction>, MarketplaceError>;

    /// The sum of the payee's completed wallet transactions. This is the authoritative balance.
    async fn ledger_balance(&self, payee_type: PayeeType, payee_id: i64) -> Result<Money, MarketplaceError>;

    async fn fetch_settlement_exceptions(&self, order_id: OrderId) -> Result<Vec<SettlementException>, MarketplaceError>;

    /// Compares the payee's cached balance with their ledger balance, and rewrites the cache if they differ.
    ///
    /// The returned value describes the state *before* the cache was rewritten.
    async fn reconcile_balance(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<BalanceReconciliation, MarketplaceError>;
}
