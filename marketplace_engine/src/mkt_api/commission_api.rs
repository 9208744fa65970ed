//! Read-side API for commissions, rates and payee wallets.
use std::fmt::Debug;

use log::*;
use mkt_common::Money;

use crate::{
    commission::{resolve_delivery_rate, resolve_seller_rate, summarize_commissions, CommissionSummary, DeliveryRate, ResolvedRate},
    db_types::{CommissionRecord, OrderId, PayeeType, WalletTransaction},
    settings::SettingsProvider,
    traits::{BalanceReconciliation, CatalogManagement, LedgerManagement, MarketplaceDatabase, MarketplaceError},
};

pub struct CommissionApi<B, S> {
    db: B,
    settings: S,
}

impl<B: Debug, S> Debug for CommissionApi<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommissionApi ({:?})", self.db)
    }
}

impl<B, S> CommissionApi<B, S>
where
    B: MarketplaceDatabase + LedgerManagement + CatalogManagement,
    S: SettingsProvider,
{
    pub fn new(db: B, settings: S) -> Self {
        Self { db, settings }
    }

    /// Totals a payee's commissions and earnings, split by status.
    pub async fn get_commission_summary(
        &self,
        payee_id: i64,
        payee_type: PayeeType,
    ) -> Result<CommissionSummary, MarketplaceError> {
        let records = self.db.fetch_commissions_for_payee(payee_type, payee_id).await?;
        trace!("💰️ Summarising {} commission records for {payee_type} {payee_id}", records.len());
        Ok(summarize_commissions(payee_id, payee_type, &records))
    }

    /// The rate that would apply if this product were sold by this seller right now.
    pub async fn resolve_seller_rate(&self, product_id: i64, seller_id: i64) -> Result<ResolvedRate, MarketplaceError> {
        let inputs = self.db.fetch_seller_rate_inputs(product_id, seller_id).await?;
        let settings = self.settings.commission_settings().await?;
        Ok(resolve_seller_rate(&inputs, &settings))
    }

    /// The delivery rate that would apply to the order's assigned agent right now.
    pub async fn resolve_delivery_rate(&self, order_id: OrderId) -> Result<DeliveryRate, MarketplaceError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(MarketplaceError::OrderNotFound(order_id))?;
        let agent_id = order.delivery_agent_id.ok_or_else(|| {
            MarketplaceError::InvalidOrder(format!("Order {order_id} does not have a delivery agent"))
        })?;
        let agent = self
            .db
            .fetch_payee(PayeeType::DeliveryAgent, agent_id)
            .await?
            .ok_or(MarketplaceError::DeliveryAgentNotFound(agent_id))?;
        let settings = self.settings.commission_settings().await?;
        Ok(resolve_delivery_rate(&agent, order.delivery_distance, &settings))
    }

    pub async fn commissions_for_order(&self, order_id: OrderId) -> Result<Vec<CommissionRecord>, MarketplaceError> {
        self.db.fetch_commissions_for_order(order_id).await
    }

    pub async fn wallet_transactions(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<Vec<WalletTransaction>, MarketplaceError> {
        self.db.fetch_wallet_transactions(payee_type, payee_id).await
    }

    pub async fn ledger_balance(&self, payee_type: PayeeType, payee_id: i64) -> Result<Money, MarketplaceError> {
        self.db.ledger_balance(payee_type, payee_id).await
    }

    pub async fn reconcile_balance(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
    ) -> Result<BalanceReconciliation, MarketplaceError> {
        self.db.reconcile_balance(payee_type, payee_id).await
    }
}
