//! Retries the work the order flow could not finish: transitions that were flagged after running out of attempts,
//! and line items that were skipped during settlement.
use std::{collections::BTreeSet, fmt::Debug};

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderId, OrderStatusType, ReconciliationFlag},
    mkt_api::order_flow_api::OrderFlowApi,
    settings::SettingsProvider,
    traits::{MarketplaceDatabase, MarketplaceError},
};

/// What a single reconciliation pass achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub flags_checked: usize,
    pub flags_resolved: usize,
    pub orders_replayed: usize,
    pub items_settled: usize,
    pub items_still_open: usize,
    /// Skipped items closed without settling, because their order ended in a final status
    pub exceptions_closed: usize,
}

impl ReconciliationReport {
    pub fn is_empty(&self) -> bool {
        self.flags_checked == 0 && self.orders_replayed == 0 && self.exceptions_closed == 0
    }
}

enum FlagOutcome {
    Resolved,
    Retained,
}

enum ReplayOutcome {
    Replayed { settled: usize, open: usize },
    Closed(usize),
    Skipped,
}

pub struct ReconciliationApi<B, S> {
    flow: OrderFlowApi<B, S>,
}

impl<B, S> Debug for ReconciliationApi<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.flow)
    }
}

impl<B, S> ReconciliationApi<B, S>
where
    B: MarketplaceDatabase,
    S: SettingsProvider,
{
    pub fn new(flow: OrderFlowApi<B, S>) -> Self {
        Self { flow }
    }

    pub fn flow(&self) -> &OrderFlowApi<B, S> {
        &self.flow
    }

    /// Runs one pass over every open reconciliation flag and every open settlement exception.
    ///
    /// Failures on individual orders are logged and left for the next pass. Only a failure to read the open work
    /// itself is returned as an error.
    pub async fn run_once(&self) -> Result<ReconciliationReport, MarketplaceError> {
        let mut report = ReconciliationReport::default();
        let flags = self.flow.db().open_reconciliation_flags().await?;
        for flag in flags {
            report.flags_checked += 1;
            match self.retry_flag(&flag).await {
                Ok(FlagOutcome::Resolved) => report.flags_resolved += 1,
                Ok(FlagOutcome::Retained) => {},
                Err(e) => warn!("🕰️ Could not reconcile flag {} on order {}. {e}", flag.id, flag.order_id),
            }
        }
        let exceptions = self.flow.db().open_settlement_exceptions().await?;
        let orders = exceptions.iter().map(|e| e.order_id).collect::<BTreeSet<OrderId>>();
        for order_id in orders {
            match self.replay_order(order_id).await {
                Ok(ReplayOutcome::Replayed { settled, open }) => {
                    report.orders_replayed += 1;
                    report.items_settled += settled;
                    report.items_still_open += open;
                },
                Ok(ReplayOutcome::Closed(closed)) => report.exceptions_closed += closed,
                Ok(ReplayOutcome::Skipped) => {},
                Err(e) => warn!("🕰️ Could not replay skipped items on order {order_id}. {e}"),
            }
        }
        if report.is_empty() {
            trace!("🕰️ Nothing to reconcile");
        } else {
            info!("🕰️ Reconciliation pass complete. {report:?}");
        }
        Ok(report)
    }

    async fn retry_flag(&self, flag: &ReconciliationFlag) -> Result<FlagOutcome, MarketplaceError> {
        let db = self.flow.db();
        let Some(order) = db.fetch_order(flag.order_id).await? else {
            warn!("🕰️ Order {} on flag {} no longer exists. Resolving the flag", flag.order_id, flag.id);
            db.resolve_reconciliation_flag(flag.id).await?;
            return Ok(FlagOutcome::Resolved);
        };
        if order.status == flag.requested_status {
            debug!("🕰️ Order {} is already {}. Resolving flag {}", order.id, order.status, flag.id);
            db.resolve_reconciliation_flag(flag.id).await?;
            return Ok(FlagOutcome::Resolved);
        }
        match self.flow.apply_order_transition(flag.order_id, flag.requested_status).await {
            Ok(_) => {
                db.resolve_reconciliation_flag(flag.id).await?;
                Ok(FlagOutcome::Resolved)
            },
            Err(MarketplaceError::InvalidTransition(e)) => {
                warn!("🕰️ Flag {} can no longer be applied. {e}. Resolving the flag", flag.id);
                db.resolve_reconciliation_flag(flag.id).await?;
                Ok(FlagOutcome::Resolved)
            },
            Err(e) if e.is_retryable() => {
                debug!("🕰️ Order {} is still unavailable. Flag {} stays open", flag.order_id, flag.id);
                Ok(FlagOutcome::Retained)
            },
            Err(e) => Err(e),
        }
    }

    /// Delivered orders are replayed. Orders in a final status will never be settled, so their exceptions are
    /// closed. Anything else is left for a later pass.
    async fn replay_order(&self, order_id: OrderId) -> Result<ReplayOutcome, MarketplaceError> {
        let db = self.flow.db();
        let Some(order) = db.fetch_order(order_id).await? else {
            warn!("🕰️ Order {order_id} no longer exists. Closing its settlement exceptions");
            return Ok(ReplayOutcome::Closed(db.close_settlement_exceptions(order_id).await?));
        };
        if order.status.is_terminal() {
            info!("🕰️ Order {order_id} is {}. Its skipped items will not be settled", order.status);
            return Ok(ReplayOutcome::Closed(db.close_settlement_exceptions(order_id).await?));
        }
        if order.status != OrderStatusType::Delivered {
            trace!("🕰️ Order {order_id} is {}. Its skipped items are not replayed", order.status);
            return Ok(ReplayOutcome::Skipped);
        }
        let outcome = self.flow.replay_skipped_items(order_id).await?;
        Ok(ReplayOutcome::Replayed { settled: outcome.commissions.len(), open: outcome.skipped.len() })
    }
}
