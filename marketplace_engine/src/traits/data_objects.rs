use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CommissionRecord, Order, PayeeType, SettlementException, WalletTransaction},
    order_status::TransitionPlan,
};

/// The result of settling commissions for an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// True if the order had already been settled and nothing was written.
    pub already_settled: bool,
    pub commissions: Vec<CommissionRecord>,
    pub credits: Vec<WalletTransaction>,
    /// Line items that were skipped in this pass and recorded for replay
    pub skipped: Vec<SettlementException>,
}

impl SettlementOutcome {
    pub fn already_settled() -> Self {
        Self { already_settled: true, ..Default::default() }
    }

    pub fn total_credited(&self) -> Money {
        self.credits.iter().map(|c| c.amount).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// The result of reversing an order's commissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalOutcome {
    /// The commission records that were flipped to `Cancelled`
    pub reversed: Vec<CommissionRecord>,
    pub debits: Vec<WalletTransaction>,
    /// Skipped items that will no longer be settled because the order was reversed
    pub exceptions_closed: usize,
}

impl ReversalOutcome {
    pub fn is_noop(&self) -> bool {
        self.reversed.is_empty()
    }

    pub fn total_debited(&self) -> Money {
        self.debits.iter().map(|d| d.amount).sum()
    }
}

/// Everything that happened in a single status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub old_order: Order,
    pub new_order: Order,
    pub plan: TransitionPlan,
    pub settlement: Option<SettlementOutcome>,
    pub reversal: Option<ReversalOutcome>,
}

impl TransitionOutcome {
    pub fn new(old_order: Order, new_order: Order, plan: TransitionPlan) -> Self {
        Self { old_order, new_order, plan, settlement: None, reversal: None }
    }
}

/// A comparison between a payee's cached balance and the sum of their completed wallet transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReconciliation {
    pub payee_id: i64,
    pub payee_type: PayeeType,
    pub cached_balance: Money,
    pub ledger_balance: Money,
}

impl BalanceReconciliation {
    pub fn drift(&self) -> Money {
        self.cached_balance - self.ledger_balance
    }

    pub fn is_consistent(&self) -> bool {
        self.drift().is_zero()
    }
}
