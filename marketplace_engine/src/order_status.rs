//! The order status state machine.
//!
//! Everything in this module is pure. [`plan_transition`] decides whether a status change is allowed and lists the
//! side effects that must be applied, in order, within the same transaction as the status write.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderStatusType;

use OrderStatusType::*;

/// Returns the statuses reachable from `status` in a single step.
pub fn allowed_transitions(status: OrderStatusType) -> &'static [OrderStatusType] {
    match status {
        Received => &[Pending, Cancelled, Rejected],
        Pending => &[Processed, Cancelled, Rejected],
        Processed => &[Shipped, Cancelled, Rejected],
        Shipped => &[OutForDelivery, Cancelled, Rejected],
        OutForDelivery => &[Delivered, Cancelled, Rejected],
        Delivered => &[Returned],
        Cancelled | Rejected | Returned => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub struct InvalidTransition {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub allowed: Vec<OrderStatusType>,
}

impl Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cannot move an order from {} to {}. ", self.from, self.to)?;
        if self.allowed.is_empty() {
            write!(f, "{} is a final status.", self.from)
        } else {
            let allowed = self.allowed.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ");
            write!(f, "Allowed: {allowed}")
        }
    }
}

pub fn validate_transition(current: OrderStatusType, requested: OrderStatusType) -> Result<(), InvalidTransition> {
    let allowed = allowed_transitions(current);
    if allowed.contains(&requested) {
        Ok(())
    } else {
        Err(InvalidTransition { from: current, to: requested, allowed: allowed.to_vec() })
    }
}

/// A side effect of a status change. These are intents only; the storage backend carries them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEffect {
    /// Move each line item's quantity into reserved stock
    ReserveInventory,
    /// Give each line item's reserved quantity back
    ReleaseInventory,
    /// Deduct the delivered quantities from current and reserved stock
    CommitInventory,
    SettleCommissions,
    ReverseCommissions,
    /// Signal any tracking view of the order that it is stale. Published after the transaction commits.
    InvalidateTracking,
}

impl OrderEffect {
    /// True for effects that touch the ledger or inventory and so must share the status write's transaction.
    pub fn is_transactional(&self) -> bool {
        !matches!(self, OrderEffect::InvalidateTracking)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub effects: Vec<OrderEffect>,
}

impl TransitionPlan {
    pub fn has_effect(&self, effect: OrderEffect) -> bool {
        self.effects.contains(&effect)
    }
}

/// The ordered effects of moving from `current` to `requested`. Inventory effects come before ledger effects, and
/// moves into Delivered, Cancelled, Rejected or Returned end by invalidating tracking views.
/// The transition itself is assumed to be valid.
pub fn effects_for(current: OrderStatusType, requested: OrderStatusType) -> Vec<OrderEffect> {
    let mut effects = Vec::with_capacity(3);
    match requested {
        Processed => {
            effects.push(OrderEffect::ReserveInventory);
            return effects;
        },
        Delivered => {
            effects.push(OrderEffect::CommitInventory);
            effects.push(OrderEffect::SettleCommissions);
        },
        Cancelled => {
            if current.holds_reservation() {
                effects.push(OrderEffect::ReleaseInventory);
            }
            effects.push(OrderEffect::ReverseCommissions);
        },
        Rejected => {
            if current.holds_reservation() {
                effects.push(OrderEffect::ReleaseInventory);
            }
        },
        Returned => effects.push(OrderEffect::ReverseCommissions),
        Received | Pending | Shipped | OutForDelivery => return effects,
    }
    effects.push(OrderEffect::InvalidateTracking);
    effects
}

pub fn plan_transition(
    current: OrderStatusType,
    requested: OrderStatusType,
) -> Result<TransitionPlan, InvalidTransition> {
    validate_transition(current, requested)?;
    Ok(TransitionPlan { from: current, to: requested, effects: effects_for(current, requested) })
}
