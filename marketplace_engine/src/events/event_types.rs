use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderStatusType},
    traits::{ReversalOutcome, SettlementOutcome},
};

/// Published after every committed status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }
}

/// Published when a delivery produced new commission records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    pub order: Order,
    pub settlement: SettlementOutcome,
}

impl OrderSettledEvent {
    pub fn new(order: Order, settlement: SettlementOutcome) -> Self {
        Self { order, settlement }
    }
}

/// Published when a cancellation or return reversed paid commissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionsReversedEvent {
    pub order: Order,
    pub reversal: ReversalOutcome,
}

impl CommissionsReversedEvent {
    pub fn new(order: Order, reversal: ReversalOutcome) -> Self {
        Self { order, reversal }
    }
}

/// Tells tracking views and caches that the order has changed. Delivery is best effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInvalidatedEvent {
    pub order_id: OrderId,
    pub status: OrderStatusType,
}

impl TrackingInvalidatedEvent {
    pub fn new(order_id: OrderId, status: OrderStatusType) -> Self {
        Self { order_id, status }
    }
}
