#![allow(dead_code)]
pub mod contended;

use marketplace_engine::{
    db_types::{OrderId, OrderStatusType, OrderStatusType::*},
    settings::SettingsProvider,
    MarketplaceDatabase,
    OrderFlowApi,
    TransitionOutcome,
};

pub const TO_DELIVERED: [OrderStatusType; 5] = [Pending, Processed, Shipped, OutForDelivery, Delivered];

/// Applies each status in turn and returns the outcome of the last one.
pub async fn advance<B, S>(flow: &OrderFlowApi<B, S>, order_id: OrderId, path: &[OrderStatusType]) -> TransitionOutcome
where
    B: MarketplaceDatabase,
    S: SettingsProvider,
{
    let mut last = None;
    for status in path {
        let outcome = flow
            .apply_order_transition(order_id, *status)
            .await
            .unwrap_or_else(|e| panic!("Could not move order {order_id} to {status}: {e}"));
        last = Some(outcome);
    }
    last.expect("The path must not be empty")
}
