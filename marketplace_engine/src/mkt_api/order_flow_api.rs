use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    events::{
        CommissionsReversedEvent,
        EventProducers,
        OrderSettledEvent,
        OrderStatusChangedEvent,
        TrackingInvalidatedEvent,
    },
    mkt_api::{order_locks::OrderLocks, retry::RetryPolicy},
    order_status::OrderEffect,
    settings::SettingsProvider,
    traits::{MarketplaceDatabase, MarketplaceError, ReversalOutcome, SettlementOutcome, TransitionOutcome},
};

/// `OrderFlowApi` is the primary API for moving orders through their lifecycle.
///
/// Every write to an order goes through a per-order lock, so there is a single writer per order inside this process.
/// Writes that fail on database contention are retried with backoff. If they still fail, the order is flagged for the
/// reconciliation worker and the error is returned with the order unchanged.
pub struct OrderFlowApi<B, S> {
    db: B,
    settings: S,
    producers: EventProducers,
    locks: OrderLocks,
    retry: RetryPolicy,
}

impl<B, S> Debug for OrderFlowApi<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({} orders locked, {:?})", self.locks.len(), self.retry)
    }
}

impl<B: Clone, S: Clone> Clone for OrderFlowApi<B, S> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            settings: self.settings.clone(),
            producers: self.producers.clone(),
            locks: self.locks.clone(),
            retry: self.retry,
        }
    }
}

impl<B, S> OrderFlowApi<B, S> {
    pub fn new(db: B, settings: S, producers: EventProducers) -> Self {
        Self { db, settings, producers, locks: OrderLocks::new(), retry: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B, S> OrderFlowApi<B, S>
where
    B: MarketplaceDatabase,
    S: SettingsProvider,
{
    /// Submit a new order. It is stored in `Received` status.
    ///
    /// This should be a brand-new order. Re-submitting an order number fails with
    /// [`MarketplaceError::OrderAlreadyExists`], and nothing is stored.
    pub async fn place_order(&self, order: NewOrder) -> Result<Order, MarketplaceError> {
        let order_number = order.order_number.clone();
        let order = self.db.place_order(order).await?;
        debug!("🔄️📦️ Order [{order_number}] received as {}", order.id);
        Ok(order)
    }

    /// Moves an order to the requested status, along with all of the transition's side effects.
    ///
    /// The transition is validated against the order's current status. Rejected transitions return
    /// [`MarketplaceError::InvalidTransition`], which lists the statuses that are allowed.
    ///
    /// Once the transition has committed, subscribers are told about the status change, then any settlement or
    /// reversal, and finally that tracking views for the order are stale.
    pub async fn apply_order_transition(
        &self,
        order_id: OrderId,
        requested: OrderStatusType,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        let _guard = self.locks.lock(order_id).await;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.try_transition(order_id, requested).await;
            match result {
                Ok(outcome) => {
                    info!("🔄️ Order {order_id} is now {} (was {})", outcome.new_order.status, outcome.old_order.status);
                    self.publish_outcome(&outcome).await;
                    return Ok(outcome);
                },
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "🔄️ Could not move order {order_id} to {requested} (attempt {attempt} of {}). {e}. Retrying in \
                         {}ms",
                        self.retry.max_attempts,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) if e.is_retryable() => {
                    warn!("🔄️ Giving up on moving order {order_id} to {requested} after {attempt} attempts. {e}");
                    self.flag(order_id, requested, &e).await;
                    return Err(e);
                },
                Err(e @ MarketplaceError::PartialFailure { .. }) => {
                    error!("🔄️ Order {order_id} needs manual reconciliation. {e}");
                    self.flag(order_id, requested, &e).await;
                    return Err(e);
                },
                Err(e) => {
                    debug!("🔄️ Order {order_id} was not moved to {requested}. {e}");
                    return Err(e);
                },
            }
        }
    }

    async fn try_transition(
        &self,
        order_id: OrderId,
        requested: OrderStatusType,
    ) -> Result<TransitionOutcome, MarketplaceError> {
        let settings = self.settings.commission_settings().await?;
        self.db.apply_transition(order_id, requested, &settings).await
    }

    async fn flag(&self, order_id: OrderId, requested: OrderStatusType, reason: &MarketplaceError) {
        match self.db.flag_for_reconciliation(order_id, requested, &reason.to_string()).await {
            Ok(flag) => debug!("🔄️ Order {order_id} flagged for reconciliation (flag {}, {} attempts)", flag.id, flag.attempts),
            Err(e) => error!("🔄️ Could not flag order {order_id} for reconciliation. {e}. Original error: {reason}"),
        }
    }

    async fn publish_outcome(&self, outcome: &TransitionOutcome) {
        let order = &outcome.new_order;
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(outcome.old_order.clone(), order.clone())).await;
        if let Some(settlement) = outcome.settlement.as_ref().filter(|s| !s.already_settled) {
            self.producers.publish_order_settled(OrderSettledEvent::new(order.clone(), settlement.clone())).await;
        }
        if let Some(reversal) = outcome.reversal.as_ref().filter(|r| !r.is_noop()) {
            self.producers.publish_commissions_reversed(CommissionsReversedEvent::new(order.clone(), reversal.clone())).await;
        }
        if outcome.plan.has_effect(OrderEffect::InvalidateTracking) {
            self.producers.publish_tracking_invalidated(TrackingInvalidatedEvent::new(order.id, order.status));
        }
    }

    /// Settles a delivered order that has no commissions yet. Calling this again is harmless; the second call writes
    /// nothing and reports `already_settled`.
    pub async fn settle_on_delivery(&self, order_id: OrderId) -> Result<SettlementOutcome, MarketplaceError> {
        let _guard = self.locks.lock(order_id).await;
        let settings = self.settings.commission_settings().await?;
        let outcome = self.db.settle_on_delivery(order_id, &settings).await?;
        if !outcome.already_settled {
            if let Some(order) = self.db.fetch_order(order_id).await? {
                self.producers.publish_order_settled(OrderSettledEvent::new(order, outcome.clone())).await;
            }
        }
        Ok(outcome)
    }

    /// Reverses every paid commission on the order. Orders without paid commissions are a no-op.
    pub async fn reverse_commissions(&self, order_id: OrderId) -> Result<ReversalOutcome, MarketplaceError> {
        let _guard = self.locks.lock(order_id).await;
        let outcome = self.db.reverse_commissions(order_id).await?;
        if !outcome.is_noop() {
            if let Some(order) = self.db.fetch_order(order_id).await? {
                self.producers.publish_commissions_reversed(CommissionsReversedEvent::new(order, outcome.clone())).await;
            }
        }
        Ok(outcome)
    }

    /// Retries the line items that were skipped when the order was settled.
    pub async fn replay_skipped_items(&self, order_id: OrderId) -> Result<SettlementOutcome, MarketplaceError> {
        let _guard = self.locks.lock(order_id).await;
        let settings = self.settings.commission_settings().await?;
        let outcome = self.db.replay_skipped_items(order_id, &settings).await?;
        if !outcome.commissions.is_empty() {
            if let Some(order) = self.db.fetch_order(order_id).await? {
                self.producers.publish_order_settled(OrderSettledEvent::new(order, outcome.clone())).await;
            }
        }
        Ok(outcome)
    }

    pub async fn assign_delivery_agent(&self, order_id: OrderId, agent_id: i64) -> Result<Order, MarketplaceError> {
        let _guard = self.locks.lock(order_id).await;
        let order = self.db.assign_delivery_agent(order_id, agent_id).await?;
        self.producers.publish_tracking_invalidated(TrackingInvalidatedEvent::new(order.id, order.status));
        Ok(order)
    }

    pub async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<Order, MarketplaceError> {
        let _guard = self.locks.lock(order_id).await;
        self.db.set_payment_reference(order_id, reference).await
    }

    pub async fn order(&self, order_id: OrderId) -> Result<Option<Order>, MarketplaceError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn order_by_number(&self, order_number: &str) -> Result<Order, MarketplaceError> {
        self.db
            .fetch_order_by_number(order_number)
            .await?
            .ok_or_else(|| MarketplaceError::OrderNumberNotFound(order_number.to_string()))
    }
}
