use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    CommissionsReversedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderSettledEvent,
    OrderStatusChangedEvent,
    TrackingInvalidatedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub order_settled_producer: Vec<EventProducer<OrderSettledEvent>>,
    pub commissions_reversed_producer: Vec<EventProducer<CommissionsReversedEvent>>,
    pub tracking_invalidated_producer: Vec<EventProducer<TrackingInvalidatedEvent>>,
}

impl EventProducers {
    pub async fn publish_status_changed(&self, event: OrderStatusChangedEvent) {
        for producer in &self.status_changed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_settled(&self, event: OrderSettledEvent) {
        for producer in &self.order_settled_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_commissions_reversed(&self, event: CommissionsReversedEvent) {
        for producer in &self.commissions_reversed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    /// Fire and forget. A slow or full subscriber never holds up the caller.
    pub fn publish_tracking_invalidated(&self, event: TrackingInvalidatedEvent) {
        for producer in &self.tracking_invalidated_producer {
            producer.try_publish_event(event);
        }
    }
}

pub struct EventHandlers {
    pub on_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_order_settled: Option<EventHandler<OrderSettledEvent>>,
    pub on_commissions_reversed: Option<EventHandler<CommissionsReversedEvent>>,
    pub on_tracking_invalidated: Option<EventHandler<TrackingInvalidatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_status_changed: hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_settled: hooks.on_order_settled.map(|f| EventHandler::new(buffer_size, f)),
            on_commissions_reversed: hooks.on_commissions_reversed.map(|f| EventHandler::new(buffer_size, f)),
            on_tracking_invalidated: hooks.on_tracking_invalidated.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_settled {
            result.order_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_commissions_reversed {
            result.commissions_reversed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_tracking_invalidated {
            result.tracking_invalidated_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_settled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_commissions_reversed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_tracking_invalidated {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_order_settled: Option<Handler<OrderSettledEvent>>,
    pub on_commissions_reversed: Option<Handler<CommissionsReversedEvent>>,
    pub on_tracking_invalidated: Option<Handler<TrackingInvalidatedEvent>>,
}

impl EventHooks {
    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_order_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderSettledEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_settled = Some(Arc::new(f));
        self
    }

    pub fn on_commissions_reversed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CommissionsReversedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_commissions_reversed = Some(Arc::new(f));
        self
    }

    pub fn on_tracking_invalidated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(TrackingInvalidatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_tracking_invalidated = Some(Arc::new(f));
        self
    }
}
