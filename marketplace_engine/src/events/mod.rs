//! Order pipeline events.
//!
//! Events are published only after the transaction that produced them has committed. Subscribers register
//! async hooks through [`EventHooks`], which are turned into [`EventProducers`] for the order flow API.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::{CommissionsReversedEvent, OrderSettledEvent, OrderStatusChangedEvent, TrackingInvalidatedEvent};
pub use hooks::{EventHandlers, EventHooks, EventProducers};
