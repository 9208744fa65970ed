//! # Marketplace engine public API
//!
//! The `mkt_api` module exposes the programmatic API for the marketplace engine. The API is modular, so that clients
//! can pick the parts they need.
//!
//! * [`order_flow_api`] is the primary API. It places orders and moves them through their lifecycle, including
//!   settlement and reversal of commissions.
//! * [`commission_api`] answers questions about commissions, rates, wallets and balances.
//! * [`catalog_api`] manages sellers, delivery agents, categories, products and commission settings.
//! * [`inventory_api`] reads and restocks inventory.
//! * [`reconciliation_api`] retries flagged transitions and skipped line items.
//!
//! # API usage
//!
//! Every API is created from a database backend that implements the backend traits it needs. The order flow and
//! commission APIs also take a [`crate::settings::SettingsProvider`]; the SQLite backend is one.
//!
//! ```rust,ignore
//! use marketplace_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/marketplace.db", 5).await?;
//! let api = OrderFlowApi::new(db.clone(), db, EventProducers::default());
//! let outcome = api.apply_order_transition(order_id, OrderStatusType::Processed).await?;
//! ```

pub mod catalog_api;
pub mod commission_api;
pub mod inventory_api;
pub mod order_flow_api;
pub mod reconciliation_api;

mod order_locks;
mod retry;

pub use order_locks::{OrderGuard, OrderLocks};
pub use retry::RetryPolicy;
