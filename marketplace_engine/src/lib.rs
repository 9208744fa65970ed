//! Marketplace Engine
//!
//! The marketplace engine moves multi-seller orders through their lifecycle and settles the money that flows from
//! them. As an order changes status, stock is reserved, committed or released, commissions for each seller and the
//! delivery agent are calculated, and net earnings are credited to (or reversed from) their wallets.
//!
//! The library is divided into these sections:
//! 1. The pure core. [`mod@order_status`] is the status state machine. It validates transitions and lists the side
//!    effects each transition has. [`mod@commission`] resolves commission rates and calculates commissions. Neither
//!    touches storage.
//! 2. Storage backends. The traits in [`mod@traits`] describe what a backend must do; [`SqliteDatabase`] is the
//!    implementation. Each transition's side effects commit in the same transaction as its status change.
//! 3. The public API ([`mod@mkt_api`]). You should use these types rather than the backends directly. They add
//!    per-order serialisation, retries and event publishing.
//!
//! The engine also publishes events when orders change status, settle or are reversed. See [`mod@events`] for how to
//! hook into them.
pub mod commission;
pub mod db_types;
pub mod events;
pub mod mkt_api;
pub mod order_status;
pub mod settings;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mkt_api::{
    catalog_api::CatalogApi,
    commission_api::CommissionApi,
    inventory_api::InventoryApi,
    order_flow_api::OrderFlowApi,
    reconciliation_api::{ReconciliationApi, ReconciliationReport},
    RetryPolicy,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    BalanceReconciliation,
    CatalogManagement,
    InventoryManagement,
    LedgerManagement,
    MarketplaceDatabase,
    MarketplaceError,
    ReversalOutcome,
    SettlementOutcome,
    TransitionOutcome,
};
