//! #  Storage backend contracts.
//!
//! This module defines what a storage backend must provide for the marketplace engine to run on it.
//!
//! ## Orders and settlement
//! The [`MarketplaceDatabase`] trait owns every write that moves an order through its lifecycle. Each of its
//! mutating methods is one atomic unit: the order's status, its inventory effects and its ledger entries commit
//! together or not at all.
//!
//! ## Traits
//! * [`MarketplaceDatabase`] defines order placement, status transitions, settlement, reversal and reconciliation.
//! * [`InventoryManagement`] reads and adjusts per-product stock.
//! * [`LedgerManagement`] provides read access to commissions, wallet transactions and payee balances, as well as
//!   the balance reconciliation check.
//! * [`CatalogManagement`] manages sellers, delivery agents, categories, products and system settings.
mod catalog_management;
mod data_objects;
mod inventory_management;
mod ledger_management;
mod marketplace_database;

pub use catalog_management::CatalogManagement;
pub use data_objects::{BalanceReconciliation, ReversalOutcome, SettlementOutcome, TransitionOutcome};
pub use inventory_management::InventoryManagement;
pub use ledger_management::LedgerManagement;
pub use marketplace_database::{MarketplaceDatabase, MarketplaceError};
