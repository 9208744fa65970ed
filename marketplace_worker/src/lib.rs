//! # Marketplace reconciliation worker
//!
//! A long-running process that periodically retries the work the order flow could not finish:
//! * order transitions that were flagged after running out of retries, and
//! * line items that were skipped during settlement, for orders that have since been delivered.
//!
//! ## Configuration
//! The worker is configured via environment variables. See [config](config/index.html) for more information.
pub mod cli;
pub mod config;
pub mod errors;
pub mod reconciliation_worker;
pub mod worker;
